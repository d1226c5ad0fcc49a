use thiserror::Error;

/// RabbitMQ工具包错误类型
#[derive(Error, Debug)]
pub enum RabbitError {
    /// AMQP 协议/通道错误
    #[error("AMQP错误: {0}")]
    Amqp(#[from] lapin::Error),

    /// 建立连接失败
    #[error("初始化RabbitMQ连接失败: {0}")]
    Connect(#[source] lapin::Error),

    /// 消息发布后broker返回了nack
    #[error("消息未被broker确认: exchange = {exchange}, routing_key = {routing_key}")]
    NotConfirmed { exchange: String, routing_key: String },

    /// 消息体编解码失败
    #[error("消息编解码失败: {0}")]
    Payload(#[from] shared_lib::SharedError),

    #[error("消息内容不是合法的UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// 配置校验失败
    #[error("RabbitMQ配置无效: {0}")]
    InvalidSettings(#[from] validator::ValidationErrors),

    /// 无法根据配置拼出连接地址
    #[error("RabbitMQ连接地址无效: {0}")]
    InvalidUri(String),
}

impl RabbitError {
    /// 创建连接地址错误
    pub fn invalid_uri<T: ToString>(msg: T) -> Self {
        Self::InvalidUri(msg.to_string())
    }
}
