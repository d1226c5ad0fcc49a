use thiserror::Error;

/// Redis工具包错误类型
#[derive(Error, Debug)]
pub enum RedisKitError {
    /// Redis 命令错误
    #[error("Redis错误: {0}")]
    Redis(#[from] redis::RedisError),

    /// 从连接池获取连接失败（服务不可达、等待超时、连接池已关闭）
    #[error("获取Redis连接失败: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// 创建连接池失败
    #[error("创建Redis连接池失败: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),

    /// 配置校验失败
    #[error("Redis配置无效: {0}")]
    InvalidSettings(#[from] validator::ValidationErrors),

    /// 命令在 `redis.timeout` 内没有返回
    #[error("Redis命令超时: {0:?}")]
    Timeout(std::time::Duration),

    /// 无法根据配置拼出连接地址
    #[error("Redis连接地址无效: {0}")]
    InvalidUrl(String),
}

impl RedisKitError {
    /// 创建连接地址错误
    pub fn invalid_url<T: ToString>(msg: T) -> Self {
        Self::InvalidUrl(msg.to_string())
    }
}
