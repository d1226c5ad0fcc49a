//! 消息属性与队列参数构建

use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::BasicProperties;
use std::collections::HashMap;
use std::time::Duration;

pub const CONTENT_TYPE_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_ENCODING_UTF8: &str = "UTF-8";

/// 持久化消息的 delivery mode
pub const DELIVERY_MODE_PERSISTENT: u8 = 2;
/// 非持久化消息的 delivery mode
pub const DELIVERY_MODE_TRANSIENT: u8 = 1;

pub fn delivery_mode(persistent: bool) -> u8 {
    if persistent {
        DELIVERY_MODE_PERSISTENT
    } else {
        DELIVERY_MODE_TRANSIENT
    }
}

/// 纯文本消息属性：`text/plain; UTF-8`
pub fn text_properties(persistent: bool) -> BasicProperties {
    BasicProperties::default()
        .with_content_type(CONTENT_TYPE_TEXT.into())
        .with_content_encoding(CONTENT_ENCODING_UTF8.into())
        .with_delivery_mode(delivery_mode(persistent))
}

/// JSON消息属性：`application/json; UTF-8`
pub fn json_properties(persistent: bool) -> BasicProperties {
    BasicProperties::default()
        .with_content_type(CONTENT_TYPE_JSON.into())
        .with_content_encoding(CONTENT_ENCODING_UTF8.into())
        .with_delivery_mode(delivery_mode(persistent))
}

/// 把字符串键值对转换成消息头
pub fn headers_from<K, V, I>(headers: I) -> FieldTable
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut table = FieldTable::default();
    for (key, value) in headers {
        table.insert(
            ShortString::from(key.into()),
            AMQPValue::LongString(LongString::from(value.into())),
        );
    }
    table
}

/// 读取字符串类型的消息头
pub fn header_str<'a>(properties: &'a BasicProperties, key: &str) -> Option<&'a str> {
    let headers = properties.headers().as_ref()?;
    match headers.inner().get(&ShortString::from(key))? {
        AMQPValue::LongString(value) => std::str::from_utf8(value.as_bytes()).ok(),
        AMQPValue::ShortString(value) => Some(value.as_str()),
        _ => None,
    }
}

/// 队列声明参数
///
/// 数值不大于0、字符串为空的参数不会写入 `x-*` 参数表
#[derive(Debug, Clone, Default)]
pub struct QueueArgs {
    pub dead_letter_exchange: Option<String>,
    pub dead_letter_routing_key: Option<String>,
    pub message_ttl: Option<Duration>,
    pub max_priority: Option<u8>,
    pub max_length: Option<i64>,
    pub max_length_bytes: Option<i64>,
    extra: HashMap<String, AMQPValue>,
}

impl QueueArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dead_letter_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.dead_letter_exchange = Some(exchange.into());
        self
    }

    pub fn dead_letter_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.dead_letter_routing_key = Some(routing_key.into());
        self
    }

    pub fn message_ttl(mut self, ttl: Duration) -> Self {
        self.message_ttl = Some(ttl);
        self
    }

    pub fn max_priority(mut self, priority: u8) -> Self {
        self.max_priority = Some(priority);
        self
    }

    pub fn max_length(mut self, length: i64) -> Self {
        self.max_length = Some(length);
        self
    }

    pub fn max_length_bytes(mut self, bytes: i64) -> Self {
        self.max_length_bytes = Some(bytes);
        self
    }

    /// 其他 broker 支持的参数，例如 `x-queue-mode`
    pub fn with_arg(mut self, key: impl Into<String>, value: AMQPValue) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn into_field_table(self) -> FieldTable {
        let mut table = FieldTable::default();

        for (key, value) in self.extra {
            table.insert(ShortString::from(key), value);
        }

        let strings = [
            ("x-dead-letter-exchange", self.dead_letter_exchange),
            ("x-dead-letter-routing-key", self.dead_letter_routing_key),
        ];
        for (key, value) in strings {
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                table.insert(key.into(), AMQPValue::LongString(LongString::from(value)));
            }
        }

        let numbers = [
            // 超出i64范围的TTL直接丢弃
            ("x-message-ttl", self.message_ttl.and_then(|ttl| i64::try_from(ttl.as_millis()).ok())),
            ("x-max-priority", self.max_priority.map(i64::from)),
            ("x-max-length", self.max_length),
            ("x-max-length-bytes", self.max_length_bytes),
        ];
        for (key, value) in numbers {
            if let Some(value) = value.filter(|v| *v > 0) {
                table.insert(key.into(), AMQPValue::LongLongInt(value));
            }
        }

        table
    }
}

impl From<QueueArgs> for FieldTable {
    fn from(args: QueueArgs) -> Self {
        args.into_field_table()
    }
}
