//! 各个工具包的使用示例

pub mod json;
pub mod rabbitmq;
pub mod redis;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 示例使用的订单消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub order_id: u64,
    pub sku: String,
    pub quantity: u32,

    #[serde(with = "shared_lib::json::datetime_format")]
    pub created_at: NaiveDateTime,
}
