//! RabbitMQ 工具包
//!
//! - [`RabbitManager`]: 懒加载的共享连接，断开后自动恢复
//! - [`utils`]: 通道上的声明、发布、消费、RPC和确认操作
//! - [`consumer`]: 基于 [`DeliveryHandler`] 的手动确认消费循环
//!
//! ```no_run
//! use rabbitmq_kit::{utils, RabbitManager};
//!
//! # async fn demo() -> rabbitmq_kit::RabbitResult<()> {
//! let manager = RabbitManager::global();
//! let channel = manager.create_channel(false).await?;
//! utils::declare_queue(&channel, "orders", true).await?;
//! utils::publish_text(&channel, "", "orders", "hello", true).await?;
//! # Ok(())
//! # }
//! ```

pub mod consumer;
pub mod error;
pub mod manager;
pub mod properties;
pub mod settings;
pub mod utils;

pub use consumer::{consume_with, DeliveryHandler};
pub use error::RabbitError;
pub use manager::RabbitManager;
pub use properties::{json_properties, text_properties, QueueArgs};
pub use settings::RabbitSettings;

/// RabbitMQ工具包结果类型
pub type RabbitResult<T> = Result<T, RabbitError>;
