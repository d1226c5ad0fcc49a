//! Redis 工具包
//!
//! 基于 [`deadpool_redis`] 连接池的 Redis 封装：
//! - [`pool`]: 懒加载的共享连接池
//! - [`utils`]: 常用命令
//! - [`distributed_lock`]: 单节点分布式锁
//!
//! ```rust,no_run
//! use redis_kit::RedisUtils;
//! use std::time::Duration;
//!
//! # async fn demo() -> redis_kit::RedisKitResult<()> {
//! let redis = RedisUtils::global();
//! redis.set("pstoolkit:hello", "world").await?;
//!
//! if redis.acquire_lock("pstoolkit:lock", "worker-1", Duration::from_secs(10)).await? {
//!     // 临界区
//!     redis.release_lock("pstoolkit:lock", "worker-1").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod distributed_lock;
pub mod error;
pub mod pool;
pub mod settings;
pub mod utils;

pub use distributed_lock::{execute_with_lock, DistributedLock, LockGuard};
pub use error::RedisKitError;
pub use pool::RedisPoolManager;
pub use settings::RedisSettings;
pub use utils::RedisUtils;

/// Redis工具包操作结果类型
pub type RedisKitResult<T> = Result<T, RedisKitError>;
