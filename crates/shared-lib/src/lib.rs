//! 🔧 共享库模块
//!
//! 这个模块包含了在多个工具包之间共享的通用代码，包括：
//! - 错误类型
//! - 分层配置加载
//! - JSON 编解码工具

pub mod config;
pub mod error;
pub mod json;

// 重新导出常用类型
pub use config::ConfigLoader;
pub use error::{Result, SharedError};
