//! 📋 错误处理模块
//!
//! 定义了共享库中使用的统一错误类型

use thiserror::Error;

/// 共享库错误类型
#[derive(Error, Debug)]
pub enum SharedError {
    #[error("❌ 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("❌ 验证错误: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("❌ 读取配置文件 {path} 失败: {source}")]
    ConfigFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 共享库的 Result 类型
pub type Result<T> = std::result::Result<T, SharedError>;

impl SharedError {
    /// 创建配置文件读取错误
    pub fn config_file<P: ToString>(path: P, source: std::io::Error) -> Self {
        Self::ConfigFile {
            path: path.to_string(),
            source,
        }
    }
}
