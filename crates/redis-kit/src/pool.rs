//! Redis 连接池管理
//!
//! 连接池在第一次使用时才创建，多个任务共享同一个连接池：
//! - 读锁快速路径：连接池已存在且未关闭时直接返回
//! - 写锁慢路径：再次检查后创建新的连接池，保证同一时间只有一个任务在创建
//!
//! 连接池被 [`RedisPoolManager::shutdown`] 关闭后，下一次 [`RedisPoolManager::acquire`] 会重新创建。

use crate::settings::RedisSettings;
use crate::RedisKitResult;
use deadpool_redis::{Connection, Pool, Runtime};
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use validator::Validate;

static GLOBAL_MANAGER: OnceLock<Arc<RedisPoolManager>> = OnceLock::new();

/// Redis连接池管理器
pub struct RedisPoolManager {
    settings: RedisSettings,
    pool: RwLock<Option<Pool>>,
}

impl RedisPoolManager {
    pub fn new(settings: RedisSettings) -> Self {
        Self {
            settings,
            pool: RwLock::new(None),
        }
    }

    /// 进程级别的默认管理器，配置来自 [`RedisSettings::load`]
    pub fn global() -> Arc<RedisPoolManager> {
        Arc::clone(GLOBAL_MANAGER.get_or_init(|| Arc::new(RedisPoolManager::new(RedisSettings::load()))))
    }

    pub fn settings(&self) -> &RedisSettings {
        &self.settings
    }

    /// 获取共享连接池，不存在或已关闭时创建
    pub async fn pool(&self) -> RedisKitResult<Pool> {
        {
            let guard = self.pool.read().await;
            if let Some(pool) = guard.as_ref().filter(|p| !p.is_closed()) {
                return Ok(pool.clone());
            }
        }

        let mut guard = self.pool.write().await;
        if let Some(pool) = guard.as_ref().filter(|p| !p.is_closed()) {
            return Ok(pool.clone());
        }

        let pool = self.create_pool().await?;
        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// 从连接池借出一个连接，连接在drop时自动归还
    ///
    /// Redis不可达或等待超时时返回错误
    pub async fn acquire(&self) -> RedisKitResult<Connection> {
        let pool = self.pool().await?;
        Ok(pool.get().await?)
    }

    /// 连接池是否已经创建且可用
    pub async fn is_initialized(&self) -> bool {
        self.pool.read().await.as_ref().is_some_and(|p| !p.is_closed())
    }

    /// 关闭并丢弃连接池
    pub async fn shutdown(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close();
            info!("📴 Redis连接池已关闭");
        }
    }

    async fn create_pool(&self) -> RedisKitResult<Pool> {
        self.settings.validate()?;

        let pool = self.settings.pool_config()?.create_pool(Some(Runtime::Tokio1))?;
        info!(
            "🗄️ Redis连接池创建成功: {}:{}/{} (max_size = {})",
            self.settings.host, self.settings.port, self.settings.database, self.settings.max_total
        );

        // 预热：借出并归还一个连接。Redis暂时不可用时连接池之后可以自行恢复，所以这里只记录日志
        match pool.get().await {
            Ok(mut conn) => {
                let pong: redis::RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
                match pong {
                    Ok(_) => debug!("Redis连接池预热完成"),
                    Err(e) => warn!("⚠️ Redis连接池预热PING失败: {}", e),
                }
            }
            Err(e) => warn!("⚠️ Redis连接池预热失败: {}", e),
        }

        Ok(pool)
    }
}
