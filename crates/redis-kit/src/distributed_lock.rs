//! Redis分布式锁工具模块
//!
//! 单节点Redis锁，提供：
//! - 基于 `SET key owner NX EX ttl` 的加锁，自动过期避免死锁
//! - 基于Lua脚本的解锁，只有锁的持有者才能删除锁
//! - [`LockGuard`] 在析构时自动释放锁
//!
//! 注意：这里只依赖一个Redis节点和锁的TTL，没有续期、fencing token，也不是Redlock。
//! 在时钟漂移、进程长时间停顿或网络分区的情况下无法保证互斥。

use crate::RedisKitResult;
use deadpool_redis::Pool;
use redis::aio::ConnectionLike;
use redis::{AsyncCommands, ExistenceCheck, RedisResult, Script, SetExpiry, SetOptions};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// 未指定TTL时使用的锁过期时间
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(30);

/// 比较并删除：只有锁的值等于持有者标识时才删除
pub const RELEASE_LOCK_SCRIPT: &str =
    "if redis.call('get', KEYS[1]) == ARGV[1] then return redis.call('del', KEYS[1]) else return 0 end";

/// TTL不足1秒时使用默认值
fn effective_ttl(ttl: Duration) -> Duration {
    if ttl.as_secs() == 0 {
        DEFAULT_LOCK_TTL
    } else {
        ttl
    }
}

/// 尝试获取锁
///
/// 只有key不存在时才会写入成功，返回 `true` 表示获取到了锁
pub async fn acquire_lock<C>(conn: &mut C, lock_key: &str, owner: &str, ttl: Duration) -> RedisResult<bool>
where
    C: ConnectionLike + Send + Sync,
{
    let result: Option<String> = conn
        .set_options(
            lock_key,
            owner,
            SetOptions::default()
                .conditional_set(ExistenceCheck::NX)
                .with_expiration(SetExpiry::EX(effective_ttl(ttl).as_secs())),
        )
        .await?;

    Ok(result.is_some())
}

/// 释放锁
///
/// 锁不存在或者被其他持有者占用时什么也不做，返回 `false`
pub async fn release_lock<C>(conn: &mut C, lock_key: &str, owner: &str) -> RedisResult<bool>
where
    C: ConnectionLike + Send + Sync,
{
    let deleted: i64 = Script::new(RELEASE_LOCK_SCRIPT)
        .key(lock_key)
        .arg(owner)
        .invoke_async(conn)
        .await?;

    Ok(deleted > 0)
}

/// 分布式锁
///
/// 每个实例生成一个随机的持有者标识，用于区分不同进程/任务
pub struct DistributedLock {
    pool: Pool,
    lock_key: String,
    owner: String,
    lock_ttl: Duration,
}

impl DistributedLock {
    pub fn new<K: Into<String>>(pool: Pool, lock_key: K, lock_ttl: Duration) -> Self {
        Self {
            pool,
            lock_key: lock_key.into(),
            owner: Uuid::new_v4().to_string(),
            lock_ttl: effective_ttl(lock_ttl),
        }
    }

    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    /// 持有者标识
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// 尝试获取锁
    ///
    /// 返回 `LockGuard` 如果成功获取锁，否则返回 `None`
    pub async fn try_acquire(&self) -> RedisKitResult<Option<LockGuard>> {
        let mut conn = self.pool.get().await?;

        if acquire_lock(&mut conn, &self.lock_key, &self.owner, self.lock_ttl).await? {
            debug!("🔓 获取锁成功: {} (owner: {})", self.lock_key, self.owner);
            Ok(Some(LockGuard {
                pool: self.pool.clone(),
                lock_key: self.lock_key.clone(),
                owner: self.owner.clone(),
                released: false,
            }))
        } else {
            debug!("🔒 锁已被占用: {}", self.lock_key);
            Ok(None)
        }
    }
}

/// 锁守卫，使用RAII模式自动释放锁
///
/// 需要确认释放结果时使用 [`LockGuard::release`]
pub struct LockGuard {
    pool: Pool,
    lock_key: String,
    owner: String,
    released: bool,
}

impl LockGuard {
    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    /// 主动释放锁，返回锁是否仍由自己持有并被删除
    pub async fn release(mut self) -> RedisKitResult<bool> {
        self.released = true;
        let mut conn = self.pool.get().await?;
        Ok(release_lock(&mut conn, &self.lock_key, &self.owner).await?)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        // Drop中无法await，只能交给运行时异步释放，失败时锁会在TTL到期后自动消失
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("⚠️ 没有可用的tokio运行时，锁 {} 将在过期后自动释放", self.lock_key);
            return;
        };

        let pool = self.pool.clone();
        let lock_key = std::mem::take(&mut self.lock_key);
        let owner = std::mem::take(&mut self.owner);

        handle.spawn(async move {
            let result = match pool.get().await {
                Ok(mut conn) => release_lock(&mut conn, &lock_key, &owner).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(e) = result {
                warn!("⚠️ 自动释放锁失败: {} (key: {})", e, lock_key);
            }
        });
    }
}

/// 便捷函数：执行带锁的操作
///
/// # 参数
/// - `pool`: Redis连接池
/// - `lock_key`: 锁的键名
/// - `lock_ttl`: 锁的过期时间
/// - `operation`: 需要在锁保护下执行的操作
///
/// # 返回值
/// 返回操作的结果，如果获取锁失败则返回 `None`（操作不会被执行）
pub async fn execute_with_lock<T, F>(pool: &Pool, lock_key: &str, lock_ttl: Duration, operation: F) -> RedisKitResult<Option<T>>
where
    F: Future<Output = T>,
{
    let lock = DistributedLock::new(pool.clone(), lock_key, lock_ttl);

    match lock.try_acquire().await? {
        Some(guard) => {
            let output = operation.await;
            if let Err(e) = guard.release().await {
                warn!("⚠️ 释放锁失败: {} (key: {})", e, lock_key);
            }
            Ok(Some(output))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_ttl_falls_back_to_default() {
        assert_eq!(effective_ttl(Duration::ZERO), DEFAULT_LOCK_TTL);
        assert_eq!(effective_ttl(Duration::from_millis(500)), DEFAULT_LOCK_TTL);
        assert_eq!(effective_ttl(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn release_script_compares_owner_before_delete() {
        let script = Script::new(RELEASE_LOCK_SCRIPT);
        // 脚本内容不变时SHA也不变，服务端可以复用缓存的脚本
        assert_eq!(script.get_hash(), Script::new(RELEASE_LOCK_SCRIPT).get_hash());
        assert!(RELEASE_LOCK_SCRIPT.contains("== ARGV[1]"));
    }
}
