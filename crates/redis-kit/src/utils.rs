//! Redis 常用命令封装
//!
//! 每次调用从连接池借出一个连接，命令执行完成后连接自动归还。
//! 命令的响应超时为 `redis.timeout`，超时返回 [`RedisKitError::Timeout`]。
//! 错误直接返回给调用方，不做重试。

use crate::distributed_lock::{self, DistributedLock};
use crate::error::RedisKitError;
use crate::pool::RedisPoolManager;
use crate::RedisKitResult;
use redis::{AsyncCommands, RedisResult, Value};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct RedisUtils {
    manager: Arc<RedisPoolManager>,
}

impl RedisUtils {
    pub fn new(manager: Arc<RedisPoolManager>) -> Self {
        Self { manager }
    }

    /// 使用进程默认的连接池
    pub fn global() -> Self {
        Self::new(RedisPoolManager::global())
    }

    pub fn manager(&self) -> &Arc<RedisPoolManager> {
        &self.manager
    }

    /// 在 `redis.timeout` 内等待命令返回
    async fn timed<T, F>(&self, command: F) -> RedisKitResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        self.timed_with(Duration::ZERO, command).await
    }

    /// `blocking` 为命令本身允许阻塞的时间，会加到响应超时上
    async fn timed_with<T, F>(&self, blocking: Duration, command: F) -> RedisKitResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        let limit = blocking + self.manager.settings().timeout;
        match tokio::time::timeout(limit, command).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(RedisKitError::Timeout(limit)),
        }
    }

    // --------------- Key/Value ---------------

    pub async fn get(&self, key: &str) -> RedisKitResult<Option<String>> {
        let mut conn = self.manager.acquire().await?;
        let value: Option<String> = self.timed(conn.get(key)).await?;
        Ok(value)
    }

    pub async fn set(&self, key: &str, value: &str) -> RedisKitResult<()> {
        let mut conn = self.manager.acquire().await?;
        let _: () = self.timed(conn.set(key, value)).await?;
        Ok(())
    }

    pub async fn set_ex(&self, key: &str, seconds: u64, value: &str) -> RedisKitResult<()> {
        let mut conn = self.manager.acquire().await?;
        let _: () = self.timed(conn.set_ex(key, value, seconds)).await?;
        Ok(())
    }

    /// 删除一个或多个key，返回实际删除的数量
    pub async fn del(&self, keys: &[&str]) -> RedisKitResult<i64> {
        let mut conn = self.manager.acquire().await?;
        let deleted: i64 = self.timed(conn.del(keys)).await?;
        Ok(deleted)
    }

    pub async fn exists(&self, key: &str) -> RedisKitResult<bool> {
        let mut conn = self.manager.acquire().await?;
        let exists: bool = self.timed(conn.exists(key)).await?;
        Ok(exists)
    }

    /// 设置过期时间，key不存在时返回 `false`
    pub async fn expire(&self, key: &str, seconds: i64) -> RedisKitResult<bool> {
        let mut conn = self.manager.acquire().await?;
        let updated: bool = self.timed(conn.expire(key, seconds)).await?;
        Ok(updated)
    }

    /// 剩余过期秒数：`-1` 表示没有过期时间，`-2` 表示key不存在
    pub async fn ttl(&self, key: &str) -> RedisKitResult<i64> {
        let mut conn = self.manager.acquire().await?;
        let ttl: i64 = self.timed(conn.ttl(key)).await?;
        Ok(ttl)
    }

    pub async fn incr_by(&self, key: &str, delta: i64) -> RedisKitResult<i64> {
        let mut conn = self.manager.acquire().await?;
        let value: i64 = self.timed(conn.incr(key, delta)).await?;
        Ok(value)
    }

    pub async fn decr_by(&self, key: &str, delta: i64) -> RedisKitResult<i64> {
        let mut conn = self.manager.acquire().await?;
        let value: i64 = self.timed(conn.decr(key, delta)).await?;
        Ok(value)
    }

    // --------------- Hashes ---------------

    /// 返回新增的字段数量（覆盖已有字段时为0）
    pub async fn hset(&self, key: &str, field: &str, value: &str) -> RedisKitResult<i64> {
        let mut conn = self.manager.acquire().await?;
        let added: i64 = self.timed(conn.hset(key, field, value)).await?;
        Ok(added)
    }

    pub async fn hget(&self, key: &str, field: &str) -> RedisKitResult<Option<String>> {
        let mut conn = self.manager.acquire().await?;
        let value: Option<String> = self.timed(conn.hget(key, field)).await?;
        Ok(value)
    }

    pub async fn hmset(&self, key: &str, fields: &HashMap<String, String>) -> RedisKitResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let items: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let mut conn = self.manager.acquire().await?;
        let _: () = self.timed(conn.hset_multiple(key, items.as_slice())).await?;
        Ok(())
    }

    /// 按字段顺序返回，不存在的字段为 `None`
    pub async fn hmget(&self, key: &str, fields: &[&str]) -> RedisKitResult<Vec<Option<String>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.manager.acquire().await?;
        let values: Vec<Option<String>> = self.timed(redis::cmd("HMGET").arg(key).arg(fields).query_async(&mut conn)).await?;
        Ok(values)
    }

    pub async fn hgetall(&self, key: &str) -> RedisKitResult<HashMap<String, String>> {
        let mut conn = self.manager.acquire().await?;
        let map: HashMap<String, String> = self.timed(conn.hgetall(key)).await?;
        Ok(map)
    }

    pub async fn hdel(&self, key: &str, fields: &[&str]) -> RedisKitResult<i64> {
        let mut conn = self.manager.acquire().await?;
        let removed: i64 = self.timed(conn.hdel(key, fields)).await?;
        Ok(removed)
    }

    // --------------- Lists ---------------

    /// 返回push之后列表的长度
    pub async fn lpush(&self, key: &str, values: &[&str]) -> RedisKitResult<i64> {
        let mut conn = self.manager.acquire().await?;
        let len: i64 = self.timed(conn.lpush(key, values)).await?;
        Ok(len)
    }

    pub async fn rpop(&self, key: &str) -> RedisKitResult<Option<String>> {
        let mut conn = self.manager.acquire().await?;
        let value: Option<String> = self.timed(conn.rpop(key, None)).await?;
        Ok(value)
    }

    /// 阻塞弹出，返回 `(key, value)`，超时返回 `None`
    pub async fn blpop(&self, keys: &[&str], timeout: Duration) -> RedisKitResult<Option<(String, String)>> {
        let mut conn = self.manager.acquire().await?;
        // 阻塞时间之外再留出一个响应超时
        let popped: Option<(String, String)> = self
            .timed_with(timeout, conn.blpop(keys, timeout.as_secs_f64()))
            .await?;
        Ok(popped)
    }

    // --------------- Sets ---------------

    pub async fn sadd(&self, key: &str, members: &[&str]) -> RedisKitResult<i64> {
        let mut conn = self.manager.acquire().await?;
        let added: i64 = self.timed(conn.sadd(key, members)).await?;
        Ok(added)
    }

    pub async fn srem(&self, key: &str, members: &[&str]) -> RedisKitResult<i64> {
        let mut conn = self.manager.acquire().await?;
        let removed: i64 = self.timed(conn.srem(key, members)).await?;
        Ok(removed)
    }

    pub async fn smembers(&self, key: &str) -> RedisKitResult<HashSet<String>> {
        let mut conn = self.manager.acquire().await?;
        let members: HashSet<String> = self.timed(conn.smembers(key)).await?;
        Ok(members)
    }

    // --------------- Pub/Sub ---------------

    /// 返回收到消息的订阅者数量
    pub async fn publish(&self, channel: &str, message: &str) -> RedisKitResult<i64> {
        let mut conn = self.manager.acquire().await?;
        let receivers: i64 = self.timed(conn.publish(channel, message)).await?;
        Ok(receivers)
    }

    // --------------- Scripting ---------------

    pub async fn eval(&self, script: &str, keys: &[&str], args: &[&str]) -> RedisKitResult<Value> {
        let mut conn = self.manager.acquire().await?;
        let value: Value = self
            .timed(
                redis::cmd("EVAL")
                    .arg(script)
                    .arg(keys.len())
                    .arg(keys)
                    .arg(args)
                    .query_async(&mut conn),
            )
            .await?;
        Ok(value)
    }

    // --------------- Health check ---------------

    pub async fn ping(&self) -> RedisKitResult<bool> {
        let mut conn = self.manager.acquire().await?;
        let pong: String = self.timed(redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(pong.eq_ignore_ascii_case("PONG"))
    }

    // --------------- Distributed lock ---------------

    /// 获取分布式锁
    ///
    /// - `owner`: 持有者唯一标识（比如UUID）
    /// - `ttl`: 锁的过期时间，不足1秒时使用30秒
    pub async fn acquire_lock(&self, lock_key: &str, owner: &str, ttl: Duration) -> RedisKitResult<bool> {
        let mut conn = self.manager.acquire().await?;
        self.timed(distributed_lock::acquire_lock(&mut conn, lock_key, owner, ttl)).await
    }

    /// 释放分布式锁，只有持有者才能释放
    pub async fn release_lock(&self, lock_key: &str, owner: &str) -> RedisKitResult<bool> {
        let mut conn = self.manager.acquire().await?;
        self.timed(distributed_lock::release_lock(&mut conn, lock_key, owner)).await
    }

    /// 创建一个使用共享连接池的 [`DistributedLock`]
    pub async fn lock(&self, lock_key: &str, ttl: Duration) -> RedisKitResult<DistributedLock> {
        Ok(DistributedLock::new(self.manager.pool().await?, lock_key, ttl))
    }
}
