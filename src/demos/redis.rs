use color_eyre::eyre::Context;
use color_eyre::Result;
use redis_kit::{execute_with_lock, RedisUtils};
use std::time::Duration;
use tracing::{info, warn};

const COUNTER_KEY: &str = "ps-toolkit:sample:counter";
const LOCK_KEY: &str = "ps-toolkit:sample:lock";

pub async fn run() -> Result<()> {
    let redis = RedisUtils::global();

    let alive = redis.ping().await.wrap_err("Redis不可用，请检查 redis.host / redis.port")?;
    info!("🗄️ Redis PING: {}", alive);

    redis.set_ex(COUNTER_KEY, 60, "0").await?;
    let value = redis.incr_by(COUNTER_KEY, 5).await?;
    info!("计数器: {} (ttl: {}s)", value, redis.ttl(COUNTER_KEY).await?);

    let pool = redis.manager().pool().await?;
    let result = execute_with_lock(&pool, LOCK_KEY, Duration::from_secs(10), async {
        info!("🔓 在锁保护下执行任务");
        value * 2
    })
    .await?;

    match result {
        Some(doubled) => info!("任务结果: {}", doubled),
        None => warn!("⚠️ 锁被其他进程持有，跳过任务"),
    }

    redis.del(&[COUNTER_KEY]).await?;
    Ok(())
}
