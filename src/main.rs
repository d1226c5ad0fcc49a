use color_eyre::Result;
use rabbitmq_kit::RabbitManager;
use redis_kit::RedisPoolManager;
use shared_lib::ConfigLoader;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod demos;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚀 ps-toolkit 示例程序启动");

    // 读取.env与application.properties
    let config = ConfigLoader::global();

    demos::json::run()?;

    if config.get_bool("run.redis.sample", false) {
        demos::redis::run().await?;
    } else {
        info!("跳过Redis示例，设置 RUN_REDIS_SAMPLE=1 开启");
    }

    if config.get_bool("run.rabbitmq.sample", false) {
        demos::rabbitmq::run().await?;
    } else {
        info!("跳过RabbitMQ示例，设置 RUN_RABBITMQ_SAMPLE=1 开启");
    }

    RedisPoolManager::global().shutdown().await;
    RabbitManager::global().close().await;

    info!("👋 示例程序结束");
    Ok(())
}
