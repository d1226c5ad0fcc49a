use super::OrderEvent;
use color_eyre::eyre::Context;
use color_eyre::Result;
use rabbitmq_kit::{utils, QueueArgs, RabbitManager};
use std::time::Duration;
use tracing::info;

const QUEUE: &str = "ps-toolkit.sample.orders";

pub async fn run() -> Result<()> {
    let manager = RabbitManager::global();
    let channel = manager
        .create_channel(false)
        .await
        .wrap_err("RabbitMQ不可用，请检查 rabbitmq.host / rabbitmq.port")?;

    let args = QueueArgs::new().message_ttl(Duration::from_secs(300)).max_length(1000);
    let queue = utils::declare_queue_with_args(&channel, QUEUE, true, false, false, args).await?;
    info!("🐇 队列已声明: {} (消息数: {})", queue.name().as_str(), queue.message_count());

    let event = OrderEvent {
        order_id: 2002,
        sku: "SKU-9".to_string(),
        quantity: 1,
        created_at: chrono::Local::now().naive_local(),
    };
    utils::publish_json(&channel, "", QUEUE, &event, true).await?;

    // 等待broker落盘后再拉取
    tokio::time::sleep(Duration::from_millis(200)).await;
    let received: Option<OrderEvent> = utils::get_json(&channel, QUEUE).await?;
    info!("📨 收到订单: {:?}", received);

    utils::close_quietly(&channel).await;
    Ok(())
}
