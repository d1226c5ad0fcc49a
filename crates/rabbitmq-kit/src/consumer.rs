//! 手动确认模式的消费循环

use crate::utils::consume_manual_ack;
use crate::RabbitResult;
use async_trait::async_trait;
use color_eyre::Result;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicCancelOptions, BasicNackOptions};
use lapin::Channel;
use tokio::sync::watch::Receiver;
use tracing::{debug, error, info, warn};

/// 消息处理器
///
/// 处理成功后消息被ack，返回错误时消息被nack，是否重新入队由 [`DeliveryHandler::requeue_on_error`] 决定
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Result<()>;

    /// 默认不重新入队，交给死信队列（如果有）处理
    fn requeue_on_error(&self) -> bool {
        false
    }
}

/// 持续消费 `queue`，直到 `shutdown_rx` 收到 `true` 或者消费者被broker取消
pub async fn consume_with<H>(
    channel: &Channel,
    queue: &str,
    prefetch: u16,
    handler: &H,
    mut shutdown_rx: Receiver<bool>,
) -> RabbitResult<()>
where
    H: DeliveryHandler + ?Sized,
{
    let mut consumer = consume_manual_ack(channel, queue, prefetch).await?;
    let tag = consumer.tag().as_str().to_string();
    info!("🐇 开始消费队列: {} (tag: {}, prefetch: {})", queue, tag, prefetch);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // 发送端被丢弃时同样退出
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            next = consumer.next() => {
                let Some(delivery) = next else {
                    warn!("⚠️ 消费者已被broker取消: {}", tag);
                    return Ok(());
                };
                handle_delivery(&delivery?, handler).await?;
            }
        }
    }

    if let Err(e) = channel.basic_cancel(&tag, BasicCancelOptions::default()).await {
        warn!("⚠️ 取消消费者失败: {} (tag: {})", e, tag);
    }
    info!("📴 停止消费队列: {}", queue);

    Ok(())
}

async fn handle_delivery<H>(delivery: &Delivery, handler: &H) -> RabbitResult<()>
where
    H: DeliveryHandler + ?Sized,
{
    debug!("processing delivery {} from {}", delivery.delivery_tag, delivery.routing_key);

    match handler.handle(delivery).await {
        Ok(()) => {
            delivery.ack(BasicAckOptions::default()).await?;
        }
        Err(err) => {
            let requeue = handler.requeue_on_error();
            error!(
                "failed to handle delivery {} (requeue: {}): {}",
                delivery.delivery_tag, requeue, err
            );
            delivery
                .nack(BasicNackOptions {
                    requeue,
                    ..BasicNackOptions::default()
                })
                .await?;
        }
    }

    Ok(())
}
