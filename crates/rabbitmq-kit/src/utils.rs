//! RabbitMQ 通道操作封装
//!
//! 所有函数都作用于调用方传入的 [`Channel`]，通道的创建见 [`create_channel`]。
//! 错误直接返回给调用方，不做重试。

use crate::error::RabbitError;
use crate::manager::RabbitManager;
use crate::properties::{headers_from, json_properties, text_properties};
use crate::{QueueArgs, RabbitResult};
use futures::StreamExt;
use lapin::message::{BasicGetMessage, Delivery};
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, BasicRejectOptions, ConfirmSelectOptions, ExchangeDeclareOptions, ExchangeDeleteOptions,
    QueueBindOptions, QueueDeclareOptions, QueueDeleteOptions, QueuePurgeOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Consumer, ExchangeKind, Queue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// `rpc_call` 未指定超时时间时的等待时长
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

fn consumer_tag() -> String {
    format!("ps-toolkit-{}", Uuid::new_v4())
}

// --------------- Channel ---------------

pub async fn create_channel(manager: &RabbitManager, confirm_select: bool) -> RabbitResult<Channel> {
    manager.create_channel(confirm_select).await
}

/// 设置预取数量，`0` 表示不限制，此时不发送 `basic.qos`
pub async fn set_qos(channel: &Channel, prefetch: u16) -> RabbitResult<()> {
    if prefetch == 0 {
        return Ok(());
    }
    channel.basic_qos(prefetch, BasicQosOptions::default()).await?;
    Ok(())
}

/// 关闭通道，失败只记录日志
pub async fn close_quietly(channel: &Channel) {
    if let Err(e) = channel.close(200, "OK").await {
        warn!("⚠️ 关闭RabbitMQ通道失败: {}", e);
    }
}

// --------------- Topology ---------------

pub async fn declare_exchange(channel: &Channel, exchange: &str, kind: ExchangeKind, durable: bool) -> RabbitResult<()> {
    declare_exchange_with(channel, exchange, kind, durable, false, FieldTable::default()).await
}

pub async fn declare_exchange_with(
    channel: &Channel,
    exchange: &str,
    kind: ExchangeKind,
    durable: bool,
    auto_delete: bool,
    arguments: FieldTable,
) -> RabbitResult<()> {
    let options = ExchangeDeclareOptions {
        durable,
        auto_delete,
        ..ExchangeDeclareOptions::default()
    };
    channel.exchange_declare(exchange, kind, options, arguments).await?;
    Ok(())
}

pub async fn delete_exchange(channel: &Channel, exchange: &str) -> RabbitResult<()> {
    channel.exchange_delete(exchange, ExchangeDeleteOptions::default()).await?;
    Ok(())
}

/// 声明一个非独占、不自动删除的队列
pub async fn declare_queue(channel: &Channel, queue: &str, durable: bool) -> RabbitResult<Queue> {
    declare_queue_with(channel, queue, durable, false, false, FieldTable::default()).await
}

/// 队列名为空时由broker生成队列名，见 [`Queue::name`]
pub async fn declare_queue_with(
    channel: &Channel,
    queue: &str,
    durable: bool,
    exclusive: bool,
    auto_delete: bool,
    arguments: FieldTable,
) -> RabbitResult<Queue> {
    let options = QueueDeclareOptions {
        durable,
        exclusive,
        auto_delete,
        ..QueueDeclareOptions::default()
    };
    Ok(channel.queue_declare(queue, options, arguments).await?)
}

/// 带死信、TTL、优先级、长度限制等参数声明队列
pub async fn declare_queue_with_args(
    channel: &Channel,
    queue: &str,
    durable: bool,
    exclusive: bool,
    auto_delete: bool,
    args: QueueArgs,
) -> RabbitResult<Queue> {
    declare_queue_with(channel, queue, durable, exclusive, auto_delete, args.into_field_table()).await
}

pub async fn bind_queue(channel: &Channel, queue: &str, exchange: &str, routing_key: &str) -> RabbitResult<()> {
    channel
        .queue_bind(queue, exchange, routing_key, QueueBindOptions::default(), FieldTable::default())
        .await?;
    Ok(())
}

pub async fn unbind_queue(channel: &Channel, queue: &str, exchange: &str, routing_key: &str) -> RabbitResult<()> {
    channel
        .queue_unbind(queue, exchange, routing_key, FieldTable::default())
        .await?;
    Ok(())
}

/// 清空队列，返回被删除的消息数量
pub async fn purge_queue(channel: &Channel, queue: &str) -> RabbitResult<u32> {
    Ok(channel.queue_purge(queue, QueuePurgeOptions::default()).await?)
}

/// 删除队列，返回队列中剩余的消息数量
pub async fn delete_queue(channel: &Channel, queue: &str) -> RabbitResult<u32> {
    Ok(channel.queue_delete(queue, QueueDeleteOptions::default()).await?)
}

// --------------- Publish ---------------

/// 发布原始字节消息
///
/// `mandatory` 为 `true` 时，无法路由的消息会被broker退回
pub async fn publish(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    body: &[u8],
    properties: BasicProperties,
    mandatory: bool,
) -> RabbitResult<()> {
    let options = BasicPublishOptions {
        mandatory,
        ..BasicPublishOptions::default()
    };
    channel
        .basic_publish(exchange, routing_key, options, body, properties)
        .await?;
    Ok(())
}

pub async fn publish_str(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    body: &str,
    properties: BasicProperties,
) -> RabbitResult<()> {
    publish(channel, exchange, routing_key, body.as_bytes(), properties, false).await
}

/// 发布 `text/plain` 消息
pub async fn publish_text(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    text: &str,
    persistent: bool,
) -> RabbitResult<()> {
    publish_str(channel, exchange, routing_key, text, text_properties(persistent)).await
}

/// 序列化为JSON后以 `application/json` 发布
pub async fn publish_json<T: Serialize + ?Sized>(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    payload: &T,
    persistent: bool,
) -> RabbitResult<()> {
    let body = shared_lib::json::to_json(payload)?;
    publish_str(channel, exchange, routing_key, &body, json_properties(persistent)).await
}

/// 发布带字符串消息头的文本消息
pub async fn publish_with_headers<K, V, I>(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    body: &str,
    headers: I,
    persistent: bool,
) -> RabbitResult<()>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let properties = text_properties(persistent).with_headers(headers_from(headers));
    publish_str(channel, exchange, routing_key, body, properties).await
}

/// 发布并等待broker确认
///
/// 通道会被切换到确认模式（重复切换是允许的），broker返回nack时报错
pub async fn publish_and_confirm(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    body: &[u8],
    properties: BasicProperties,
) -> RabbitResult<()> {
    channel.confirm_select(ConfirmSelectOptions::default()).await?;

    let confirmation = channel
        .basic_publish(exchange, routing_key, BasicPublishOptions::default(), body, properties)
        .await?
        .await?;

    if confirmation.is_nack() {
        return Err(RabbitError::NotConfirmed {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
        });
    }
    Ok(())
}

// --------------- Request / reply ---------------

/// 发送请求并等待回复
///
/// 为本次调用声明一个由broker命名的独占临时队列作为 `reply_to`，
/// 只接受 `correlation_id` 相同的回复。超时返回 `None`，`timeout` 为0时等待30秒。
pub async fn rpc_call(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    body: &[u8],
    timeout: Duration,
) -> RabbitResult<Option<Vec<u8>>> {
    let reply_queue = declare_queue_with(channel, "", false, true, true, FieldTable::default()).await?;
    let correlation_id = Uuid::new_v4().to_string();
    let tag = consumer_tag();

    let mut consumer = channel
        .basic_consume(
            reply_queue.name().as_str(),
            &tag,
            BasicConsumeOptions {
                no_ack: true,
                ..BasicConsumeOptions::default()
            },
            FieldTable::default(),
        )
        .await?;

    let properties = BasicProperties::default()
        .with_correlation_id(correlation_id.clone().into())
        .with_reply_to(reply_queue.name().clone());
    publish(channel, exchange, routing_key, body, properties, false).await?;

    let timeout = if timeout.is_zero() { DEFAULT_RPC_TIMEOUT } else { timeout };
    let reply = tokio::time::timeout(timeout, wait_for_reply(&mut consumer, &correlation_id)).await;

    if let Err(e) = channel.basic_cancel(&tag, BasicCancelOptions::default()).await {
        warn!("⚠️ 取消RPC回复消费者失败: {} (tag: {})", e, tag);
    }

    match reply {
        Ok(result) => result,
        Err(_) => {
            debug!("⏰ RPC调用超时: {} -> {} ({:?})", exchange, routing_key, timeout);
            Ok(None)
        }
    }
}

async fn wait_for_reply(consumer: &mut Consumer, correlation_id: &str) -> RabbitResult<Option<Vec<u8>>> {
    while let Some(delivery) = consumer.next().await {
        let delivery = delivery?;
        let matches = delivery
            .properties
            .correlation_id()
            .as_ref()
            .is_some_and(|id| id.as_str() == correlation_id);

        if matches {
            return Ok(Some(delivery.data));
        }
        debug!("忽略不匹配的RPC回复: {:?}", delivery.properties.correlation_id());
    }
    Ok(None)
}

/// 回复一条RPC请求
///
/// 通过默认交换机发送到请求的 `reply_to` 队列，并带上相同的 `correlation_id`。
/// 请求没有 `reply_to` 时返回 `false`
pub async fn rpc_reply(channel: &Channel, request: &Delivery, body: &[u8]) -> RabbitResult<bool> {
    let Some(reply_to) = request.properties.reply_to().as_ref() else {
        return Ok(false);
    };

    let mut properties = BasicProperties::default();
    if let Some(correlation_id) = request.properties.correlation_id().as_ref() {
        properties = properties.with_correlation_id(correlation_id.clone());
    }

    publish(channel, "", reply_to.as_str(), body, properties, false).await?;
    Ok(true)
}

// --------------- Consume ---------------

/// 开始消费，`auto_ack` 为 `true` 时broker投递即视为确认
pub async fn consume(channel: &Channel, queue: &str, auto_ack: bool) -> RabbitResult<Consumer> {
    let options = BasicConsumeOptions {
        no_ack: auto_ack,
        ..BasicConsumeOptions::default()
    };
    Ok(channel
        .basic_consume(queue, &consumer_tag(), options, FieldTable::default())
        .await?)
}

/// 手动确认模式消费，先设置预取数量
pub async fn consume_manual_ack(channel: &Channel, queue: &str, prefetch: u16) -> RabbitResult<Consumer> {
    set_qos(channel, prefetch).await?;
    consume(channel, queue, false).await
}

/// 拉取一条消息，队列为空时返回 `None`
pub async fn get(channel: &Channel, queue: &str, auto_ack: bool) -> RabbitResult<Option<BasicGetMessage>> {
    Ok(channel.basic_get(queue, BasicGetOptions { no_ack: auto_ack }).await?)
}

/// 以自动确认方式拉取一条文本消息
pub async fn get_string(channel: &Channel, queue: &str) -> RabbitResult<Option<String>> {
    match get(channel, queue, true).await? {
        Some(message) => Ok(Some(String::from_utf8(message.delivery.data)?)),
        None => Ok(None),
    }
}

/// 以自动确认方式拉取一条JSON消息
pub async fn get_json<T: DeserializeOwned>(channel: &Channel, queue: &str) -> RabbitResult<Option<T>> {
    match get(channel, queue, true).await? {
        Some(message) => Ok(Some(shared_lib::json::from_slice(&message.delivery.data)?)),
        None => Ok(None),
    }
}

// --------------- Ack ---------------

pub async fn ack(channel: &Channel, delivery_tag: u64, multiple: bool) -> RabbitResult<()> {
    channel.basic_ack(delivery_tag, BasicAckOptions { multiple }).await?;
    Ok(())
}

pub async fn nack(channel: &Channel, delivery_tag: u64, multiple: bool, requeue: bool) -> RabbitResult<()> {
    channel
        .basic_nack(delivery_tag, BasicNackOptions { multiple, requeue })
        .await?;
    Ok(())
}

pub async fn reject(channel: &Channel, delivery_tag: u64, requeue: bool) -> RabbitResult<()> {
    channel.basic_reject(delivery_tag, BasicRejectOptions { requeue }).await?;
    Ok(())
}
