use super::OrderEvent;
use color_eyre::Result;
use shared_lib::json;
use tracing::info;

pub fn run() -> Result<()> {
    let event = OrderEvent {
        order_id: 1001,
        sku: "SKU-<42>".to_string(),
        quantity: 3,
        created_at: chrono::Local::now().naive_local(),
    };

    let raw = json::to_json(&event)?;
    info!("📝 订单JSON: {}", raw);

    let decoded: OrderEvent = json::from_json(&raw)?;
    let fields = json::to_map(&decoded)?;
    info!("🔑 订单字段: {:?}", fields.keys().collect::<Vec<_>>());

    let fallback: Vec<OrderEvent> = json::from_json_or_default("not json");
    info!("解析失败时使用默认值: {} 条", fallback.len());

    Ok(())
}
