//! RabbitMQ 连接管理
//!
//! 连接在第一次使用时建立，之后所有通道复用同一个连接。
//! 连接断开后，下次使用时总是重新连接。开启 `automatic_recovery` 时，
//! 重连失败会等待 `network_recovery_interval` 再试一次，否则直接返回错误。

use crate::error::RabbitError;
use crate::settings::RabbitSettings;
use crate::RabbitResult;
use lapin::options::ConfirmSelectOptions;
use lapin::{Channel, Connection, ConnectionProperties};
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use validator::Validate;

static GLOBAL_MANAGER: OnceLock<Arc<RabbitManager>> = OnceLock::new();

pub struct RabbitManager {
    settings: RabbitSettings,
    connection: RwLock<Option<Arc<Connection>>>,
}

impl RabbitManager {
    pub fn new(settings: RabbitSettings) -> Self {
        Self {
            settings,
            connection: RwLock::new(None),
        }
    }

    /// 进程默认的连接管理器，配置来自 [`RabbitSettings::load`]
    pub fn global() -> Arc<RabbitManager> {
        GLOBAL_MANAGER
            .get_or_init(|| Arc::new(RabbitManager::new(RabbitSettings::load())))
            .clone()
    }

    pub fn settings(&self) -> &RabbitSettings {
        &self.settings
    }

    /// 获取共享连接，必要时建立或恢复连接
    pub async fn connection(&self) -> RabbitResult<Arc<Connection>> {
        {
            let guard = self.connection.read().await;
            if let Some(conn) = guard.as_ref().filter(|c| c.status().connected()) {
                return Ok(conn.clone());
            }
        }

        let mut guard = self.connection.write().await;
        let recovering = match guard.as_ref() {
            // 等待写锁期间其他任务可能已经连上
            Some(conn) if conn.status().connected() => return Ok(conn.clone()),
            Some(_) => true,
            None => false,
        };

        if recovering {
            warn!("⚠️ RabbitMQ连接已断开，正在重新连接");
        }

        let conn = match self.connect().await {
            Ok(conn) => conn,
            Err(e) if recovering && self.settings.automatic_recovery => {
                warn!(
                    "⚠️ 重新连接RabbitMQ失败: {}，{:?} 后重试",
                    e, self.settings.network_recovery_interval
                );
                tokio::time::sleep(self.settings.network_recovery_interval).await;
                self.connect().await?
            }
            Err(e) => return Err(e),
        };

        let conn = Arc::new(conn);
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn connect(&self) -> RabbitResult<Connection> {
        self.settings.validate()?;
        let uri = self.settings.amqp_uri()?;

        let conn = Connection::connect(&uri, ConnectionProperties::default())
            .await
            .map_err(|e| {
                error!(
                    "❌ 连接RabbitMQ失败: {}:{}{} ({})",
                    self.settings.host, self.settings.port, self.settings.vhost, e
                );
                RabbitError::Connect(e)
            })?;

        info!(
            "🐇 RabbitMQ连接已建立: {}:{} (vhost: {})",
            self.settings.host, self.settings.port, self.settings.vhost
        );
        Ok(conn)
    }

    /// 在共享连接上创建通道，`confirm_select` 为 `true` 时开启发布确认
    pub async fn create_channel(&self, confirm_select: bool) -> RabbitResult<Channel> {
        let channel = self.connection().await?.create_channel().await?;
        if confirm_select {
            channel.confirm_select(ConfirmSelectOptions::default()).await?;
        }
        Ok(channel)
    }

    pub async fn is_connected(&self) -> bool {
        self.connection
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.status().connected())
    }

    /// 关闭连接，之后再次使用会重新连接
    pub async fn close(&self) {
        let Some(conn) = self.connection.write().await.take() else {
            return;
        };

        if !conn.status().connected() {
            return;
        }

        match conn.close(200, "OK").await {
            Ok(()) => info!("📴 RabbitMQ连接已关闭"),
            Err(e) => warn!("⚠️ 关闭RabbitMQ连接失败: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // 1号端口没有服务监听，连接会被立即拒绝
    fn unreachable_settings() -> RabbitSettings {
        RabbitSettings {
            port: 1,
            automatic_recovery: false,
            connection_timeout: Duration::from_millis(500),
            ..RabbitSettings::default()
        }
    }

    #[tokio::test]
    async fn failed_connect_is_retried_on_every_call() {
        let manager = RabbitManager::new(unreachable_settings());

        for _ in 0..2 {
            let err = manager.connection().await.unwrap_err();
            assert!(matches!(err, RabbitError::Connect(_)), "unexpected error: {err}");
        }
        assert!(!manager.is_connected().await);

        // 没有连接时关闭是空操作
        manager.close().await;
        assert!(!manager.is_connected().await);
    }

    #[tokio::test]
    async fn invalid_settings_are_rejected_before_connecting() {
        let manager = RabbitManager::new(RabbitSettings {
            host: String::new(),
            ..unreachable_settings()
        });

        let err = manager.create_channel(false).await.unwrap_err();
        assert!(matches!(err, RabbitError::InvalidSettings(_)));
    }
}
