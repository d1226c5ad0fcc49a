//! Redis 连接配置
//!
//! 所有配置项都通过 [`ConfigLoader`] 读取，支持覆盖值/环境变量/properties文件：
//!
//! | 配置键 | 环境变量 | 默认值 |
//! |---|---|---|
//! | `redis.host` | `REDIS_HOST` | `127.0.0.1` |
//! | `redis.port` | `REDIS_PORT` | `6379` |
//! | `redis.password` | `REDIS_PASSWORD` | 无 |
//! | `redis.database` | `REDIS_DATABASE` | `0` |
//! | `redis.timeout` | `REDIS_TIMEOUT` | `2000`（毫秒） |
//! | `redis.ssl` | `REDIS_SSL` | `false` |
//! | `redis.pool.maxTotal` | `REDIS_POOL_MAXTOTAL` | `64` |
//! | `redis.pool.maxWaitMillis` | `REDIS_POOL_MAXWAITMILLIS` | `3000` |
//! | `redis.pool.blockWhenExhausted` | `REDIS_POOL_BLOCKWHENEXHAUSTED` | `true` |

use crate::error::RedisKitError;
use crate::RedisKitResult;
use deadpool_redis::{Config, PoolConfig, Timeouts};
use shared_lib::ConfigLoader;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// IPv6 地址在URL中需要用方括号包起来
fn url_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

#[derive(Debug, Clone, Validate)]
pub struct RedisSettings {
    #[validate(length(min = 1))]
    pub host: String,

    #[validate(range(min = 1))]
    pub port: u16,

    /// 空白密码视为未设置
    pub password: Option<String>,

    #[validate(range(min = 0))]
    pub database: i64,

    /// 建立连接、回收连接以及等待命令响应的超时时间
    pub timeout: Duration,

    /// 使用 `rediss://` 连接，需要 redis 开启 TLS 相关特性
    pub ssl: bool,

    /// 连接池最大连接数
    #[validate(range(min = 1))]
    pub max_total: usize,

    /// 连接池耗尽时的最长等待时间
    pub max_wait: Duration,

    /// 为 `false` 时连接池耗尽立即失败，不等待
    pub block_when_exhausted: bool,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            database: 0,
            timeout: Duration::from_millis(2000),
            ssl: false,
            max_total: 64,
            max_wait: Duration::from_millis(3000),
            block_when_exhausted: true,
        }
    }
}

impl RedisSettings {
    /// 从配置加载器读取，缺失的配置项使用默认值
    pub fn from_loader(loader: &ConfigLoader) -> Self {
        let defaults = Self::default();

        Self {
            host: loader.get_string("redis.host", &defaults.host),
            port: loader.get_as("redis.port", defaults.port),
            password: loader.get_non_blank("redis.password"),
            database: loader.get_i64("redis.database", defaults.database),
            timeout: Duration::from_millis(loader.get_u64("redis.timeout", 2000)),
            ssl: loader.get_bool("redis.ssl", defaults.ssl),
            max_total: loader.get_as("redis.pool.maxTotal", defaults.max_total),
            max_wait: Duration::from_millis(loader.get_u64("redis.pool.maxWaitMillis", 3000)),
            block_when_exhausted: loader.get_bool("redis.pool.blockWhenExhausted", defaults.block_when_exhausted),
        }
    }

    /// 从进程默认的配置加载器读取
    pub fn load() -> Self {
        Self::from_loader(ConfigLoader::global())
    }

    /// 拼接 `redis://[:password@]host:port/db` 格式的连接地址
    pub fn connection_url(&self) -> RedisKitResult<String> {
        let scheme = if self.ssl { "rediss" } else { "redis" };
        let mut url = Url::parse(&format!("{scheme}://{}:{}/{}", url_host(&self.host), self.port, self.database))
            .map_err(|e| RedisKitError::invalid_url(format!("{}:{} ({e})", self.host, self.port)))?;

        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|_| RedisKitError::invalid_url(format!("无法设置密码: {}", self.host)))?;
        }

        Ok(url.to_string())
    }

    /// 生成 deadpool-redis 的连接池配置
    pub fn pool_config(&self) -> RedisKitResult<Config> {
        let mut timeouts = Timeouts::default();
        timeouts.wait = Some(if self.block_when_exhausted {
            self.max_wait
        } else {
            Duration::ZERO
        });
        timeouts.create = Some(self.timeout);
        timeouts.recycle = Some(self.timeout);

        let mut pool_config = PoolConfig::new(self.max_total);
        pool_config.timeouts = timeouts;

        let mut config = Config::from_url(self.connection_url()?);
        config.pool = Some(pool_config);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // 覆盖值优先级最高，不受本机环境变量影响
    fn loader(pairs: &[(&str, &str)]) -> ConfigLoader {
        let loader = ConfigLoader::new(HashMap::new());
        for (key, value) in pairs {
            loader.set_override(*key, *value);
        }
        loader
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = RedisSettings::default();

        assert_eq!(settings.connection_url().unwrap(), "redis://127.0.0.1:6379/0");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn reads_settings_from_loader() {
        let settings = RedisSettings::from_loader(&loader(&[
            ("redis.host", "cache.internal"),
            ("redis.port", "6380"),
            ("redis.password", "p@ss word"),
            ("redis.database", "3"),
            ("redis.pool.maxTotal", "8"),
            ("redis.timeout", "2000"),
            ("redis.pool.blockWhenExhausted", "false"),
        ]));

        assert_eq!(settings.max_total, 8);
        assert_eq!(settings.connection_url().unwrap(), "redis://:p%40ss%20word@cache.internal:6380/3");

        let config = settings.pool_config().unwrap();
        let pool = config.pool.unwrap();
        assert_eq!(pool.max_size, 8);
        assert_eq!(pool.timeouts.wait, Some(Duration::ZERO));
        assert_eq!(pool.timeouts.create, Some(Duration::from_millis(2000)));
    }

    #[test]
    fn blank_password_and_bad_numbers_fall_back() {
        let settings = RedisSettings::from_loader(&loader(&[
            ("redis.host", "127.0.0.1"),
            ("redis.password", "   "),
            ("redis.port", "not-a-port"),
            ("redis.database", "0"),
            ("redis.ssl", "1"),
        ]));

        assert_eq!(settings.password, None);
        assert_eq!(settings.port, 6379);
        assert_eq!(settings.connection_url().unwrap(), "rediss://127.0.0.1:6379/0");
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let settings = RedisSettings {
            host: "::1".to_string(),
            ..RedisSettings::default()
        };
        assert_eq!(settings.connection_url().unwrap(), "redis://[::1]:6379/0");

        let bracketed = RedisSettings {
            host: "[::1]".to_string(),
            ..RedisSettings::default()
        };
        assert_eq!(bracketed.connection_url().unwrap(), "redis://[::1]:6379/0");
    }

    #[test]
    fn rejects_invalid_settings() {
        let settings = RedisSettings {
            host: String::new(),
            max_total: 0,
            ..RedisSettings::default()
        };

        let errors = settings.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("host"));
        assert!(fields.contains_key("max_total"));
    }
}
