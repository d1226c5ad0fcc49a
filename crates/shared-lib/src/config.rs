//! 分层配置加载
//!
//! 读取顺序（优先级从高到低）：
//! 1. 进程内覆盖值（[`ConfigLoader::set_override`]，相当于 `-Dredis.host=...`）
//! 2. 环境变量，键名转大写且 `.` 替换为 `_`（`redis.host` → `REDIS_HOST`）
//! 3. `application.properties` 文件
//! 4. 调用方提供的默认值
//!
//! 本地调试时 `.env` 文件会先通过 [`dotenvy`] 注入到环境变量中，线上部署直接使用环境变量即可。

use crate::error::{Result, SharedError};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{OnceLock, RwLock};
use tracing::{debug, warn};

/// 默认的配置文件名
pub const DEFAULT_PROPERTIES_FILE: &str = "application.properties";

/// 指定配置文件路径的环境变量
pub const PROPERTIES_PATH_ENV: &str = "APP_PROPERTIES_PATH";

static GLOBAL_LOADER: OnceLock<ConfigLoader> = OnceLock::new();

/// 配置加载器
#[derive(Debug, Default)]
pub struct ConfigLoader {
    overrides: RwLock<HashMap<String, String>>,
    properties: HashMap<String, String>,
}

impl ConfigLoader {
    /// 使用已解析好的properties创建加载器
    pub fn new(properties: HashMap<String, String>) -> Self {
        Self {
            overrides: RwLock::new(HashMap::new()),
            properties,
        }
    }

    /// 从properties文件创建加载器
    ///
    /// 文件不存在时返回一个空的加载器，只使用覆盖值/环境变量/默认值
    pub fn from_properties_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("配置文件 {} 不存在，跳过", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| SharedError::config_file(path.display(), e))?;
        Ok(Self::new(parse_properties(&content)))
    }

    /// 进程级别的默认加载器
    ///
    /// 第一次调用时加载 `.env`，然后读取 `APP_PROPERTIES_PATH` 指向的文件（默认 `application.properties`）。
    /// 配置文件读取失败只记录日志，不影响其他配置来源。
    pub fn global() -> &'static ConfigLoader {
        GLOBAL_LOADER.get_or_init(|| {
            if let Err(e) = dotenvy::dotenv() {
                debug!("未加载 .env 文件: {}", e);
            }

            let path = std::env::var(PROPERTIES_PATH_ENV).unwrap_or_else(|_| DEFAULT_PROPERTIES_FILE.to_string());
            ConfigLoader::from_properties_file(&path).unwrap_or_else(|e| {
                warn!("⚠️ {}", e);
                ConfigLoader::default()
            })
        })
    }

    /// 设置进程内覆盖值，优先级最高
    pub fn set_override<K: Into<String>, V: Into<String>>(&self, key: K, value: V) {
        self.overrides
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), value.into());
    }

    /// 移除进程内覆盖值
    pub fn clear_override(&self, key: &str) {
        self.overrides.write().unwrap_or_else(|e| e.into_inner()).remove(key);
    }

    /// 按优先级查找配置值，所有来源都没有时返回 `None`
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.overrides.read().unwrap_or_else(|e| e.into_inner()).get(key) {
            return Some(value.clone());
        }

        if let Ok(value) = std::env::var(env_key(key)) {
            return Some(value);
        }

        self.properties.get(key).cloned()
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// 读取可选字符串，空白字符串视为未配置
    pub fn get_non_blank(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn get_i32(&self, key: &str, default: i32) -> i32 {
        self.get_as(key, default)
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get_as(key, default)
    }

    pub fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.get_as(key, default)
    }

    /// `true`（不区分大小写）或 `1` 为真，其它值都为假
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(v) => {
                let v = v.trim();
                v.eq_ignore_ascii_case("true") || v == "1"
            }
            None => default,
        }
    }

    /// 读取并解析为任意 [`FromStr`](std::str::FromStr) 类型，解析失败时使用默认值
    pub fn get_as<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            Some(v) => v.trim().parse().unwrap_or_else(|_| {
                warn!("⚠️ 配置项 {} 的值 {:?} 无法解析，使用默认值", key, v);
                default
            }),
            None => default,
        }
    }
}

/// 配置键对应的环境变量名
pub fn env_key(key: &str) -> String {
    key.to_uppercase().replace('.', "_")
}

/// 解析 `key=value` / `key: value` 格式的properties内容
///
/// 以 `#` 或 `!` 开头的行是注释。
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let idx = line.find(['=', ':'])?;
            let (key, value) = line.split_at(idx);
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value[1..].trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn parse_properties_skips_comments_and_blank_lines() {
        let props = parse_properties(
            r#"
# redis
! legacy comment
redis.host = 10.0.0.5
redis.port:6380
redis.password=
=orphan
"#,
        );

        assert_eq!(props.get("redis.host").map(String::as_str), Some("10.0.0.5"));
        assert_eq!(props.get("redis.port").map(String::as_str), Some("6380"));
        assert_eq!(props.get("redis.password").map(String::as_str), Some(""));
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn env_key_uppercases_and_replaces_dots() {
        assert_eq!(env_key("redis.pool.maxTotal"), "REDIS_POOL_MAXTOTAL");
    }

    #[test]
    #[serial]
    fn override_beats_env_and_env_beats_properties() {
        let loader = ConfigLoader::new(HashMap::from([("pstk.test.host".to_string(), "from-file".to_string())]));
        assert_eq!(loader.get_string("pstk.test.host", "default"), "from-file");

        std::env::set_var("PSTK_TEST_HOST", "from-env");
        assert_eq!(loader.get_string("pstk.test.host", "default"), "from-env");

        loader.set_override("pstk.test.host", "from-override");
        assert_eq!(loader.get_string("pstk.test.host", "default"), "from-override");

        loader.clear_override("pstk.test.host");
        std::env::remove_var("PSTK_TEST_HOST");
        assert_eq!(loader.get_string("pstk.test.host", "default"), "from-file");
        assert_eq!(loader.get_string("pstk.test.missing", "default"), "default");
    }

    #[test]
    fn typed_getters_fall_back_on_bad_values() {
        let loader = ConfigLoader::new(HashMap::from([
            ("pstk.typed.port".to_string(), " 6380 ".to_string()),
            ("pstk.typed.bad".to_string(), "abc".to_string()),
            ("pstk.typed.flag".to_string(), "TRUE".to_string()),
            ("pstk.typed.one".to_string(), "1".to_string()),
            ("pstk.typed.yes".to_string(), "yes".to_string()),
        ]));

        assert_eq!(loader.get_i32("pstk.typed.port", 6379), 6380);
        assert_eq!(loader.get_i64("pstk.typed.bad", 3000), 3000);
        assert_eq!(loader.get_u64("pstk.typed.missing", 7), 7);
        assert!(loader.get_bool("pstk.typed.flag", false));
        assert!(loader.get_bool("pstk.typed.one", false));
        assert!(!loader.get_bool("pstk.typed.yes", true));
        assert!(loader.get_bool("pstk.typed.missing", true));
    }

    #[test]
    fn blank_values_are_treated_as_missing() {
        let loader = ConfigLoader::new(HashMap::from([("pstk.blank.password".to_string(), "  ".to_string())]));
        assert_eq!(loader.get_non_blank("pstk.blank.password"), None);
    }

    #[test]
    fn loads_properties_file_and_tolerates_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pstk.file.vhost=/orders").unwrap();

        let loader = ConfigLoader::from_properties_file(file.path()).unwrap();
        assert_eq!(loader.get_string("pstk.file.vhost", "/"), "/orders");

        let dir = tempfile::tempdir().unwrap();
        let missing = ConfigLoader::from_properties_file(dir.path().join("nope.properties")).unwrap();
        assert_eq!(missing.get("pstk.file.vhost"), None);
    }
}
