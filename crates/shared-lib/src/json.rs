//! JSON 编解码工具
//!
//! 基于 [`serde_json`]，统一了日期时间的文本格式：
//! - `NaiveDateTime`: `yyyy-MM-dd HH:mm:ss`
//! - `NaiveDate`: `yyyy-MM-dd`
//! - `NaiveTime`: `HH:mm:ss`
//!
//! 日期时间字段通过 `#[serde(with = "...")]` 使用下面的格式模块：
//!
//! ```rust
//! use chrono::NaiveDateTime;
//! use serde::{Deserialize, Serialize};
//! use shared_lib::json::datetime_format;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Order {
//!     #[serde(with = "datetime_format")]
//!     created_at: NaiveDateTime,
//!     #[serde(default, skip_serializing_if = "Option::is_none", with = "datetime_format::option")]
//!     paid_at: Option<NaiveDateTime>,
//! }
//! ```
//!
//! `option` 模块把 `None` 写成 `null`，需要省略空字段时配合 `skip_serializing_if` 使用。

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// 序列化失败时返回 `fallback`
pub fn to_json_or<T: Serialize + ?Sized>(value: &T, fallback: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| fallback.to_string())
}

pub fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}

pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}

/// 解析失败时返回 `None`
pub fn from_json_opt<T: DeserializeOwned>(json: &str) -> Option<T> {
    serde_json::from_str(json).ok()
}

/// 解析失败时返回 `default`
pub fn from_json_or<T: DeserializeOwned>(json: &str, default: T) -> T {
    from_json_opt(json).unwrap_or(default)
}

/// 解析失败时返回 `T::default()`
pub fn from_json_or_default<T: DeserializeOwned + Default>(json: &str) -> T {
    from_json_opt(json).unwrap_or_default()
}

pub fn from_json_list<T: DeserializeOwned>(json: &str) -> Result<Vec<T>> {
    from_json(json)
}

pub fn from_json_map<V: DeserializeOwned>(json: &str) -> Result<HashMap<String, V>> {
    from_json(json)
}

/// 通过一次序列化/反序列化得到完整的深拷贝
pub fn deep_copy<T: Serialize + DeserializeOwned>(value: &T) -> Result<T> {
    from_value(to_value(value)?)
}

/// 将对象转换为JSON对象的字段表，非对象类型返回空表
pub fn to_map<T: Serialize + ?Sized>(value: &T) -> Result<Map<String, Value>> {
    match to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// 生成 `chrono` 无时区类型的 serde 格式模块
///
/// 解析时先按固定格式解析，失败后再尝试 ISO-8601 格式。
/// `option` 子模块用于 `Option<T>` 字段，空字符串解析为 `None`。
macro_rules! naive_format {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $fmt:expr) => {
        $(#[$meta])*
        pub mod $name {
            use serde::{Deserialize, Deserializer, Serializer};

            pub const FORMAT: &str = $fmt;

            pub fn serialize<S: Serializer>(value: &$ty, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(&value.format(FORMAT))
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<$ty, D::Error> {
                let raw = String::deserialize(deserializer)?;
                parse(&raw).map_err(serde::de::Error::custom)
            }

            pub fn parse(raw: &str) -> Result<$ty, chrono::ParseError> {
                <$ty>::parse_from_str(raw, FORMAT).or_else(|_| raw.parse::<$ty>())
            }

            pub mod option {
                use serde::{Deserialize, Deserializer, Serializer};

                pub fn serialize<S: Serializer>(value: &Option<$ty>, serializer: S) -> Result<S::Ok, S::Error> {
                    match value {
                        Some(v) => serializer.collect_str(&v.format(super::FORMAT)),
                        None => serializer.serialize_none(),
                    }
                }

                pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<$ty>, D::Error> {
                    match Option::<String>::deserialize(deserializer)? {
                        Some(raw) if !raw.is_empty() => super::parse(&raw).map(Some).map_err(serde::de::Error::custom),
                        _ => Ok(None),
                    }
                }
            }
        }
    };
}

naive_format!(
    /// `NaiveDateTime` 的 `yyyy-MM-dd HH:mm:ss` 格式
    datetime_format,
    chrono::NaiveDateTime,
    "%Y-%m-%d %H:%M:%S"
);

naive_format!(
    /// `NaiveDate` 的 `yyyy-MM-dd` 格式
    date_format,
    chrono::NaiveDate,
    "%Y-%m-%d"
);

naive_format!(
    /// `NaiveTime` 的 `HH:mm:ss` 格式
    time_format,
    chrono::NaiveTime,
    "%H:%M:%S"
);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        note: String,
        #[serde(with = "datetime_format")]
        created_at: NaiveDateTime,
        #[serde(with = "date_format")]
        ship_date: NaiveDate,
        #[serde(with = "time_format")]
        cutoff: NaiveTime,
        #[serde(default, with = "datetime_format::option")]
        paid_at: Option<NaiveDateTime>,
    }

    fn sample_order() -> Order {
        Order {
            id: 7,
            note: "<b>fragile</b> & heavy".to_string(),
            created_at: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(8, 5, 30).unwrap(),
            ship_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            cutoff: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            paid_at: None,
        }
    }

    #[test]
    fn dates_use_fixed_text_formats() {
        let json = to_json(&sample_order()).unwrap();

        assert!(json.contains(r#""created_at":"2024-03-09 08:05:30""#));
        assert!(json.contains(r#""ship_date":"2024-03-10""#));
        assert!(json.contains(r#""cutoff":"17:00:00""#));
        assert!(json.contains(r#""paid_at":null"#));
        // HTML 字符保持原样
        assert!(json.contains("<b>fragile</b> & heavy"));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payment {
        id: u64,
        #[serde(default, skip_serializing_if = "Option::is_none", with = "datetime_format::option")]
        paid_at: Option<NaiveDateTime>,
    }

    #[test]
    fn empty_optional_can_be_omitted() {
        let unpaid = Payment { id: 1, paid_at: None };
        assert_eq!(to_json(&unpaid).unwrap(), r#"{"id":1}"#);
        assert_eq!(from_json::<Payment>(r#"{"id":1}"#).unwrap(), unpaid);

        let paid = Payment {
            id: 2,
            paid_at: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(10, 0, 0),
        };
        assert_eq!(to_json(&paid).unwrap(), r#"{"id":2,"paid_at":"2024-03-09 10:00:00"}"#);
    }

    #[test]
    fn round_trip_keeps_structure() {
        let order = sample_order();
        let back: Order = from_json(&to_json(&order).unwrap()).unwrap();
        assert_eq!(back, order);

        let copied = deep_copy(&order).unwrap();
        assert_eq!(copied, order);
    }

    #[test]
    fn datetime_accepts_iso_and_empty_optional() {
        let json = r#"{"id":1,"note":"","created_at":"2024-03-09T08:05:30","ship_date":"2024-03-10",
            "cutoff":"17:00:00","paid_at":""}"#;
        let order: Order = from_json(json).unwrap();

        assert_eq!(order.created_at.to_string(), "2024-03-09 08:05:30");
        assert_eq!(order.paid_at, None);
    }

    #[test]
    fn lenient_helpers_fall_back() {
        assert_eq!(from_json_opt::<Order>("not json"), None);
        assert_eq!(from_json_or::<Vec<u32>>("[1,", vec![9]), vec![9]);
        assert_eq!(from_json_or_default::<Vec<u32>>("nope"), Vec::<u32>::new());

        // 非字符串键无法序列化为JSON对象
        let bad_keys = std::collections::BTreeMap::from([((1u8, 2u8), 3u8)]);
        assert_eq!(to_json_or(&bad_keys, "fallback"), "fallback");
    }

    #[test]
    fn list_and_map_helpers() {
        let list: Vec<u32> = from_json_list("[1,2,3]").unwrap();
        assert_eq!(list, vec![1, 2, 3]);

        let map: HashMap<String, String> = from_json_map(r#"{"a":"x","b":"y"}"#).unwrap();
        assert_eq!(map.get("b").map(String::as_str), Some("y"));

        let fields = to_map(&sample_order()).unwrap();
        assert_eq!(fields.get("id"), Some(&Value::from(7)));
        assert!(to_map(&vec![1, 2]).unwrap().is_empty());
    }
}
