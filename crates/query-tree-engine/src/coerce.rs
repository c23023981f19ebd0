//! 值转换
//!
//! 规则值来自文本输入框，记录字段来自任意 JSON。比较前按 JavaScript 的宽松语义
//! 统一转换：真值判断、字符串化、`Number()`、`parseInt()` 以及宽松相等。

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// 真值判断：null、false、0、NaN、空字符串为假
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// 字符串化，整数不带小数部分
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(|f| f.to_string()).unwrap_or_default()
            }
        }
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// 数值转换（`Number()` 语义），无法转换时返回 NaN
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => str_to_number(s),
        Value::Array(items) if items.is_empty() => 0.0,
        Value::Array(items) if items.len() == 1 => str_to_number(&to_text(&items[0])),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn str_to_number(raw: &str) -> f64 {
    let s = raw.trim();
    if s.is_empty() {
        return 0.0;
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    for prefix in ["0x", "0X"] {
        if let Some(hex) = s.strip_prefix(prefix) {
            return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
        }
    }

    // 排除 Rust 额外接受的 "inf"、"nan" 等写法
    if !s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return f64::NAN;
    }

    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// 整数前缀解析（`parseInt()` 语义）：`"12abc"` 为 12，`3.9` 为 3，无数字时为 NaN
pub fn parse_int(value: &Value) -> f64 {
    let text = to_text(value);
    let s = text.trim_start();

    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = match s.get(..2) {
        Some("0x") | Some("0X") => (16, &s[2..]),
        _ => (10, s),
    };

    let mut result: Option<f64> = None;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => result = Some(result.unwrap_or(0.0) * f64::from(radix) + f64::from(d)),
            None => break,
        }
    }

    match result {
        Some(n) if negative => -n,
        Some(n) => n,
        None => f64::NAN,
    }
}

/// 宽松相等（`==` 语义）
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Bool(_), Value::Number(_) | Value::String(_))
        | (Value::Number(_) | Value::String(_), Value::Bool(_)) => {
            to_number(left) == to_number(right)
        }
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => false,
        (Value::Array(_) | Value::Object(_), _) => {
            loose_eq(&Value::String(to_text(left)), right)
        }
        (_, Value::Array(_) | Value::Object(_)) => {
            loose_eq(left, &Value::String(to_text(right)))
        }
    }
}

/// 是否可转换为数值
pub fn is_numeric(value: &Value) -> bool {
    !to_number(value).is_nan()
}

/// 日期探测：非数值且能被解析为日期的字符串
pub fn is_date(value: &Value) -> bool {
    match value {
        Value::String(s) => str_to_number(s).is_nan() && parse_date_seconds(s).is_some(),
        _ => false,
    }
}

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const NAIVE_DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%B %d, %Y",
];

/// 解析日期为 Unix 纪元秒，无时区信息时按 UTC 处理
pub fn parse_date_seconds(raw: &str) -> Option<f64> {
    let s = raw.trim();

    let millis = if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        dt.timestamp_millis()
    } else if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        dt.timestamp_millis()
    } else if let Some(dt) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        dt.and_utc().timestamp_millis()
    } else {
        let date = NAIVE_DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())?;
        date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis()
    };

    Some(millis as f64 / 1000.0)
}

/// 时间边界：日期字符串转换为纪元秒，否则按整数解析
pub fn date_bound(value: &Value) -> f64 {
    match value {
        Value::String(s) if is_date(value) => parse_date_seconds(s).unwrap_or(f64::NAN),
        _ => parse_int(value),
    }
}

/// 空值判断：缺失、null 或长度为 0；`trim` 时忽略首尾空白
pub fn is_blank(value: Option<&Value>, trim: bool) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) if trim => s.trim().is_empty(),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Bool(_) | Value::Number(_)) => false,
    }
}

/// 获取值的类型名称
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
