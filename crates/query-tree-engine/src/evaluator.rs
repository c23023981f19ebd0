//! 条件评估器
//!
//! 按规则类型分派到对应的比较器。数值与日期比较器内部的失败（例如范围操作符缺少
//! `{min, max}`）会被捕获并记录日志，不会中断整棵树的评估：`between` 视为不匹配，
//! `not between` 视为两端为 NaN 的区间外。

use crate::coerce::{
    date_bound, is_blank, is_date, is_truthy, loose_eq, parse_date_seconds, parse_int, to_text,
    type_name,
};
use crate::error::{QueryError, Result};
use crate::models::{Record, Rule, RuleValue};
use crate::operators::{Operator, RuleType};
use serde_json::Value;
use tracing::warn;

static NULL: Value = Value::Null;

/// 条件评估器
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// 评估一条规则，规则不完整时返回 `None`
    pub fn evaluate_rule(rule: &Rule, record: &Record) -> Option<bool> {
        if !rule.is_complete() {
            return None;
        }
        let field = rule.field.as_deref()?;
        Some(Self::evaluate(
            record.get(field),
            rule.rule_type?,
            rule.operator?,
            rule.value.as_ref(),
        ))
    }

    /// 评估条件
    ///
    /// # Arguments
    /// * `field_value` - 记录中的字段值，字段缺失时为 `None`
    /// * `rule_type` - 规则类型
    /// * `operator` - 操作符
    /// * `expected` - 规则中用户填写的值
    pub fn evaluate(
        field_value: Option<&Value>,
        rule_type: RuleType,
        operator: Operator,
        expected: Option<&RuleValue>,
    ) -> bool {
        // 布尔规则没有操作符选择，始终按相等处理
        if rule_type == RuleType::Boolean {
            return Self::boolean(field_value, expected);
        }

        if operator.is_empty_check() {
            let empty = is_blank(field_value, rule_type != RuleType::String);
            return (operator == Operator::IsEmpty) == empty;
        }

        let outcome = match rule_type {
            RuleType::String => Ok(Self::string(field_value, operator, expected)),
            RuleType::Number => Self::number(field_value, operator, expected),
            RuleType::Date => Self::date(field_value, operator, expected),
            RuleType::Boolean => Ok(Self::boolean(field_value, expected)),
        };

        outcome.unwrap_or_else(|e| {
            warn!(
                rule_type = %rule_type,
                operator = %operator,
                error = %e,
                "条件比较失败，按不匹配处理"
            );
            false
        })
    }

    /// 字段存在且为真值
    fn exists(field: Option<&Value>) -> bool {
        field.is_some_and(is_truthy)
    }

    fn scalar(expected: Option<&RuleValue>) -> &Value {
        expected.and_then(RuleValue::as_scalar).unwrap_or(&NULL)
    }

    /// 字符串比较；否定操作符在字段缺失时成立
    fn string(field: Option<&Value>, operator: Operator, expected: Option<&RuleValue>) -> bool {
        let exists = Self::exists(field);
        let field = field.unwrap_or(&NULL);
        let expected = Self::scalar(expected);
        let text = to_text(field);
        let needle = to_text(expected);

        match operator {
            Operator::Equal => exists && loose_eq(field, expected),
            Operator::NotEqual => !exists || !loose_eq(field, expected),
            Operator::BeginsWith => exists && text.starts_with(&needle),
            Operator::NotBeginsWith => !exists || !text.starts_with(&needle),
            Operator::Contains => exists && text.contains(&needle),
            Operator::NotContains => !exists || !text.contains(&needle),
            Operator::EndWith => exists && text.ends_with(&needle),
            Operator::NotEndWith => !exists || !text.ends_with(&needle),
            _ => false,
        }
    }

    /// 数值比较：两侧按整数前缀解析，NaN 参与的比较均不成立；范围为开区间
    fn number(
        field: Option<&Value>,
        operator: Operator,
        expected: Option<&RuleValue>,
    ) -> Result<bool> {
        let exists = Self::exists(field);
        let actual = field.map_or(f64::NAN, parse_int);
        let target = || parse_int(Self::scalar(expected));

        let matched = match operator {
            Operator::Equal => exists && actual == target(),
            Operator::NotEqual => !exists || actual != target(),
            Operator::Less => exists && actual < target(),
            Operator::LessOrEqual => exists && actual <= target(),
            Operator::Greater => exists && actual > target(),
            Operator::GreaterOrEqual => exists && actual >= target(),
            Operator::Between => exists && Self::within(actual, expected, parse_int)?,
            Operator::NotBetween => !exists || Self::outside(actual, expected, parse_int),
            _ => false,
        };
        Ok(matched)
    }

    /// 日期比较：字段通过日期探测后转换为纪元秒
    ///
    /// `equal`/`not equal` 在两侧都能解析为时间时比较纪元秒，否则退化为原始值的宽松相等。
    fn date(field: Option<&Value>, operator: Operator, expected: Option<&RuleValue>) -> Result<bool> {
        let exists = Self::exists(field);
        let seconds = field
            .filter(|v| exists && is_date(v))
            .and_then(Value::as_str)
            .and_then(parse_date_seconds);
        let bound = || date_bound(Self::scalar(expected));

        let matched = match (operator, seconds) {
            (Operator::Equal, _) => exists && Self::date_eq(field, seconds, expected),
            (Operator::NotEqual, _) => !exists || !Self::date_eq(field, seconds, expected),
            (Operator::Before, Some(s)) => s < bound(),
            (Operator::BeforeOrEqual, Some(s)) => s <= bound(),
            (Operator::After, Some(s)) => s > bound(),
            (Operator::AfterOrEqual, Some(s)) => s >= bound(),
            (Operator::Between, Some(s)) => Self::within(s, expected, date_bound)?,
            (Operator::NotBetween, Some(s)) => Self::outside(s, expected, date_bound),
            (Operator::NotBetween, None) => true,
            _ => false,
        };
        Ok(matched)
    }

    fn date_eq(field: Option<&Value>, seconds: Option<f64>, expected: Option<&RuleValue>) -> bool {
        let expected = Self::scalar(expected);
        match seconds {
            Some(s) if !date_bound(expected).is_nan() => s == date_bound(expected),
            _ => loose_eq(field.unwrap_or(&NULL), expected),
        }
    }

    /// 布尔比较：字段与规则值直接做宽松相等，字段缺失时不匹配
    ///
    /// 规则值按原样参与比较，字符串 `"true"` 与布尔 `true` 不相等。
    fn boolean(field: Option<&Value>, expected: Option<&RuleValue>) -> bool {
        field.is_some_and(|field| loose_eq(field, Self::scalar(expected)))
    }

    /// 开区间判断 `min < actual < max`
    fn within(actual: f64, expected: Option<&RuleValue>, convert: fn(&Value) -> f64) -> Result<bool> {
        let range = match expected {
            Some(RuleValue::Range(range)) => range,
            Some(RuleValue::Scalar(v)) => {
                return Err(QueryError::Comparison(format!(
                    "范围操作符需要 {{min, max}} 值，实际为 {}",
                    type_name(v)
                )));
            }
            None => {
                return Err(QueryError::Comparison(
                    "范围操作符缺少 {min, max} 值".to_string(),
                ));
            }
        };

        let min = range.min.as_ref().map_or(f64::NAN, convert);
        let max = range.max.as_ref().map_or(f64::NAN, convert);
        Ok(actual < max && actual > min)
    }

    /// `not between`：值不是 `{min, max}` 时两端按 NaN 处理，区间外恒成立
    fn outside(actual: f64, expected: Option<&RuleValue>, convert: fn(&Value) -> f64) -> bool {
        match Self::within(actual, expected, convert) {
            Ok(inside) => !inside,
            Err(e) => {
                warn!(error = %e, "范围边界无效，not between 按成立处理");
                true
            }
        }
    }
}
