//! 查询树校验
//!
//! 过滤前检查每条完整规则是否携带了足以评估的值。与执行器使用同一套跳过规则：
//! 字段、类型、操作符任一缺失的规则不参与校验，也不参与评估。

use crate::coerce::{is_date, is_numeric, parse_date_seconds, to_number};
use crate::models::{Group, Node, Rule, RuleValue};
use crate::operators::RuleType;
use crate::path::NodePath;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// 规则未通过校验的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    /// 缺少必填的值
    MissingValue,
    /// 范围操作符缺少 `{min, max}` 或其中一端
    MissingRange,
    /// 值不是数值
    NonNumeric,
    /// 范围下界不小于上界
    InvertedRange,
    /// 空值检查操作符不接受值
    UnexpectedValue,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MissingValue => "缺少值",
            Self::MissingRange => "缺少范围边界",
            Self::NonNumeric => "值不是数值",
            Self::InvertedRange => "范围下界必须小于上界",
            Self::UnexpectedValue => "空值检查不需要填写值",
        };
        f.write_str(s)
    }
}

/// 单条规则的校验结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleCheck {
    pub path: NodePath,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
}

/// 整棵树的校验报告
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    pub checks: Vec<RuleCheck>,
}

impl ValidationReport {
    /// 所有被检查的规则都通过；没有可检查的规则时同样有效
    pub fn is_valid(&self) -> bool {
        self.checks.iter().all(|c| c.valid)
    }

    pub fn invalid_paths(&self) -> Vec<NodePath> {
        self.checks
            .iter()
            .filter(|c| !c.valid)
            .map(|c| c.path.clone())
            .collect()
    }

    pub fn check(&self, path: &str) -> Option<&RuleCheck> {
        self.checks.iter().find(|c| c.path == path)
    }
}

/// 查询树校验器
pub struct TreeValidator;

impl TreeValidator {
    /// 递归校验整棵树
    pub fn validate(tree: &Group) -> ValidationReport {
        let mut report = ValidationReport::default();
        Self::validate_group(tree, &mut report);
        report
    }

    fn validate_group(group: &Group, report: &mut ValidationReport) {
        for child in &group.rules {
            match child {
                Node::Group(nested) => Self::validate_group(nested, report),
                Node::Rule(rule) if rule.is_complete() => {
                    let outcome = Self::check_rule(rule);
                    report.checks.push(RuleCheck {
                        path: rule.id.clone(),
                        valid: outcome.is_ok(),
                        reason: outcome.err(),
                    });
                }
                Node::Rule(_) => {}
            }
        }
    }

    /// 按类型与操作符检查规则值
    pub fn check_rule(rule: &Rule) -> Result<(), InvalidReason> {
        let (Some(rule_type), Some(operator)) = (rule.rule_type, rule.operator) else {
            return Ok(());
        };
        let value = rule.value.as_ref();

        if operator.is_empty_check() {
            return Self::check_no_value(value);
        }

        match rule_type {
            RuleType::Number | RuleType::Date if operator.is_range() => {
                Self::check_range(value, rule_type)
            }
            RuleType::Number | RuleType::Date => Self::check_numeric(value, rule_type),
            RuleType::String | RuleType::Boolean => Self::check_present(value),
        }
    }

    /// 空值检查：值缺失、null 或长度为 0
    fn check_no_value(value: Option<&RuleValue>) -> Result<(), InvalidReason> {
        match value {
            None => Ok(()),
            Some(RuleValue::Scalar(Value::Null)) => Ok(()),
            Some(RuleValue::Scalar(Value::String(s))) if s.is_empty() => Ok(()),
            Some(RuleValue::Scalar(Value::Array(items))) if items.is_empty() => Ok(()),
            Some(_) => Err(InvalidReason::UnexpectedValue),
        }
    }

    fn check_range(value: Option<&RuleValue>, rule_type: RuleType) -> Result<(), InvalidReason> {
        let Some(RuleValue::Range(range)) = value else {
            return Err(InvalidReason::MissingRange);
        };
        let (Some(min), Some(max)) = (range.min.as_ref(), range.max.as_ref()) else {
            return Err(InvalidReason::MissingRange);
        };
        if !Self::is_filled(min, true) || !Self::is_filled(max, true) {
            return Err(InvalidReason::MissingRange);
        }

        let min = Self::numeric(min, rule_type).ok_or(InvalidReason::NonNumeric)?;
        let max = Self::numeric(max, rule_type).ok_or(InvalidReason::NonNumeric)?;
        if min < max {
            Ok(())
        } else {
            Err(InvalidReason::InvertedRange)
        }
    }

    fn check_numeric(value: Option<&RuleValue>, rule_type: RuleType) -> Result<(), InvalidReason> {
        let scalar = Self::present_scalar(value)?;
        Self::numeric(scalar, rule_type)
            .map(|_| ())
            .ok_or(InvalidReason::NonNumeric)
    }

    /// 字符串与布尔：非 null 且长度不为 0，空白字符串同样有效
    fn check_present(value: Option<&RuleValue>) -> Result<(), InvalidReason> {
        match value {
            Some(RuleValue::Scalar(v)) if Self::is_filled(v, false) => Ok(()),
            _ => Err(InvalidReason::MissingValue),
        }
    }

    fn present_scalar(value: Option<&RuleValue>) -> Result<&Value, InvalidReason> {
        match value {
            Some(RuleValue::Scalar(v)) if Self::is_filled(v, true) => Ok(v),
            _ => Err(InvalidReason::MissingValue),
        }
    }

    /// 非 null、非空；`trim` 时只含空白的字符串视为空
    fn is_filled(value: &Value, trim: bool) -> bool {
        match value {
            Value::Null => false,
            Value::String(s) if trim => !s.trim().is_empty(),
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// 数值化：日期类型额外接受日期字符串，其余值必须整体是数值
    fn numeric(value: &Value, rule_type: RuleType) -> Option<f64> {
        let n = match value {
            Value::String(s) if rule_type == RuleType::Date && is_date(value) => {
                parse_date_seconds(s)?
            }
            _ if is_numeric(value) => to_number(value),
            _ => f64::NAN,
        };
        (!n.is_nan()).then_some(n)
    }
}

/// 查询树是否可以安全评估
pub fn is_valid(tree: &Group) -> bool {
    TreeValidator::validate(tree).is_valid()
}
