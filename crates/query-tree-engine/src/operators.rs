//! 规则类型与操作符定义

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 规则值类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    String,
    Number,
    Boolean,
    Date,
}

impl RuleType {
    /// 该类型可选的操作符，顺序即展示顺序，第一个为选择字段后的默认操作符
    pub fn operators(self) -> &'static [Operator] {
        use Operator::*;
        match self {
            Self::String => &[
                Equal,
                NotEqual,
                BeginsWith,
                NotBeginsWith,
                Contains,
                NotContains,
                EndWith,
                NotEndWith,
                IsEmpty,
                IsNotEmpty,
            ],
            Self::Number => &[
                Equal,
                NotEqual,
                Less,
                LessOrEqual,
                Greater,
                GreaterOrEqual,
                Between,
                NotBetween,
                IsEmpty,
                IsNotEmpty,
            ],
            Self::Date => &[
                Between,
                NotBetween,
                After,
                AfterOrEqual,
                Before,
                BeforeOrEqual,
                Equal,
                NotEqual,
                IsEmpty,
                IsNotEmpty,
            ],
            Self::Boolean => &[Equal],
        }
    }

    pub fn default_operator(self) -> Operator {
        self.operators()[0]
    }

    pub fn supports(self, operator: Operator) -> bool {
        self.operators().contains(&operator)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            other => Err(QueryError::Parse(format!("未知的规则类型: '{}'", other))),
        }
    }
}

/// 条件操作符
///
/// 序列化形式与界面上展示的标签一致，如 `"not begins with"`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    // 通用比较
    #[serde(rename = "equal")]
    Equal,
    #[serde(rename = "not equal")]
    NotEqual,

    // 字符串操作
    #[serde(rename = "begins with")]
    BeginsWith,
    #[serde(rename = "not begins with")]
    NotBeginsWith,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "not contains")]
    NotContains,
    #[serde(rename = "end with")]
    EndWith,
    #[serde(rename = "not end with")]
    NotEndWith,

    // 数值比较
    #[serde(rename = "less")]
    Less,
    #[serde(rename = "less or equal")]
    LessOrEqual,
    #[serde(rename = "greater")]
    Greater,
    #[serde(rename = "greater or equal")]
    GreaterOrEqual,

    // 时间比较
    #[serde(rename = "before")]
    Before,
    #[serde(rename = "before or equal")]
    BeforeOrEqual,
    #[serde(rename = "after")]
    After,
    #[serde(rename = "after or equal")]
    AfterOrEqual,

    // 范围
    #[serde(rename = "between")]
    Between,
    #[serde(rename = "not between")]
    NotBetween,

    // 空值检查
    #[serde(rename = "is empty")]
    IsEmpty,
    #[serde(rename = "is not empty")]
    IsNotEmpty,
}

impl Operator {
    pub fn label(self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "not equal",
            Self::BeginsWith => "begins with",
            Self::NotBeginsWith => "not begins with",
            Self::Contains => "contains",
            Self::NotContains => "not contains",
            Self::EndWith => "end with",
            Self::NotEndWith => "not end with",
            Self::Less => "less",
            Self::LessOrEqual => "less or equal",
            Self::Greater => "greater",
            Self::GreaterOrEqual => "greater or equal",
            Self::Before => "before",
            Self::BeforeOrEqual => "before or equal",
            Self::After => "after",
            Self::AfterOrEqual => "after or equal",
            Self::Between => "between",
            Self::NotBetween => "not between",
            Self::IsEmpty => "is empty",
            Self::IsNotEmpty => "is not empty",
        }
    }

    /// 是否为范围操作符（值为 `{min, max}`）
    pub fn is_range(self) -> bool {
        matches!(self, Self::Between | Self::NotBetween)
    }

    /// 是否为空值检查操作符（不需要用户输入值）
    pub fn is_empty_check(self) -> bool {
        matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim();
        ALL_OPERATORS
            .iter()
            .copied()
            .find(|op| op.label() == label)
            .ok_or_else(|| QueryError::Parse(format!("未知的操作符: '{}'", label)))
    }
}

const ALL_OPERATORS: [Operator; 20] = [
    Operator::Equal,
    Operator::NotEqual,
    Operator::BeginsWith,
    Operator::NotBeginsWith,
    Operator::Contains,
    Operator::NotContains,
    Operator::EndWith,
    Operator::NotEndWith,
    Operator::Less,
    Operator::LessOrEqual,
    Operator::Greater,
    Operator::GreaterOrEqual,
    Operator::Before,
    Operator::BeforeOrEqual,
    Operator::After,
    Operator::AfterOrEqual,
    Operator::Between,
    Operator::NotBetween,
    Operator::IsEmpty,
    Operator::IsNotEmpty,
];

/// 逻辑操作符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_labels_round_trip() {
        for op in ALL_OPERATORS {
            assert_eq!(op.label().parse::<Operator>().unwrap(), op);
            assert_eq!(
                serde_json::to_string(&op).unwrap(),
                format!("\"{}\"", op.label())
            );
        }
    }

    #[test]
    fn test_default_operators() {
        assert_eq!(RuleType::String.default_operator(), Operator::Equal);
        assert_eq!(RuleType::Number.default_operator(), Operator::Equal);
        assert_eq!(RuleType::Date.default_operator(), Operator::Between);
        assert_eq!(RuleType::Boolean.default_operator(), Operator::Equal);
    }

    #[test]
    fn test_type_supports() {
        assert!(RuleType::String.supports(Operator::BeginsWith));
        assert!(!RuleType::String.supports(Operator::Less));
        assert!(RuleType::Number.supports(Operator::Between));
        assert!(!RuleType::Number.supports(Operator::Before));
        assert!(RuleType::Date.supports(Operator::AfterOrEqual));
        assert!(!RuleType::Boolean.supports(Operator::NotEqual));
    }

    #[test]
    fn test_rule_type_from_str() {
        assert_eq!("Number".parse::<RuleType>().unwrap(), RuleType::Number);
        assert!("datetime".parse::<RuleType>().is_err());
    }

    #[test]
    fn test_logical_operator_serde() {
        assert_eq!(serde_json::to_string(&LogicalOperator::Or).unwrap(), "\"OR\"");
        let parsed: LogicalOperator = serde_json::from_str("\"AND\"").unwrap();
        assert_eq!(parsed, LogicalOperator::And);
    }
}
