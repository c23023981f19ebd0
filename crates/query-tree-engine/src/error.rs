//! 查询树引擎错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("节点不存在: {0}")]
    NotFound(String),

    #[error("目标节点不是分组: {0}")]
    NotAGroup(String),

    #[error("目标节点不是规则: {0}")]
    NotARule(String),

    #[error("无效的节点路径: '{0}'")]
    InvalidPath(String),

    #[error("根分组不能被删除")]
    RootImmutable,

    #[error("未配置的字段: {0}")]
    UnknownField(String),

    #[error("无效的操作符: {operator} 不支持类型 {rule_type}")]
    InvalidOperator { operator: String, rule_type: String },

    #[error("条件比较失败: {0}")]
    Comparison(String),

    #[error("解析失败: {0}")]
    Parse(String),

    #[error("JSON 序列化错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueryError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::NotAGroup(_) => "NOT_A_GROUP",
            Self::NotARule(_) => "NOT_A_RULE",
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::RootImmutable => "ROOT_IMMUTABLE",
            Self::UnknownField(_) => "UNKNOWN_FIELD",
            Self::InvalidOperator { .. } => "INVALID_OPERATOR",
            Self::Comparison(_) => "COMPARISON_ERROR",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(QueryError::NotFound("0_3".into()).code(), "NOT_FOUND");
        assert_eq!(QueryError::RootImmutable.code(), "ROOT_IMMUTABLE");
        assert_eq!(
            QueryError::InvalidOperator {
                operator: "less".into(),
                rule_type: "string".into(),
            }
            .code(),
            "INVALID_OPERATOR"
        );
    }

    #[test]
    fn test_error_display() {
        let err = QueryError::NotFound("0_1_2".into());
        assert_eq!(err.to_string(), "节点不存在: 0_1_2");
    }
}
