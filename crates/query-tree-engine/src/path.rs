//! 节点路径
//!
//! 路径编码节点在树中的位置：根为 `"0"`，子节点为 `<父路径>_<槽位>`，
//! 例如 `"0_2_1"` 表示根的第 3 个子节点下的第 2 个子节点。
//! 节点删除后兄弟节点的路径保持不变，因此槽位编号可能出现空洞。

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

pub const ROOT_PATH: &str = "0";

const SEPARATOR: char = '_';

/// 经过校验的节点路径
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    pub fn root() -> Self {
        Self(ROOT_PATH.to_string())
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = raw.split(SEPARATOR);
        if segments.next() != Some(ROOT_PATH) {
            return Err(QueryError::InvalidPath(raw.to_string()));
        }
        for segment in segments {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(QueryError::InvalidPath(raw.to_string()));
            }
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_PATH
    }

    /// 父路径；根的父路径是根自身
    pub fn parent(&self) -> Self {
        match self.0.rfind(SEPARATOR) {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::root(),
        }
    }

    pub fn child(&self, slot: usize) -> Self {
        Self(format!("{}{}{}", self.0, SEPARATOR, slot))
    }

    /// 最后一级槽位，根没有槽位
    pub fn slot(&self) -> Option<usize> {
        let idx = self.0.rfind(SEPARATOR)?;
        self.0[idx + 1..].parse().ok()
    }

    /// 根的深度为 0
    pub fn depth(&self) -> usize {
        self.0.matches(SEPARATOR).count()
    }

    /// `self` 是否位于 `ancestor` 为根的子树中（包含自身）
    pub fn is_within(&self, ancestor: &NodePath) -> bool {
        self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0)
                && self.0[ancestor.0.len()..].starts_with(SEPARATOR))
    }
}

impl Default for NodePath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NodePath {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodePath {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// 允许以 `&str` 查询以路径为键的索引
impl Borrow<str> for NodePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NodePath {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NodePath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
