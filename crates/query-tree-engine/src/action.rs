//! 查询树操作
//!
//! 展示层的每一次交互（新增、删除、修改、选择字段等）描述为一个可序列化的 [`TreeAction`]，
//! 由存储执行，由引擎驱动完整的"修改 → 校验 → 过滤 → 通知"周期。

use crate::models::{NodePatch, RuleValue};
use crate::operators::{LogicalOperator, Operator};
use crate::path::NodePath;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TreeAction {
    /// 恢复默认树
    Reset,
    /// 在分组下追加空规则
    AddRule { parent: NodePath },
    /// 在分组下追加默认分组
    AddGroup { parent: NodePath },
    Remove { path: NodePath },
    /// 浅合并局部更新
    Update { path: NodePath, patch: NodePatch },
    SetCondition {
        path: NodePath,
        condition: LogicalOperator,
    },
    /// 按标签选择字段，类型与默认操作符随之确定
    SelectField { path: NodePath, label: String },
    SelectOperator { path: NodePath, operator: Operator },
    /// `null` 清空规则值
    SetValue {
        path: NodePath,
        #[serde(default)]
        value: Option<RuleValue>,
    },
}

impl TreeAction {
    /// 操作名称，用于日志
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::AddRule { .. } => "add_rule",
            Self::AddGroup { .. } => "add_group",
            Self::Remove { .. } => "remove",
            Self::Update { .. } => "update",
            Self::SetCondition { .. } => "set_condition",
            Self::SelectField { .. } => "select_field",
            Self::SelectOperator { .. } => "select_operator",
            Self::SetValue { .. } => "set_value",
        }
    }

    /// 操作目标路径；`reset` 作用于根
    pub fn target(&self) -> NodePath {
        match self {
            Self::Reset => NodePath::root(),
            Self::AddRule { parent } | Self::AddGroup { parent } => parent.clone(),
            Self::Remove { path }
            | Self::Update { path, .. }
            | Self::SetCondition { path, .. }
            | Self::SelectField { path, .. }
            | Self::SelectOperator { path, .. }
            | Self::SetValue { path, .. } => path.clone(),
        }
    }
}

impl fmt::Display for TreeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.target())
    }
}
