//! 查询树领域模型

use crate::operators::{LogicalOperator, Operator, RuleType};
use crate::path::NodePath;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 被过滤的记录：字段名到值的有序映射
pub type Record = serde_json::Map<String, Value>;

/// 规则值
///
/// 范围操作符使用 `{min, max}`，其他操作符使用标量（包括空字符串）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Range(RangeValue),
    Scalar(Value),
}

impl RuleValue {
    pub fn range(min: impl Into<Value>, max: impl Into<Value>) -> Self {
        Self::Range(RangeValue {
            min: Some(min.into()),
            max: Some(max.into()),
        })
    }

    pub fn empty_range() -> Self {
        Self::Range(RangeValue::default())
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(v) => Some(v),
            Self::Range(_) => None,
        }
    }

    pub fn as_range(&self) -> Option<&RangeValue> {
        match self {
            Self::Range(r) => Some(r),
            Self::Scalar(_) => None,
        }
    }
}

impl From<Value> for RuleValue {
    fn from(value: Value) -> Self {
        Self::Scalar(value)
    }
}

impl From<&str> for RuleValue {
    fn from(value: &str) -> Self {
        Self::Scalar(Value::String(value.to_string()))
    }
}

impl From<String> for RuleValue {
    fn from(value: String) -> Self {
        Self::Scalar(Value::String(value))
    }
}

impl From<i64> for RuleValue {
    fn from(value: i64) -> Self {
        Self::Scalar(Value::from(value))
    }
}

impl From<bool> for RuleValue {
    fn from(value: bool) -> Self {
        Self::Scalar(Value::Bool(value))
    }
}

/// 范围值，边界在用户填写前为空
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeValue {
    #[serde(default)]
    pub min: Option<Value>,
    #[serde(default)]
    pub max: Option<Value>,
}

/// 规则（叶子节点）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: NodePath,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default, rename = "type")]
    pub rule_type: Option<RuleType>,
    /// 展示层的输入控件提示，不参与评估
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub operator: Option<Operator>,
    #[serde(default)]
    pub value: Option<RuleValue>,
}

impl Rule {
    /// 创建空规则（新增规则或分组时的默认子节点）
    pub fn empty(id: NodePath) -> Self {
        Self {
            id,
            field: None,
            rule_type: None,
            input: None,
            operator: None,
            value: None,
        }
    }

    pub fn new(field: impl Into<String>, rule_type: RuleType, operator: Operator) -> Self {
        Self {
            field: Some(field.into()),
            rule_type: Some(rule_type),
            operator: Some(operator),
            ..Self::empty(NodePath::root())
        }
    }

    pub fn with_value(mut self, value: impl Into<RuleValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_range(mut self, min: impl Into<Value>, max: impl Into<Value>) -> Self {
        self.value = Some(RuleValue::range(min, max));
        self
    }

    /// 字段、类型、操作符均已选择；不完整的规则在评估和校验中都会被跳过
    pub fn is_complete(&self) -> bool {
        self.field.as_deref().is_some_and(|f| !f.is_empty())
            && self.rule_type.is_some()
            && self.operator.is_some()
    }
}

/// 逻辑分组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: NodePath,
    #[serde(default)]
    pub condition: LogicalOperator,
    #[serde(default)]
    pub rules: Vec<Node>,
}

impl Group {
    /// 默认分组：AND 条件，带一条空规则
    pub fn with_default_rule(id: NodePath) -> Self {
        let rule = Rule::empty(id.child(0));
        Self {
            id,
            condition: LogicalOperator::And,
            rules: vec![Node::Rule(rule)],
        }
    }

    pub fn new(condition: LogicalOperator, rules: Vec<Node>) -> Self {
        Self {
            id: NodePath::root(),
            condition,
            rules,
        }
    }

    pub fn and(rules: Vec<Node>) -> Self {
        Self::new(LogicalOperator::And, rules)
    }

    pub fn or(rules: Vec<Node>) -> Self {
        Self::new(LogicalOperator::Or, rules)
    }

    /// 按位置为整棵子树重新编号，当前分组使用 `id`
    pub fn renumber(&mut self, id: NodePath) {
        for (slot, child) in self.rules.iter_mut().enumerate() {
            child.renumber(id.child(slot));
        }
        self.id = id;
    }

    /// 以根路径重新编号后返回，便于直接构造整棵树
    pub fn into_tree(mut self) -> Self {
        self.renumber(NodePath::root());
        self
    }

    /// 深度优先查找节点，根路径直接返回自身
    pub fn find_by_path(&self, path: &str) -> Option<NodeRef<'_>> {
        if self.id == path {
            return Some(NodeRef::Group(self));
        }
        for child in &self.rules {
            match child {
                Node::Rule(rule) if rule.id == path => return Some(NodeRef::Rule(rule)),
                Node::Group(group) => {
                    if let Some(found) = group.find_by_path(path) {
                        return Some(found);
                    }
                }
                Node::Rule(_) => {}
            }
        }
        None
    }

    /// 收集子树中所有节点路径（先序）
    pub fn paths(&self) -> Vec<NodePath> {
        let mut paths = vec![self.id.clone()];
        for child in &self.rules {
            match child {
                Node::Rule(rule) => paths.push(rule.id.clone()),
                Node::Group(group) => paths.extend(group.paths()),
            }
        }
        paths
    }
}

/// 树节点（规则或分组）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Rule(Rule),
    Group(Group),
}

impl Node {
    pub fn id(&self) -> &NodePath {
        match self {
            Self::Rule(rule) => &rule.id,
            Self::Group(group) => &group.id,
        }
    }

    pub fn renumber(&mut self, id: NodePath) {
        match self {
            Self::Rule(rule) => rule.id = id,
            Self::Group(group) => group.renumber(id),
        }
    }

    pub fn as_rule(&self) -> Option<&Rule> {
        match self {
            Self::Rule(rule) => Some(rule),
            Self::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(group) => Some(group),
            Self::Rule(_) => None,
        }
    }
}

impl From<Rule> for Node {
    fn from(rule: Rule) -> Self {
        Self::Rule(rule)
    }
}

impl From<Group> for Node {
    fn from(group: Group) -> Self {
        Self::Group(group)
    }
}

/// 对树中节点的借用视图
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeRef<'a> {
    Rule(&'a Rule),
    Group(&'a Group),
}

impl NodeRef<'_> {
    pub fn id(&self) -> &NodePath {
        match self {
            Self::Rule(rule) => &rule.id,
            Self::Group(group) => &group.id,
        }
    }

    pub fn to_node(&self) -> Node {
        match self {
            Self::Rule(rule) => Node::Rule((*rule).clone()),
            Self::Group(group) => Node::Group((*group).clone()),
        }
    }
}

/// 节点的局部更新
///
/// 外层 `None` 表示不修改该字段；规则字段的 `Some(None)`（JSON 中显式的 `null`）表示清空。
/// 切换 `type` 不会自动清空 `operator`/`value`，调用方需要一并传入。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<LogicalOperator>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub field: Option<Option<String>>,
    #[serde(
        default,
        rename = "type",
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub rule_type: Option<Option<RuleType>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub input: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub operator: Option<Option<Operator>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Option<RuleValue>>,
}

/// 字段出现在 JSON 中（即使为 null）时记为 `Some`
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl NodePatch {
    pub fn condition(condition: LogicalOperator) -> Self {
        Self {
            condition: Some(condition),
            ..Self::default()
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(Some(field.into()));
        self
    }

    pub fn rule_type(mut self, rule_type: RuleType) -> Self {
        self.rule_type = Some(Some(rule_type));
        self
    }

    pub fn operator(mut self, operator: Operator) -> Self {
        self.operator = Some(Some(operator));
        self
    }

    pub fn value(mut self, value: impl Into<RuleValue>) -> Self {
        self.value = Some(Some(value.into()));
        self
    }

    pub fn clear_value(mut self) -> Self {
        self.value = Some(None);
        self
    }

    pub fn clear_input(mut self) -> Self {
        self.input = Some(None);
        self
    }

    pub fn has_rule_fields(&self) -> bool {
        self.field.is_some()
            || self.rule_type.is_some()
            || self.input.is_some()
            || self.operator.is_some()
            || self.value.is_some()
    }

    /// 浅合并到规则：补丁中出现的字段覆盖，未出现的保留
    pub fn apply_to_rule(&self, rule: &mut Rule) {
        if let Some(field) = &self.field {
            rule.field = field.clone();
        }
        if let Some(rule_type) = self.rule_type {
            rule.rule_type = rule_type;
        }
        if let Some(input) = &self.input {
            rule.input = input.clone();
        }
        if let Some(operator) = self.operator {
            rule.operator = operator;
        }
        if let Some(value) = &self.value {
            rule.value = value.clone();
        }
    }
}

/// 可供选择的字段配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    /// 展示给用户的标签
    pub label: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    /// 记录中的字段名，缺省时与标签相同
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl FieldOption {
    pub fn new(label: impl Into<String>, rule_type: RuleType) -> Self {
        Self {
            label: label.into(),
            rule_type,
            field: None,
        }
    }

    pub fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.label)
    }
}

/// 查询引擎选项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default)]
    pub fields: Vec<FieldOption>,
}

impl QueryOptions {
    pub fn new(fields: Vec<FieldOption>) -> Self {
        Self { fields }
    }

    pub fn find_field(&self, label: &str) -> Option<&FieldOption> {
        self.fields.iter().find(|f| f.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.label.as_str())
    }
}

/// 单条记录的评估结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationResult {
    pub matched: bool,
    pub matched_rules: Vec<String>,
    pub evaluation_trace: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> Group {
        Group::and(vec![
            Rule::new("price", RuleType::Number, Operator::Greater)
                .with_value("100")
                .into(),
            Group::or(vec![
                Rule::new("name", RuleType::String, Operator::Equal)
                    .with_value("dan")
                    .into(),
                Rule::new("age", RuleType::Number, Operator::Between)
                    .with_range(18, 65)
                    .into(),
            ])
            .into(),
        ])
        .into_tree()
    }

    #[test]
    fn test_tree_serialization() {
        let tree = sample_tree();
        let json = serde_json::to_string_pretty(&tree).unwrap();
        println!("{}", json);

        let parsed: Group = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, tree);
    }

    #[test]
    fn test_tree_deserialization() {
        let json = r#"
        {
            "id": "0",
            "condition": "OR",
            "rules": [
                {
                    "kind": "rule",
                    "id": "0_0",
                    "field": "price",
                    "type": "number",
                    "operator": "not between",
                    "value": {"min": "10", "max": "20"}
                },
                {
                    "kind": "rule",
                    "id": "0_1",
                    "field": null,
                    "type": null,
                    "input": null,
                    "operator": null,
                    "value": null
                },
                {
                    "kind": "group",
                    "id": "0_2",
                    "condition": "AND",
                    "rules": []
                }
            ]
        }
        "#;

        let tree: Group = serde_json::from_str(json).unwrap();
        assert_eq!(tree.condition, LogicalOperator::Or);
        assert_eq!(tree.rules.len(), 3);

        let first = tree.rules[0].as_rule().unwrap();
        assert_eq!(first.operator, Some(Operator::NotBetween));
        assert_eq!(first.value, Some(RuleValue::range("10", "20")));
        assert!(first.is_complete());

        assert!(!tree.rules[1].as_rule().unwrap().is_complete());
        assert!(tree.rules[2].as_group().unwrap().rules.is_empty());
    }

    #[test]
    fn test_scalar_and_range_values() {
        let scalar: RuleValue = serde_json::from_value(json!("dan")).unwrap();
        assert_eq!(scalar.as_scalar(), Some(&json!("dan")));

        let empty: RuleValue = serde_json::from_value(json!({"min": null, "max": null})).unwrap();
        assert_eq!(empty, RuleValue::empty_range());

        let object: RuleValue = serde_json::from_value(json!({"other": 1})).unwrap();
        assert!(object.as_range().is_none());
    }

    #[test]
    fn test_renumber_assigns_positional_ids() {
        let tree = sample_tree();
        assert_eq!(tree.id, "0");
        assert_eq!(tree.rules[0].id(), "0_0");
        let nested = tree.rules[1].as_group().unwrap();
        assert_eq!(nested.id, "0_1");
        assert_eq!(nested.rules[1].id(), "0_1_1");
    }

    #[test]
    fn test_find_by_path() {
        let tree = sample_tree();

        assert!(matches!(tree.find_by_path("0"), Some(NodeRef::Group(g)) if g.id == "0"));
        match tree.find_by_path("0_1_0") {
            Some(NodeRef::Rule(rule)) => assert_eq!(rule.field.as_deref(), Some("name")),
            other => panic!("unexpected lookup result: {:?}", other),
        }
        assert!(matches!(tree.find_by_path("0_1"), Some(NodeRef::Group(_))));
        assert!(tree.find_by_path("0_5").is_none());
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: NodePatch = serde_json::from_value(json!({"operator": "less", "value": null}))
            .unwrap();
        assert_eq!(patch.operator, Some(Some(Operator::Less)));
        assert_eq!(patch.value, Some(None));
        assert_eq!(patch.field, None);

        let mut rule = Rule::new("age", RuleType::Number, Operator::Equal).with_value("41");
        patch.apply_to_rule(&mut rule);
        assert_eq!(rule.field.as_deref(), Some("age"));
        assert_eq!(rule.operator, Some(Operator::Less));
        assert_eq!(rule.value, None);
    }

    #[test]
    fn test_field_option_name_defaults_to_label() {
        let option = FieldOption::new("price", RuleType::Number);
        assert_eq!(option.field_name(), "price");

        let mapped = FieldOption {
            field: Some("unit_price".to_string()),
            ..option
        };
        assert_eq!(mapped.field_name(), "unit_price");
    }
}
