//! 查询树存储
//!
//! 节点保存在 arena 中，路径到下标的索引提供 O(1) 查找，每个节点记录父节点下标。
//! 存储独占树结构：外部只持有路径，读取得到的是快照，结构变化只能通过这里的修改接口。
//!
//! 槽位由存储分配。每个分组维护单调递增的下一个槽位，删除节点后兄弟节点的路径不变，
//! 新节点也不会复用仍然存在的兄弟节点的路径。

use crate::action::TreeAction;
use crate::error::{QueryError, Result};
use crate::models::{FieldOption, Group, Node, NodePatch, QueryOptions, Rule, RuleValue};
use crate::operators::{LogicalOperator, Operator};
use crate::path::{NodePath, ROOT_PATH};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
struct Entry {
    path: NodePath,
    parent: Option<usize>,
    kind: EntryKind,
}

#[derive(Debug, Clone)]
enum EntryKind {
    Rule(Rule),
    Group {
        condition: LogicalOperator,
        children: Vec<usize>,
        next_slot: usize,
    },
}

/// 查询树存储
#[derive(Debug, Clone)]
pub struct TreeStore {
    entries: Vec<Option<Entry>>,
    /// 路径 → arena 下标
    index: HashMap<NodePath, usize>,
    /// 已释放、可复用的下标
    free: Vec<usize>,
    root: usize,
}

impl TreeStore {
    /// 创建默认树：AND 根分组带一条空规则 `0_0`
    pub fn new() -> Self {
        let mut store = Self {
            entries: Vec::new(),
            index: HashMap::new(),
            free: Vec::new(),
            root: 0,
        };
        store.reset();
        store
    }

    /// 恢复默认树
    #[instrument(skip(self))]
    pub fn reset(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.free.clear();

        let root = NodePath::root();
        self.root = self.insert(None, root.clone(), Group::with_default_rule(root).into());
        debug!("查询树已重置");
    }

    /// 当前节点数量（包含根）
    pub fn node_count(&self) -> usize {
        self.index.len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// 整棵树的快照
    pub fn tree(&self) -> Group {
        self.snapshot_group(self.root)
            .unwrap_or_else(|| Group::with_default_rule(NodePath::root()))
    }

    /// 按路径查找节点快照，根路径直接返回整棵树
    pub fn find_by_path(&self, path: &str) -> Option<Node> {
        if path == ROOT_PATH {
            return Some(Node::Group(self.tree()));
        }
        let idx = *self.index.get(path)?;
        self.snapshot(idx)
    }

    /// 仅在 `scope` 为根的子树内查找
    pub fn find_by_path_from(&self, scope: &str, path: &str) -> Option<Node> {
        let scope = NodePath::parse(scope).ok()?;
        let target = NodePath::parse(path).ok()?;
        if !self.index.contains_key(&scope) || !target.is_within(&scope) {
            return None;
        }
        self.find_by_path(target.as_str())
    }

    /// 在分组末尾追加子节点，返回新节点路径
    ///
    /// 传入节点及其子树的 id 会被忽略并重新分配；没有子节点的分组会补上一条空规则。
    #[instrument(skip(self, child), fields(kind = node_kind(&child)))]
    pub fn add_child(&mut self, parent_path: &str, child: Node) -> Result<NodePath> {
        let parent = self.resolve(parent_path)?;
        let Some(path) = self.append(parent, child) else {
            warn!("添加目标不是分组: {}", parent_path);
            return Err(QueryError::NotAGroup(parent_path.to_string()));
        };

        info!("节点已添加: {}", path);
        Ok(path)
    }

    /// 追加一条空规则
    pub fn add_rule(&mut self, parent_path: &str) -> Result<NodePath> {
        self.add_child(parent_path, Rule::empty(NodePath::root()).into())
    }

    /// 追加一个默认分组（AND，带一条空规则）
    pub fn add_group(&mut self, parent_path: &str) -> Result<NodePath> {
        self.add_child(parent_path, Group::and(Vec::new()).into())
    }

    /// 删除节点及其子树，返回被删除部分的快照
    #[instrument(skip(self))]
    pub fn remove_by_path(&mut self, path: &str) -> Result<Node> {
        let target = NodePath::parse(path)?;
        if target.is_root() {
            warn!("根分组不能被删除");
            return Err(QueryError::RootImmutable);
        }
        let Some(&idx) = self.index.get(&target) else {
            warn!("删除不存在的节点: {}", target);
            return Err(QueryError::NotFound(target.to_string()));
        };

        let removed = self
            .snapshot(idx)
            .ok_or_else(|| QueryError::NotFound(target.to_string()))?;

        let parent = self.entry(idx).and_then(|entry| entry.parent);
        if let Some(EntryKind::Group { children, .. }) = parent.and_then(|p| self.kind_mut(p)) {
            children.retain(|&child| child != idx);
        }
        self.release(idx);

        info!("节点已删除: {}", target);
        Ok(removed)
    }

    /// 局部更新节点
    ///
    /// 补丁中出现的字段覆盖原值（显式 `null` 清空），未出现的字段保留。
    /// 分组只接受 `condition`，规则忽略 `condition`；根分组因此只会合并条件。
    #[instrument(skip(self, patch))]
    pub fn update_by_path(&mut self, path: &str, patch: &NodePatch) -> Result<()> {
        let idx = self.resolve(path)?;
        let kind = self
            .kind_mut(idx)
            .ok_or_else(|| QueryError::NotFound(path.to_string()))?;

        match kind {
            EntryKind::Group { condition, .. } => {
                if let Some(new_condition) = patch.condition {
                    *condition = new_condition;
                }
                if patch.has_rule_fields() {
                    warn!("分组不接受规则字段，已忽略: {}", path);
                }
            }
            EntryKind::Rule(rule) => {
                if patch.condition.is_some() {
                    warn!("规则不接受 condition，已忽略: {}", path);
                }
                patch.apply_to_rule(rule);
            }
        }

        debug!("节点已更新: {}", path);
        Ok(())
    }

    /// 设置分组条件
    pub fn set_condition(&mut self, path: &str, condition: LogicalOperator) -> Result<()> {
        let idx = self.resolve(path)?;
        match self.kind_mut(idx) {
            Some(EntryKind::Group { condition: current, .. }) => {
                *current = condition;
                debug!("分组条件已设置: {} -> {}", path, condition);
                Ok(())
            }
            _ => Err(QueryError::NotAGroup(path.to_string())),
        }
    }

    /// 选择字段：确定字段名与类型，操作符取该类型的默认值，清空输入提示与值
    #[instrument(skip(self, option), fields(label = %option.label))]
    pub fn select_field(&mut self, path: &str, option: &FieldOption) -> Result<()> {
        let rule = self.rule_mut(path)?;
        rule.field = Some(option.field_name().to_string());
        rule.rule_type = Some(option.rule_type);
        rule.operator = Some(option.rule_type.default_operator());
        rule.input = None;
        rule.value = None;

        debug!("字段已选择: {} ({})", option.field_name(), option.rule_type);
        Ok(())
    }

    /// 选择操作符
    ///
    /// 范围操作符把值重置为空的 `{min, max}`，空值检查把值置为 `""`，其他操作符保留原值。
    #[instrument(skip(self))]
    pub fn select_operator(&mut self, path: &str, operator: Operator) -> Result<()> {
        let rule = self.rule_mut(path)?;
        let rule_type = match rule.rule_type {
            Some(rule_type) if rule_type.supports(operator) => rule_type,
            other => {
                return Err(QueryError::InvalidOperator {
                    operator: operator.label().to_string(),
                    rule_type: other.map_or("none", |t| t.as_str()).to_string(),
                });
            }
        };

        rule.operator = Some(operator);
        if operator.is_range() {
            rule.value = Some(RuleValue::empty_range());
        } else if operator.is_empty_check() {
            rule.value = Some(RuleValue::from(""));
        }

        debug!("操作符已选择: {} ({})", operator, rule_type);
        Ok(())
    }

    /// 设置规则值，`None` 清空
    pub fn set_value(&mut self, path: &str, value: Option<RuleValue>) -> Result<()> {
        self.rule_mut(path)?.value = value;
        Ok(())
    }

    /// 执行一个操作，字段选择需要从 `options` 中解析标签
    pub fn apply(&mut self, action: TreeAction, options: &QueryOptions) -> Result<()> {
        match action {
            TreeAction::Reset => {
                self.reset();
                Ok(())
            }
            TreeAction::AddRule { parent } => self.add_rule(parent.as_str()).map(drop),
            TreeAction::AddGroup { parent } => self.add_group(parent.as_str()).map(drop),
            TreeAction::Remove { path } => self.remove_by_path(path.as_str()).map(drop),
            TreeAction::Update { path, patch } => self.update_by_path(path.as_str(), &patch),
            TreeAction::SetCondition { path, condition } => {
                self.set_condition(path.as_str(), condition)
            }
            TreeAction::SelectField { path, label } => {
                let option = options
                    .find_field(&label)
                    .ok_or(QueryError::UnknownField(label))?;
                self.select_field(path.as_str(), option)
            }
            TreeAction::SelectOperator { path, operator } => {
                self.select_operator(path.as_str(), operator)
            }
            TreeAction::SetValue { path, value } => self.set_value(path.as_str(), value),
        }
    }

    fn resolve(&self, path: &str) -> Result<usize> {
        let path = NodePath::parse(path)?;
        self.index
            .get(&path)
            .copied()
            .ok_or_else(|| QueryError::NotFound(path.to_string()))
    }

    fn entry(&self, idx: usize) -> Option<&Entry> {
        self.entries.get(idx)?.as_ref()
    }

    fn kind_mut(&mut self, idx: usize) -> Option<&mut EntryKind> {
        self.entries
            .get_mut(idx)?
            .as_mut()
            .map(|entry| &mut entry.kind)
    }

    fn rule_mut(&mut self, path: &str) -> Result<&mut Rule> {
        let idx = self.resolve(path)?;
        match self.kind_mut(idx) {
            Some(EntryKind::Rule(rule)) => Ok(rule),
            Some(EntryKind::Group { .. }) => Err(QueryError::NotARule(path.to_string())),
            None => Err(QueryError::NotFound(path.to_string())),
        }
    }

    fn alloc(&mut self, entry: Entry) -> usize {
        let path = entry.path.clone();
        let idx = match self.free.pop() {
            Some(idx) => {
                self.entries[idx] = Some(entry);
                idx
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };
        self.index.insert(path, idx);
        idx
    }

    /// 以 `path` 写入节点及其子树
    fn insert(&mut self, parent: Option<usize>, path: NodePath, node: Node) -> usize {
        match node {
            Node::Rule(mut rule) => {
                rule.id = path.clone();
                self.alloc(Entry {
                    path,
                    parent,
                    kind: EntryKind::Rule(rule),
                })
            }
            Node::Group(group) => {
                let idx = self.alloc(Entry {
                    path: path.clone(),
                    parent,
                    kind: EntryKind::Group {
                        condition: group.condition,
                        children: Vec::new(),
                        next_slot: 0,
                    },
                });

                let mut rules = group.rules;
                if rules.is_empty() {
                    rules.push(Rule::empty(path.child(0)).into());
                }
                for child in rules {
                    self.append(idx, child);
                }
                idx
            }
        }
    }

    /// 在分组末尾追加并分配槽位；`parent` 不是分组时返回 `None`
    fn append(&mut self, parent: usize, child: Node) -> Option<NodePath> {
        let entry = self.entries.get_mut(parent)?.as_mut()?;
        let EntryKind::Group { next_slot, .. } = &mut entry.kind else {
            return None;
        };
        let path = entry.path.child(*next_slot);
        *next_slot += 1;

        let idx = self.insert(Some(parent), path.clone(), child);
        if let Some(EntryKind::Group { children, .. }) = self.kind_mut(parent) {
            children.push(idx);
        }
        Some(path)
    }

    /// 释放节点及其子树
    fn release(&mut self, idx: usize) {
        let Some(entry) = self.entries.get_mut(idx).and_then(Option::take) else {
            return;
        };
        self.index.remove(&entry.path);
        self.free.push(idx);

        if let EntryKind::Group { children, .. } = entry.kind {
            for child in children {
                self.release(child);
            }
        }
    }

    fn snapshot(&self, idx: usize) -> Option<Node> {
        match &self.entry(idx)?.kind {
            EntryKind::Rule(rule) => Some(Node::Rule(rule.clone())),
            EntryKind::Group { .. } => self.snapshot_group(idx).map(Node::Group),
        }
    }

    fn snapshot_group(&self, idx: usize) -> Option<Group> {
        let entry = self.entry(idx)?;
        let EntryKind::Group {
            condition,
            children,
            ..
        } = &entry.kind
        else {
            return None;
        };

        Some(Group {
            id: entry.path.clone(),
            condition: *condition,
            rules: children
                .iter()
                .filter_map(|&child| self.snapshot(child))
                .collect(),
        })
    }
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

fn node_kind(node: &Node) -> &'static str {
    match node {
        Node::Rule(_) => "rule",
        Node::Group(_) => "group",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::RuleType;
    use serde_json::json;

    fn ids(store: &TreeStore) -> Vec<String> {
        store
            .tree()
            .paths()
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn rule_at(store: &TreeStore, path: &str) -> Rule {
        match store.find_by_path(path) {
            Some(Node::Rule(rule)) => rule,
            other => panic!("{} 不是规则: {:?}", path, other),
        }
    }

    #[test]
    fn test_default_tree() {
        let store = TreeStore::new();
        let tree = store.tree();

        assert_eq!(tree.id, "0");
        assert_eq!(tree.condition, LogicalOperator::And);
        assert_eq!(tree.rules, vec![Node::Rule(Rule::empty(NodePath::root().child(0)))]);
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn test_add_rule_and_group() {
        let mut store = TreeStore::new();

        assert_eq!(store.add_rule("0").unwrap(), "0_1");
        assert_eq!(store.add_group("0").unwrap(), "0_2");
        assert_eq!(store.add_rule("0_2").unwrap(), "0_2_1");

        assert_eq!(ids(&store), vec!["0", "0_0", "0_1", "0_2", "0_2_0", "0_2_1"]);
        let group = store.find_by_path("0_2").unwrap();
        assert_eq!(group.as_group().unwrap().condition, LogicalOperator::And);
    }

    #[test]
    fn test_add_child_reassigns_subtree_ids() {
        let mut store = TreeStore::new();
        let mut child = Group::or(vec![
            Rule::new("price", RuleType::Number, Operator::Greater)
                .with_value("100")
                .into(),
            Group::and(vec![]).into(),
        ]);
        child.id = NodePath::parse("0_9").unwrap();

        let path = store.add_child("0", child.into()).unwrap();
        assert_eq!(path, "0_1");
        assert_eq!(ids(&store), vec!["0", "0_0", "0_1", "0_1_0", "0_1_1", "0_1_1_0"]);
        assert_eq!(rule_at(&store, "0_1_0").field.as_deref(), Some("price"));
        assert!(!store.contains("0_9"));
    }

    #[test]
    fn test_add_child_errors() {
        let mut store = TreeStore::new();

        assert!(matches!(store.add_rule("0_0"), Err(QueryError::NotAGroup(p)) if p == "0_0"));
        assert!(matches!(store.add_rule("0_7"), Err(QueryError::NotFound(p)) if p == "0_7"));
        assert!(matches!(store.add_rule("root"), Err(QueryError::InvalidPath(_))));
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn test_remove_keeps_sibling_ids() {
        let mut store = TreeStore::new();
        store.add_rule("0").unwrap();
        store.add_group("0").unwrap();
        store.add_rule("0").unwrap();

        let removed = store.remove_by_path("0_1").unwrap();
        assert_eq!(removed.id(), "0_1");
        assert_eq!(ids(&store), vec!["0", "0_0", "0_2", "0_2_0", "0_3"]);

        let removed = store.remove_by_path("0_2").unwrap();
        assert_eq!(removed.as_group().unwrap().rules.len(), 1);
        assert!(!store.contains("0_2_0"));
        assert_eq!(ids(&store), vec!["0", "0_0", "0_3"]);
    }

    #[test]
    fn test_new_children_never_reuse_live_ids() {
        let mut store = TreeStore::new();
        store.add_rule("0").unwrap();
        store.add_rule("0").unwrap();
        store.remove_by_path("0_1").unwrap();

        // 只剩 0_0 与 0_2，按子节点数量编号会得到重复的 0_2
        assert_eq!(store.add_rule("0").unwrap(), "0_3");
        assert_eq!(ids(&store), vec!["0", "0_0", "0_2", "0_3"]);
    }

    #[test]
    fn test_remove_errors() {
        let mut store = TreeStore::new();
        assert!(matches!(store.remove_by_path("0"), Err(QueryError::RootImmutable)));
        assert!(matches!(store.remove_by_path("0_4"), Err(QueryError::NotFound(_))));

        store.remove_by_path("0_0").unwrap();
        assert!(matches!(store.remove_by_path("0_0"), Err(QueryError::NotFound(_))));
        assert!(store.tree().rules.is_empty());
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut store = TreeStore::new();
        let patch = NodePatch::default()
            .field("age")
            .rule_type(RuleType::Number)
            .operator(Operator::Less)
            .value("41");

        store.update_by_path("0_0", &patch).unwrap();
        let once = store.tree();
        store.update_by_path("0_0", &patch).unwrap();
        assert_eq!(store.tree(), once);

        let rule = rule_at(&store, "0_0");
        assert_eq!(rule.operator, Some(Operator::Less));
        assert_eq!(rule.value, Some(RuleValue::from("41")));
    }

    #[test]
    fn test_update_merges_and_clears() {
        let mut store = TreeStore::new();
        store
            .update_by_path(
                "0_0",
                &NodePatch::default()
                    .field("price")
                    .rule_type(RuleType::Number)
                    .operator(Operator::Greater)
                    .value("100"),
            )
            .unwrap();

        let patch: NodePatch = serde_json::from_value(json!({"value": null})).unwrap();
        store.update_by_path("0_0", &patch).unwrap();

        let rule = rule_at(&store, "0_0");
        assert_eq!(rule.field.as_deref(), Some("price"));
        assert_eq!(rule.operator, Some(Operator::Greater));
        assert_eq!(rule.value, None);
    }

    #[test]
    fn test_root_update_merges_condition_only() {
        let mut store = TreeStore::new();
        let patch = NodePatch::condition(LogicalOperator::Or).field("price");

        store.update_by_path("0", &patch).unwrap();
        let tree = store.tree();
        assert_eq!(tree.condition, LogicalOperator::Or);
        assert_eq!(tree.id, "0");
        assert_eq!(tree.rules.len(), 1);

        // 规则忽略 condition
        store.update_by_path("0_0", &patch).unwrap();
        assert_eq!(rule_at(&store, "0_0").field.as_deref(), Some("price"));

        assert!(matches!(
            store.update_by_path("0_5", &patch),
            Err(QueryError::NotFound(_))
        ));
    }

    #[test]
    fn test_find_by_path_from_scope() {
        let mut store = TreeStore::new();
        store.add_group("0").unwrap();
        store.add_rule("0_1").unwrap();

        assert!(store.find_by_path_from("0_1", "0_1_1").is_some());
        assert!(store.find_by_path_from("0_1", "0_1").is_some());
        assert!(store.find_by_path_from("0_1", "0_0").is_none());
        assert!(store.find_by_path_from("0_3", "0_1_1").is_none());
        assert!(store.find_by_path_from("0", "0_1_0").is_some());
    }

    #[test]
    fn test_select_field_and_operator() {
        let mut store = TreeStore::new();
        store.set_value("0_0", Some("stale".into())).unwrap();

        let option = FieldOption {
            field: Some("created_at".to_string()),
            ..FieldOption::new("created", RuleType::Date)
        };
        store.select_field("0_0", &option).unwrap();

        let rule = rule_at(&store, "0_0");
        assert_eq!(rule.field.as_deref(), Some("created_at"));
        assert_eq!(rule.rule_type, Some(RuleType::Date));
        assert_eq!(rule.operator, Some(Operator::Between));
        assert_eq!(rule.value, None);

        store.select_operator("0_0", Operator::NotBetween).unwrap();
        assert_eq!(rule_at(&store, "0_0").value, Some(RuleValue::empty_range()));

        store.select_operator("0_0", Operator::IsEmpty).unwrap();
        assert_eq!(rule_at(&store, "0_0").value, Some(RuleValue::from("")));

        store.set_value("0_0", Some("2018-03-10".into())).unwrap();
        store.select_operator("0_0", Operator::After).unwrap();
        assert_eq!(rule_at(&store, "0_0").value, Some(RuleValue::from("2018-03-10")));
    }

    #[test]
    fn test_select_operator_rejects_unsupported() {
        let mut store = TreeStore::new();
        assert!(matches!(
            store.select_operator("0_0", Operator::Equal),
            Err(QueryError::InvalidOperator { .. })
        ));

        store
            .select_field("0_0", &FieldOption::new("name", RuleType::String))
            .unwrap();
        let err = store.select_operator("0_0", Operator::Less).unwrap_err();
        assert_eq!(err.code(), "INVALID_OPERATOR");
        assert_eq!(rule_at(&store, "0_0").operator, Some(Operator::Equal));

        assert!(matches!(
            store.select_operator("0", Operator::Equal),
            Err(QueryError::NotARule(_))
        ));
    }

    #[test]
    fn test_apply_actions() {
        let options = QueryOptions::new(vec![FieldOption::new("price", RuleType::Number)]);
        let mut store = TreeStore::new();
        let root = NodePath::root();
        let first = root.child(0);

        store
            .apply(TreeAction::AddGroup { parent: root.clone() }, &options)
            .unwrap();
        store
            .apply(
                TreeAction::SelectField {
                    path: first.clone(),
                    label: "price".to_string(),
                },
                &options,
            )
            .unwrap();
        store
            .apply(
                TreeAction::SetValue {
                    path: first.clone(),
                    value: Some("100".into()),
                },
                &options,
            )
            .unwrap();
        store
            .apply(
                TreeAction::SetCondition {
                    path: root.clone(),
                    condition: LogicalOperator::Or,
                },
                &options,
            )
            .unwrap();

        let rule = rule_at(&store, "0_0");
        assert_eq!(rule.field.as_deref(), Some("price"));
        assert_eq!(rule.operator, Some(Operator::Equal));
        assert_eq!(store.tree().condition, LogicalOperator::Or);

        let err = store
            .apply(
                TreeAction::SelectField {
                    path: first,
                    label: "weight".to_string(),
                },
                &options,
            )
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownField(label) if label == "weight"));

        store.apply(TreeAction::Reset, &options).unwrap();
        assert_eq!(ids(&store), vec!["0", "0_0"]);
    }

    #[test]
    fn test_set_condition_on_rule_fails() {
        let mut store = TreeStore::new();
        assert!(matches!(
            store.set_condition("0_0", LogicalOperator::Or),
            Err(QueryError::NotAGroup(_))
        ));
    }
}
