//! 查询树执行器
//!
//! 对单条记录递归折叠查询树：规则交给 [`ConditionEvaluator`]，分组按 AND/OR 合并子结果。
//! 不完整的规则被跳过；没有任何可评估子节点的分组视为通过，与条件无关。

use crate::evaluator::ConditionEvaluator;
use crate::models::{EvaluationResult, Group, Node, Record, Rule};
use crate::operators::LogicalOperator;

/// 查询树执行器
pub struct TreeExecutor {
    /// 是否记录详细评估追踪
    trace_enabled: bool,
}

impl TreeExecutor {
    pub fn new() -> Self {
        Self {
            trace_enabled: false,
        }
    }

    /// 启用评估追踪
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// 记录是否通过查询树
    pub fn matches(&self, tree: &Group, record: &Record) -> bool {
        let mut result = EvaluationResult::default();
        self.evaluate_group(tree, record, &mut result)
    }

    /// 执行评估并返回匹配的规则与追踪信息
    pub fn execute(&self, tree: &Group, record: &Record) -> EvaluationResult {
        let mut result = EvaluationResult::default();
        let matched = self.evaluate_group(tree, record, &mut result);
        result.matched = matched;
        result
    }

    /// 过滤记录，保持原有顺序
    pub fn filter(&self, tree: &Group, records: &[Record]) -> Vec<Record> {
        records
            .iter()
            .filter(|record| self.matches(tree, record))
            .cloned()
            .collect()
    }

    /// 评估子节点；不完整的规则返回 `None`
    fn evaluate_node(
        &self,
        node: &Node,
        record: &Record,
        result: &mut EvaluationResult,
    ) -> Option<bool> {
        match node {
            Node::Rule(rule) => self.evaluate_rule(rule, record, result),
            Node::Group(group) => Some(self.evaluate_group(group, record, result)),
        }
    }

    fn evaluate_rule(
        &self,
        rule: &Rule,
        record: &Record,
        result: &mut EvaluationResult,
    ) -> Option<bool> {
        let Some(matched) = ConditionEvaluator::evaluate_rule(rule, record) else {
            if self.trace_enabled {
                result
                    .evaluation_trace
                    .push(format!("{}: 规则不完整，跳过", rule.id));
            }
            return None;
        };

        if self.trace_enabled {
            result.evaluation_trace.push(format!(
                "{}: {} {} {} => {}",
                rule.id,
                rule.field.as_deref().unwrap_or_default(),
                rule.operator.map(|op| op.label()).unwrap_or_default(),
                rule.value
                    .as_ref()
                    .and_then(|v| serde_json::to_string(v).ok())
                    .unwrap_or_else(|| "null".to_string()),
                if matched { "MATCHED" } else { "NOT_MATCHED" }
            ));
        }

        if matched {
            result.matched_rules.push(rule.id.to_string());
        }

        Some(matched)
    }

    /// 评估分组节点（短路求值）
    fn evaluate_group(&self, group: &Group, record: &Record, result: &mut EvaluationResult) -> bool {
        if self.trace_enabled {
            result.evaluation_trace.push(format!(
                "{}: 开始评估 {} 组 (共 {} 个子节点)",
                group.id,
                group.condition,
                group.rules.len()
            ));
        }

        let mut evaluated = 0usize;
        for child in &group.rules {
            let Some(child_matched) = self.evaluate_node(child, record, result) else {
                continue;
            };
            evaluated += 1;

            match (group.condition, child_matched) {
                (LogicalOperator::And, false) => {
                    self.trace(result, || {
                        format!("{}: AND 短路 - 子节点 {} 不匹配", group.id, child.id())
                    });
                    return false;
                }
                (LogicalOperator::Or, true) => {
                    self.trace(result, || {
                        format!("{}: OR 短路 - 子节点 {} 匹配", group.id, child.id())
                    });
                    return true;
                }
                _ => {}
            }
        }

        if evaluated == 0 {
            self.trace(result, || format!("{}: 无可评估的子节点，视为通过", group.id));
            return true;
        }

        match group.condition {
            LogicalOperator::And => {
                self.trace(result, || format!("{}: AND 组全部匹配", group.id));
                true
            }
            LogicalOperator::Or => {
                self.trace(result, || format!("{}: OR 组无匹配", group.id));
                false
            }
        }
    }

    fn trace(&self, result: &mut EvaluationResult, line: impl FnOnce() -> String) {
        if self.trace_enabled {
            result.evaluation_trace.push(line());
        }
    }
}

impl Default for TreeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleValue;
    use crate::operators::{Operator, RuleType};
    use crate::path::NodePath;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn price_greater(value: &str) -> Node {
        Rule::new("price", RuleType::Number, Operator::Greater)
            .with_value(value)
            .into()
    }

    fn incomplete() -> Node {
        Rule::empty(NodePath::root()).into()
    }

    #[test]
    fn test_single_rule_filter() {
        let tree = Group::and(vec![price_greater("100")]).into_tree();
        let records = vec![
            record(json!({"price": 78})),
            record(json!({"price": 178})),
            record(json!({"price": 17})),
        ];

        let filtered = TreeExecutor::new().filter(&tree, &records);
        assert_eq!(filtered, vec![record(json!({"price": 178}))]);
    }

    #[test]
    fn test_empty_group_passes_regardless_of_condition() {
        let any = record(json!({"price": 1}));
        for condition in [LogicalOperator::And, LogicalOperator::Or] {
            let empty = Group::new(condition, vec![]).into_tree();
            assert!(TreeExecutor::new().matches(&empty, &any));

            let only_incomplete =
                Group::new(condition, vec![incomplete(), incomplete()]).into_tree();
            assert!(TreeExecutor::new().matches(&only_incomplete, &any));
        }
    }

    #[test]
    fn test_incomplete_rules_do_not_affect_fold() {
        let tree = Group::or(vec![incomplete(), price_greater("100")]).into_tree();
        assert!(!TreeExecutor::new().matches(&tree, &record(json!({"price": 50}))));
        assert!(TreeExecutor::new().matches(&tree, &record(json!({"price": 150}))));
    }

    #[test]
    fn test_nested_or_inside_and() {
        let nested = Group::or(vec![
            Rule::new("name", RuleType::String, Operator::Equal)
                .with_value("dan")
                .into(),
            Rule::new("age", RuleType::Number, Operator::Less)
                .with_value("41")
                .into(),
        ]);
        let tree = Group::and(vec![price_greater("100"), nested.into()]).into_tree();
        let executor = TreeExecutor::new();

        assert!(executor.matches(&tree, &record(json!({"price": 178, "name": "dan", "age": 440}))));
        assert!(executor.matches(&tree, &record(json!({"price": 178, "name": "ron", "age": 40}))));
        assert!(!executor.matches(&tree, &record(json!({"price": 178, "name": "haim", "age": 44}))));
        assert!(!executor.matches(&tree, &record(json!({"price": 78, "name": "dan", "age": 40}))));
    }

    #[test]
    fn test_nested_empty_group_counts_as_pass() {
        let tree = Group::or(vec![price_greater("100"), Group::and(vec![]).into()]).into_tree();
        assert!(TreeExecutor::new().matches(&tree, &record(json!({"price": 1}))));
    }

    #[test]
    fn test_execute_with_trace() {
        let tree = Group::and(vec![
            price_greater("100"),
            incomplete(),
            Rule::new("tags", RuleType::String, Operator::Contains)
                .with_value(RuleValue::from("vip"))
                .into(),
        ])
        .into_tree();

        let result = TreeExecutor::new()
            .with_trace()
            .execute(&tree, &record(json!({"price": 178, "tags": "vip,frequent"})));

        assert!(result.matched);
        assert_eq!(result.matched_rules, vec!["0_0", "0_2"]);
        for line in &result.evaluation_trace {
            println!("{}", line);
        }
        assert!(result.evaluation_trace.iter().any(|l| l.contains("0_1: 规则不完整")));
        assert!(result.evaluation_trace.iter().any(|l| l.contains("AND 组全部匹配")));
    }

    #[test]
    fn test_execute_without_trace_records_matches_only() {
        let tree = Group::or(vec![price_greater("500"), price_greater("100")]).into_tree();
        let result = TreeExecutor::new().execute(&tree, &record(json!({"price": 178})));

        assert!(result.matched);
        assert_eq!(result.matched_rules, vec!["0_1"]);
        assert!(result.evaluation_trace.is_empty());
    }
}
