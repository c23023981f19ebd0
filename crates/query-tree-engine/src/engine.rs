//! 查询引擎
//!
//! 组合查询树存储、校验器与执行器。每次过滤先校验整棵树：校验失败或没有记录时
//! 保留上一次的结果；成功时替换结果并通知监听器一次。

use crate::action::TreeAction;
use crate::error::{QueryError, Result};
use crate::executor::TreeExecutor;
use crate::models::{EvaluationResult, Group, Node, NodePatch, QueryOptions, Record, RuleValue};
use crate::operators::{LogicalOperator, Operator};
use crate::path::NodePath;
use crate::store::TreeStore;
use crate::validator::{TreeValidator, ValidationReport};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// 过滤结果监听器
///
/// 任何 `Fn(&[Record])` 闭包都可以直接作为监听器。
#[cfg_attr(test, mockall::automock)]
pub trait ResultListener: Send {
    /// 每次成功过滤后调用一次
    fn on_results(&self, filtered: &[Record]);
}

impl<F> ResultListener for F
where
    F: Fn(&[Record]) + Send,
{
    fn on_results(&self, filtered: &[Record]) {
        self(filtered)
    }
}

/// 一次"校验 → 过滤"周期的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FilterOutcome {
    /// 过滤完成，结果已替换并通知
    Filtered { matched: usize, total: usize },
    /// 存在未通过校验的规则，结果保持不变
    Incomplete { invalid_rules: Vec<NodePath> },
    /// 没有可过滤的记录，结果保持不变
    NoRecords,
}

impl FilterOutcome {
    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::Filtered { .. })
    }
}

/// 多线程宿主使用的共享引擎，锁覆盖完整的修改与过滤周期
pub type SharedQueryEngine = Arc<Mutex<QueryEngine>>;

/// 查询引擎
pub struct QueryEngine {
    options: QueryOptions,
    store: TreeStore,
    executor: TreeExecutor,
    records: Vec<Record>,
    filtered: Vec<Record>,
    listener: Option<Box<dyn ResultListener>>,
}

impl QueryEngine {
    /// 创建引擎，查询树为默认树，初始结果等于全部记录
    pub fn new(options: QueryOptions, records: Vec<Record>) -> Self {
        info!(
            fields = options.fields.len(),
            records = records.len(),
            "查询引擎已创建"
        );
        Self {
            options,
            store: TreeStore::new(),
            executor: TreeExecutor::new(),
            filtered: records.clone(),
            records,
            listener: None,
        }
    }

    /// 设置结果监听器
    pub fn with_listener(mut self, listener: impl ResultListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn into_shared(self) -> SharedQueryEngine {
        Arc::new(Mutex::new(self))
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    // ---- 修改接口 ----
    // 以下方法只修改查询树，不触发过滤；需要完整周期时使用 `apply`。

    pub fn reset(&mut self) {
        self.store.reset();
    }

    pub fn find_by_path(&self, path: &str) -> Option<Node> {
        self.store.find_by_path(path)
    }

    pub fn find_by_path_from(&self, scope: &str, path: &str) -> Option<Node> {
        self.store.find_by_path_from(scope, path)
    }

    pub fn add_child(&mut self, parent_path: &str, child: Node) -> Result<NodePath> {
        self.store.add_child(parent_path, child)
    }

    pub fn add_rule(&mut self, parent_path: &str) -> Result<NodePath> {
        self.store.add_rule(parent_path)
    }

    pub fn add_group(&mut self, parent_path: &str) -> Result<NodePath> {
        self.store.add_group(parent_path)
    }

    pub fn remove_by_path(&mut self, path: &str) -> Result<Node> {
        self.store.remove_by_path(path)
    }

    pub fn update_by_path(&mut self, path: &str, patch: &NodePatch) -> Result<()> {
        self.store.update_by_path(path, patch)
    }

    /// 按标签选择字段
    pub fn select_field(&mut self, path: &str, label: &str) -> Result<()> {
        let option = self
            .options
            .find_field(label)
            .ok_or_else(|| QueryError::UnknownField(label.to_string()))?;
        self.store.select_field(path, option)
    }

    pub fn select_operator(&mut self, path: &str, operator: Operator) -> Result<()> {
        self.store.select_operator(path, operator)
    }

    pub fn set_value(&mut self, path: &str, value: Option<RuleValue>) -> Result<()> {
        self.store.set_value(path, value)
    }

    pub fn set_condition(&mut self, path: &str, condition: LogicalOperator) -> Result<()> {
        self.store.set_condition(path, condition)
    }

    // ---- 查询接口 ----

    /// 查询树快照
    pub fn tree(&self) -> Group {
        self.store.tree()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// 替换工作记录，结果重置为全部记录
    pub fn set_records(&mut self, records: Vec<Record>) {
        debug!(records = records.len(), "工作记录已替换");
        self.filtered = records.clone();
        self.records = records;
    }

    pub fn filtered(&self) -> &[Record] {
        &self.filtered
    }

    pub fn validate(&self) -> ValidationReport {
        TreeValidator::validate(&self.store.tree())
    }

    /// 对单条记录评估并输出追踪
    pub fn explain(&self, record: &Record) -> EvaluationResult {
        TreeExecutor::new()
            .with_trace()
            .execute(&self.store.tree(), record)
    }

    /// 过滤给定记录
    ///
    /// 查询树校验通过且 `records` 非空时替换结果并通知监听器，否则保留上一次的结果。
    pub fn filter(&mut self, records: &[Record]) -> &[Record] {
        self.run_filter(records);
        &self.filtered
    }

    /// 对工作记录执行一次过滤周期
    pub fn update_results(&mut self) -> FilterOutcome {
        let records = std::mem::take(&mut self.records);
        let outcome = self.run_filter(&records);
        self.records = records;
        outcome
    }

    /// 执行操作并完成一次"修改 → 校验 → 过滤 → 通知"周期
    pub fn apply(&mut self, action: TreeAction) -> Result<FilterOutcome> {
        debug!(action = %action, "执行查询树操作");
        self.store.apply(action, &self.options)?;
        Ok(self.update_results())
    }

    fn run_filter(&mut self, records: &[Record]) -> FilterOutcome {
        let tree = self.store.tree();

        let report = TreeValidator::validate(&tree);
        if !report.is_valid() {
            let invalid_rules = report.invalid_paths();
            debug!(?invalid_rules, "查询树未完成，保留上一次结果");
            return FilterOutcome::Incomplete { invalid_rules };
        }

        if records.is_empty() {
            debug!("没有可过滤的记录，保留上一次结果");
            return FilterOutcome::NoRecords;
        }

        self.filtered = self.executor.filter(&tree, records);
        debug!(
            matched = self.filtered.len(),
            total = records.len(),
            "过滤完成"
        );

        if let Some(listener) = &self.listener {
            listener.on_results(&self.filtered);
        }

        FilterOutcome::Filtered {
            matched: self.filtered.len(),
            total: records.len(),
        }
    }
}
