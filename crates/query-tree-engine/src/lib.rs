//! 查询树过滤引擎
//!
//! 维护由 AND/OR 分组与字段规则组成的查询树，并用它过滤记录集合：
//! - 基于路径的查询树存储与修改接口
//! - 按类型分派的条件比较（字符串、数值、日期、布尔）
//! - 过滤前的完整性校验
//! - 结果监听与展示指令

pub mod action;
pub mod coerce;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod models;
pub mod operators;
pub mod path;
pub mod presenter;
pub mod store;
pub mod validator;

pub use action::TreeAction;
pub use engine::{FilterOutcome, QueryEngine, ResultListener, SharedQueryEngine};
pub use error::{QueryError, Result};
pub use evaluator::ConditionEvaluator;
pub use executor::TreeExecutor;
pub use models::{
    EvaluationResult, FieldOption, Group, Node, NodePatch, NodeRef, QueryOptions, RangeValue,
    Record, Rule, RuleValue,
};
pub use operators::{LogicalOperator, Operator, RuleType};
pub use path::NodePath;
pub use presenter::{Instruction, render, render_engine};
pub use store::TreeStore;
pub use validator::{InvalidReason, TreeValidator, ValidationReport, is_valid};
