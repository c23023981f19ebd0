//! 展示指令
//!
//! 把引擎状态映射为一组与界面无关的指令，由宿主自行渲染。纯函数，不持有状态。

use crate::coerce::to_text;
use crate::engine::QueryEngine;
use crate::models::{Group, Node, QueryOptions, Record, Rule};
use crate::operators::{LogicalOperator, Operator, RuleType};
use crate::path::NodePath;
use crate::validator::ValidationReport;
use serde::Serialize;
use serde_json::Value;

/// 输入控件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Number,
    Date,
}

impl From<RuleType> for InputKind {
    fn from(rule_type: RuleType) -> Self {
        match rule_type {
            RuleType::Number => Self::Number,
            RuleType::Date => Self::Date,
            RuleType::String | RuleType::Boolean => Self::Text,
        }
    }
}

/// 值输入区域
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "input", content = "kind", rename_all = "snake_case")]
pub enum ValueInput {
    /// 空值检查不需要输入
    None,
    Single(InputKind),
    /// `min` / `max` 两个输入框
    Range(InputKind),
    /// `true` / `false` 选择
    BooleanChoice,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "instruction", rename_all = "snake_case")]
pub enum Instruction {
    /// 分组当前激活的 AND/OR
    ActiveCondition {
        group: NodePath,
        condition: LogicalOperator,
    },
    /// 规则可选的操作符
    OperatorChoices {
        rule: NodePath,
        operators: Vec<Operator>,
    },
    ValueInput { rule: NodePath, input: ValueInput },
    /// 校验结果标记
    MarkRule { rule: NodePath, valid: bool },
    /// 结果表格，每列对应一个配置的字段标签
    ShowResults {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
}

/// 生成展示指令
pub fn render(
    tree: &Group,
    report: &ValidationReport,
    filtered: &[Record],
    fields: &QueryOptions,
) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    render_group(tree, report, &mut instructions);
    instructions.push(results(filtered, fields));
    instructions
}

/// 按引擎当前状态生成展示指令
pub fn render_engine(engine: &QueryEngine) -> Vec<Instruction> {
    render(
        &engine.tree(),
        &engine.validate(),
        engine.filtered(),
        engine.options(),
    )
}

fn render_group(group: &Group, report: &ValidationReport, out: &mut Vec<Instruction>) {
    out.push(Instruction::ActiveCondition {
        group: group.id.clone(),
        condition: group.condition,
    });
    for child in &group.rules {
        match child {
            Node::Rule(rule) => render_rule(rule, report, out),
            Node::Group(nested) => render_group(nested, report, out),
        }
    }
}

fn render_rule(rule: &Rule, report: &ValidationReport, out: &mut Vec<Instruction>) {
    if let Some(rule_type) = rule.rule_type {
        if rule_type == RuleType::Boolean {
            out.push(Instruction::ValueInput {
                rule: rule.id.clone(),
                input: ValueInput::BooleanChoice,
            });
        } else {
            out.push(Instruction::OperatorChoices {
                rule: rule.id.clone(),
                operators: rule_type.operators().to_vec(),
            });
            if let Some(operator) = rule.operator {
                out.push(Instruction::ValueInput {
                    rule: rule.id.clone(),
                    input: value_input(rule_type, operator),
                });
            }
        }
    }

    if let Some(check) = report.check(rule.id.as_str()) {
        out.push(Instruction::MarkRule {
            rule: rule.id.clone(),
            valid: check.valid,
        });
    }
}

fn value_input(rule_type: RuleType, operator: Operator) -> ValueInput {
    if operator.is_empty_check() {
        ValueInput::None
    } else if operator.is_range() {
        ValueInput::Range(rule_type.into())
    } else {
        ValueInput::Single(rule_type.into())
    }
}

fn results(filtered: &[Record], fields: &QueryOptions) -> Instruction {
    let rows = filtered
        .iter()
        .map(|record| {
            fields
                .fields
                .iter()
                .map(|option| match record.get(option.field_name()) {
                    None | Some(Value::Null) => String::new(),
                    Some(value) => to_text(value),
                })
                .collect()
        })
        .collect();

    Instruction::ShowResults {
        columns: fields.labels().map(str::to_string).collect(),
        rows,
    }
}
