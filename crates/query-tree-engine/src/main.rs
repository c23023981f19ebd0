//! 查询树回放工具
//!
//! 读取记录集合与操作脚本，依次执行每个操作并输出最终的过滤结果。

use anyhow::{Context, Result};
use query_tree::{FieldOption, QueryEngine, QueryOptions, Record, RuleType, TreeAction};
use query_tree_shared::config::{AppConfig, FieldConfig};
use query_tree_shared::observability;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const SERVICE_NAME: &str = "query-tree";

fn main() -> Result<()> {
    // 统一加载配置：从 config/{service_name}.toml 加载，包含可观测性配置
    let config = AppConfig::load(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });

    let obs_config = config.observability.clone().with_service_name(SERVICE_NAME);
    let _guard = observability::init(&obs_config)?;

    info!(environment = %config.environment, "Starting query-tree replay...");

    let options = query_options(&config.fields)?;
    let records: Vec<Record> = read_json(&config.session.records_path)?;
    let script: Vec<TreeAction> = read_json(&config.session.script_path)?;
    info!(
        fields = options.fields.len(),
        records = records.len(),
        actions = script.len(),
        "会话已加载"
    );

    let mut engine = QueryEngine::new(options, records)
        .with_listener(|rows: &[Record]| debug!(matched = rows.len(), "过滤结果已更新"));

    for (step, action) in script.into_iter().enumerate() {
        let name = action.to_string();
        match engine.apply(action) {
            Ok(outcome) => info!(step, action = %name, ?outcome, "操作完成"),
            Err(e) => warn!(step, action = %name, code = e.code(), error = %e, "操作失败，已跳过"),
        }
    }

    info!(
        matched = engine.filtered().len(),
        total = engine.records().len(),
        "回放完成"
    );
    println!("{}", serde_json::to_string_pretty(engine.filtered())?);

    Ok(())
}

/// 把配置中的字段转换为引擎选项
fn query_options(fields: &[FieldConfig]) -> Result<QueryOptions> {
    let fields = fields
        .iter()
        .map(|f| {
            let rule_type: RuleType = f
                .field_type
                .parse()
                .with_context(|| format!("字段 {} 的类型无效", f.label))?;
            Ok(FieldOption {
                label: f.label.clone(),
                rule_type,
                field: f.field.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(QueryOptions::new(fields))
}

fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("读取文件失败: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("解析 JSON 失败: {}", path.display()))
}
