//! 可观测性模块
//!
//! 所有可执行程序通过单一入口点初始化日志，保证一致的过滤规则与输出格式。

pub mod tracing;

use ::tracing::info;
use anyhow::Result;
use serde::Deserialize;

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 人类可读
    #[default]
    Pretty,
    /// 结构化
    Json,
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// 服务名称，写入启动日志
    pub service_name: String,

    /// 日志级别（如 "info", "query_tree=debug"），RUST_LOG 优先
    pub log_level: String,

    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl ObservabilityConfig {
    /// 注入服务名
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }
}

/// 可观测性资源守卫
///
/// Drop 时记录关闭日志。
pub struct ObservabilityGuard {
    service_name: String,
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        info!(service = %self.service_name, "Shutting down observability...");
    }
}

/// 统一初始化可观测性
///
/// # Example
///
/// ```ignore
/// use query_tree_shared::observability::{init, ObservabilityConfig};
///
/// fn main() -> anyhow::Result<()> {
///     let config = ObservabilityConfig::default().with_service_name("query-tree");
///     let _guard = init(&config)?;
///
///     // 应用逻辑...
///
///     Ok(())
/// }
/// ```
pub fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    tracing::init(config)?;

    info!(
        service = %config.service_name,
        log_level = %config.log_level,
        log_format = ?config.log_format,
        "Observability initialized"
    );

    Ok(ObservabilityGuard {
        service_name: config.service_name.clone(),
    })
}
