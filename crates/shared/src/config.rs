//! 配置管理模块
//!
//! 支持多层配置文件加载与环境变量覆盖，缺失的配置项回退到默认值。

use crate::observability::ObservabilityConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 回放会话配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 记录集合（JSON 数组）
    pub records_path: String,
    /// 操作脚本（JSON 数组）
    pub script_path: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            records_path: "demos/records.json".to_string(),
            script_path: "demos/session.json".to_string(),
        }
    }
}

/// 可选字段配置
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldConfig {
    /// 展示给用户的标签
    pub label: String,
    /// string / number / boolean / date
    #[serde(rename = "type")]
    pub field_type: String,
    /// 记录中的字段名，缺省时使用标签
    #[serde(default)]
    pub field: Option<String>,
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub observability: ObservabilityConfig,
    pub session: SessionConfig,
    pub fields: Vec<FieldConfig>,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（QUERY_TREE_ 前缀，层级用双下划线，如 QUERY_TREE_SESSION__RECORDS_PATH -> session.records_path）
    ///
    /// 环境由 QUERY_TREE_ENV 指定，配置目录由 CONFIG_DIR 指定。
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("QUERY_TREE_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), service_name, &env)
    }

    /// 从指定目录加载配置
    pub fn load_from(config_dir: &Path, service_name: &str, env: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("QUERY_TREE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
