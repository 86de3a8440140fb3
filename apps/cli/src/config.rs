//! CLI configuration
//!
//! Layered lowest to highest: built-in defaults, `xmlview.toml` in the working
//! directory (or the file given with `--config`), then `XMLVIEW__*`
//! environment variables such as `XMLVIEW__RENDER__INDENT=2`. A `.env` file
//! is loaded into the environment first.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use xmlview::{PlannerOptions, SerializerOptions, ViewOptions};

const DEFAULT_FILE: &str = "xmlview.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct XmlViewConfig {
    pub render: RenderConfig,
    pub planner: PlannerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub indent: usize,
    /// Force formatted (`true`) or compact (`false`) output.
    pub format: Option<bool>,
    pub declaration: bool,
    pub plan_cache_size: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        let serializer = SerializerOptions::default();
        Self {
            indent: serializer.indent,
            format: serializer.formatted,
            declaration: serializer.declaration,
            plan_cache_size: ViewOptions::default().plan_cache_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Limit used by recursive elements that declare none.
    pub default_recursion_limit: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            default_recursion_limit: PlannerOptions::default().default_recursion_limit,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

impl XmlViewConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_FILE).required(false),
        };
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("XMLVIEW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.render.indent > 16 {
            return Err(format!("render.indent must be at most 16, got {}", self.render.indent));
        }
        if self.render.plan_cache_size == 0 {
            return Err("render.plan_cache_size must be positive".to_string());
        }
        if self.planner.default_recursion_limit == 0 {
            return Err("planner.default_recursion_limit must be positive".to_string());
        }
        Ok(())
    }

    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            planner: PlannerOptions {
                default_recursion_limit: self.planner.default_recursion_limit,
            },
            serializer: SerializerOptions {
                indent: self.render.indent,
                formatted: self.render.format,
                declaration: self.render.declaration,
            },
            plan_cache_size: self.render.plan_cache_size,
        }
    }
}
