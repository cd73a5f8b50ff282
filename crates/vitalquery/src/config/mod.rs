use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::guard::AliasPolicy;
use crate::graph::DEFAULT_RECURSION_LIMIT;
use crate::sqlite::DEFAULT_ROW_CAP;

pub const ENV_DATABASE: &str = "VITALQUERY_DB";
pub const ENV_LLM_BASE_URL: &str = "VITALQUERY_LLM_BASE_URL";
pub const ENV_LLM_MODEL: &str = "VITALQUERY_LLM_MODEL";
pub const ENV_RECURSION_LIMIT: &str = "VITALQUERY_RECURSION_LIMIT";
pub const ENV_LOG: &str = "VITALQUERY_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            llm: LlmConfig::default(),
            agent: AgentConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub row_cap: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./db/protectee.db"),
            row_cap: DEFAULT_ROW_CAP,
        }
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            model: "meta-llama/Meta-Llama-3.1-8B-Instruct".to_string(),
            api_key_env: "VITALQUERY_LLM_API_KEY".to_string(),
            temperature: 0.0,
            max_tokens: Some(256),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub recursion_limit: usize,
    pub alias_policy: AliasPolicy,
    pub intent_gate: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            alias_policy: AliasPolicy::default(),
            intent_gate: true,
        }
    }
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub database: Option<PathBuf>,
    pub log_level: Option<String>,
    pub recursion_limit: Option<usize>,
}

impl AppConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("failed to parse config JSON")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    /// File (or defaults), then environment, then command-line overrides.
    pub fn load(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.apply_overrides(overrides);
        Ok(config)
    }

    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = non_blank(env(ENV_DATABASE)) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(base_url) = non_blank(env(ENV_LLM_BASE_URL)) {
            self.llm.base_url = base_url;
        }
        if let Some(model) = non_blank(env(ENV_LLM_MODEL)) {
            self.llm.model = model;
        }
        if let Some(raw) = non_blank(env(ENV_RECURSION_LIMIT)) {
            self.agent.recursion_limit = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_RECURSION_LIMIT} must be a positive integer: {raw}"))?;
        }
        if let Some(level) = non_blank(env(ENV_LOG)) {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(path) = &overrides.database {
            self.database.path.clone_from(path);
        }
        if let Some(level) = &overrides.log_level {
            self.log_level.clone_from(level);
        }
        if let Some(limit) = overrides.recursion_limit {
            self.agent.recursion_limit = limit;
        }
    }

    #[must_use]
    pub fn json_schema() -> Value {
        serde_json::to_value(schemars::schema_for!(AppConfig))
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
}

impl RuntimePaths {
    pub fn new(home_dir: &Path, cwd: &Path) -> Result<Self> {
        if !home_dir.is_absolute() {
            bail!("home_dir must be absolute: {}", home_dir.display());
        }
        if !cwd.is_absolute() {
            bail!("cwd must be absolute: {}", cwd.display());
        }
        Ok(Self {
            home_dir: normalize_lexical(home_dir),
            cwd: normalize_lexical(cwd),
        })
    }

    /// `~` and `~/...` expand against the home directory, relative paths
    /// against the cwd; `.` and `..` fold without touching the filesystem.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let expanded = expand_tilde(path, &self.home_dir)?;
        let resolved = if expanded.is_absolute() {
            expanded
        } else {
            self.cwd.join(expanded)
        };
        Ok(normalize_lexical(&resolved))
    }
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }
    normalized
}
