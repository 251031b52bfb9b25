//! Configuration system for RagBridge.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> explicit
//! overrides. Configuration is loaded from the platform config directory
//! (`ragbridge/config.toml`) and/or `.ragbridge/config.toml` in the workspace directory.
//!
//! The orchestration knobs are all optional. Accessors apply the built-in defaults, and
//! numeric overrides that fail to parse fall back to those defaults instead of failing the
//! load, so a stray `AI_MAX_CHUNK_COUNT=lots` never takes the chat endpoint down.

use crate::adapter::fields::{coerce_float, coerce_int};
use crate::error::ConfigError;
use crate::gateway::GatewayConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Deployment path used when no orchestration endpoint is configured.
pub const DEFAULT_ENDPOINT_PATH: &str = "/v2/inference/deployments/d0246f61c3352271/completion";

/// Last-resort repository id for local development. Production deployments set
/// `orchestration.repository_id` or pass a resolved id per request.
pub const FALLBACK_REPOSITORY_ID: &str = "c58a8c87-f12d-4712-a791-2295640dafd8";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful RAG assistant. Answer strictly based on the provided context. \
     If the information is not in the context, say so clearly.";

pub const DEFAULT_MODEL_NAME: &str = "gemini-2.0-flash-lite";
pub const DEFAULT_MODEL_VERSION: &str = "001";
pub const DEFAULT_MAX_CHUNK_COUNT: usize = 6;
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_HISTORY_MAX_TURNS: i64 = 0;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Environment variables understood by earlier deployments, mapped onto config paths.
const LEGACY_ENV_VARS: &[(&str, &str)] = &[
    ("AI_CORE_ORCHESTRATION_ENDPOINT", "orchestration.endpoint"),
    ("AI_CORE_VECTOR_REPOSITORY_ID", "orchestration.repository_id"),
    ("AI_MAX_CHUNK_COUNT", "orchestration.max_chunk_count"),
    ("AI_SYSTEM_PROMPT", "orchestration.system_prompt"),
    ("AI_HISTORY_MAX_TURNS", "orchestration.history_max_turns"),
    ("AI_MODEL_NAME", "orchestration.model_name"),
    ("AI_MODEL_VERSION", "orchestration.model_version"),
    ("AI_MAX_OUTPUT_TOKENS", "orchestration.max_output_tokens"),
    ("AI_TEMPERATURE", "orchestration.temperature"),
    ("AI_CORE_PROXY_BASE_URL", "transport.base_url"),
    ("AI_RESOURCE_GROUP", "transport.resource_group"),
    ("CHATBOT_FORCE_LOCAL_FALLBACK", "chat.force_local_fallback"),
];

/// Top-level configuration for RagBridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub orchestration: OrchestrationSettings,
    pub transport: TransportConfig,
    pub chat: ChatConfig,
    pub gateway: GatewayConfig,
}

impl BridgeConfig {
    /// Validate this config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid. Never errors: every knob has a
    /// usable default.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let temperature = self.orchestration.temperature();
        if !(0.0..=2.0).contains(&temperature) {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0-2.0",
                temperature
            ));
        }
        if self.orchestration.max_chunk_count() == 0 {
            warnings.push("max_chunk_count is 0; grounding will return no context".to_string());
        }
        if self.orchestration.repository_id.as_deref().is_none_or(str::is_empty) {
            warnings.push(format!(
                "no repository_id configured; requests without one use the development repository {}",
                FALLBACK_REPOSITORY_ID
            ));
        }
        if self.transport.base_url.as_deref().is_none_or(str::is_empty)
            && !self.chat.force_local_fallback
        {
            warnings.push("transport.base_url is not set; live questions will fail".to_string());
        }
        warnings
    }
}

/// Knobs for the orchestration payload. `None` means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationSettings {
    /// Orchestration endpoint path appended to the transport base URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Repository used when the caller does not supply one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
    /// Maximum grounding chunks per request.
    #[serde(
        deserialize_with = "lenient::count",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_chunk_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Maximum user/assistant pairs injected as history. Zero or less disables history.
    #[serde(
        deserialize_with = "lenient::signed",
        skip_serializing_if = "Option::is_none"
    )]
    pub history_max_turns: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(
        deserialize_with = "lenient::tokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_output_tokens: Option<u32>,
    #[serde(
        deserialize_with = "lenient::float",
        skip_serializing_if = "Option::is_none"
    )]
    pub temperature: Option<f64>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl OrchestrationSettings {
    pub fn endpoint(&self) -> &str {
        non_empty(&self.endpoint).unwrap_or(DEFAULT_ENDPOINT_PATH)
    }

    /// Configured fallback repository, or the development constant.
    pub fn fallback_repository_id(&self) -> &str {
        non_empty(&self.repository_id).unwrap_or(FALLBACK_REPOSITORY_ID)
    }

    pub fn max_chunk_count(&self) -> usize {
        self.max_chunk_count.unwrap_or(DEFAULT_MAX_CHUNK_COUNT)
    }

    pub fn system_prompt(&self) -> &str {
        non_empty(&self.system_prompt).unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn history_max_turns(&self) -> i64 {
        self.history_max_turns.unwrap_or(DEFAULT_HISTORY_MAX_TURNS)
    }

    pub fn model_name(&self) -> &str {
        non_empty(&self.model_name).unwrap_or(DEFAULT_MODEL_NAME)
    }

    pub fn model_version(&self) -> &str {
        non_empty(&self.model_version).unwrap_or(DEFAULT_MODEL_VERSION)
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS)
    }

    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }
}

/// Configuration for the HTTP call to the orchestration service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL of the orchestration proxy, e.g. `https://proxy.example.com`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Value for the `AI-Resource-Group` header.
    pub resource_group: String,
    /// Environment variable holding a bearer token, if the upstream requires one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(
        deserialize_with = "lenient::seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout_secs: Option<u64>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            resource_group: "default".to_string(),
            api_key_env: None,
            timeout_secs: None,
        }
    }
}

impl TransportConfig {
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

/// Chat service behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Answer locally without calling the upstream (development without a live proxy).
    #[serde(deserialize_with = "lenient::flag")]
    pub force_local_fallback: bool,
}

/// Deserializers that never fail on a malformed scalar: they log and yield `None`.
mod lenient {
    use super::*;
    use serde_json::Value;
    use tracing::warn;

    fn raw<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
        Option::<Value>::deserialize(deserializer)
    }

    fn rejected<T>(value: &Value, kind: &str) -> Option<T> {
        warn!(value = %value, kind, "Ignoring unparsable configuration value; using default");
        None
    }

    fn unsigned<T: TryFrom<i64>>(value: Value, kind: &str) -> Option<T> {
        match coerce_int(&value).and_then(|n| T::try_from(n).ok()) {
            Some(n) => Some(n),
            None => rejected(&value, kind),
        }
    }

    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
        Ok(raw(deserializer)?.and_then(|v| unsigned(v, "count")))
    }

    pub fn tokens<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        Ok(raw(deserializer)?.and_then(|v| unsigned(v, "token limit")))
    }

    pub fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        Ok(raw(deserializer)?.and_then(|v| unsigned(v, "seconds")))
    }

    pub fn signed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Ok(raw(deserializer)?.and_then(|v| match coerce_int(&v) {
            Some(n) => Some(n),
            None => rejected(&v, "integer"),
        }))
    }

    pub fn float<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(raw(deserializer)?.and_then(|v| match coerce_float(&v) {
            Some(n) => Some(n),
            None => rejected(&v, "float"),
        }))
    }

    /// `true` (any case) enables the flag; every other value disables it.
    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match raw(deserializer)? {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        })
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "ragbridge", "ragbridge")
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".ragbridge").join("config.toml")
}

/// Config keys holding free text. Environment values for these are taken verbatim so
/// that `AI_MODEL_VERSION=002` stays `"002"` instead of becoming the integer `2`.
const TEXT_KEYS: &[&str] = &[
    "orchestration.endpoint",
    "orchestration.repository_id",
    "orchestration.system_prompt",
    "orchestration.model_name",
    "orchestration.model_version",
    "transport.base_url",
    "transport.resource_group",
    "transport.api_key_env",
    "gateway.host",
    "gateway.service_name",
];

fn is_text_key(key: &str) -> bool {
    TEXT_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Legacy variable names mapped onto their nested config keys.
fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        LEGACY_ENV_VARS
            .iter()
            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
            .map(|(_, path)| (*path).into())
    })
}

fn prefixed_env() -> Env {
    Env::prefixed("RAGBRIDGE_").split("__")
}

/// Unparsed string values for the text keys an environment source sets.
fn text_layer(env: &Env) -> Figment {
    env.iter()
        .filter(|(key, _)| is_text_key(key.as_str()))
        .fold(Figment::new(), |layer, (key, value)| {
            layer.merge(Serialized::default(key.as_str(), value))
        })
}

/// Merge the legacy and `RAGBRIDGE_` environment sources, prefixed winning.
fn merge_env(figment: Figment) -> Figment {
    let legacy = legacy_env();
    let prefixed = prefixed_env();
    figment
        .merge(legacy.clone().filter(|key| !is_text_key(key.as_str())))
        .merge(text_layer(&legacy))
        .merge(prefixed.clone().filter(|key| !is_text_key(key.as_str())))
        .merge(text_layer(&prefixed))
}

/// Load configuration with layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `RAGBRIDGE_`, sections split by `__`)
/// 3. Legacy environment variables (`AI_MAX_CHUNK_COUNT`, `AI_MODEL_NAME`, ...)
/// 4. Workspace-local config (`.ragbridge/config.toml`)
/// 5. User config (`<config dir>/ragbridge/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&BridgeConfig>,
) -> Result<BridgeConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(BridgeConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    figment = merge_env(figment);

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(|e| ConfigError::from(Box::new(e)))
}

/// Load configuration from one explicit TOML file on top of the defaults and environment.
pub fn load_config_file(path: &Path) -> Result<BridgeConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    merge_env(Figment::from(Serialized::defaults(BridgeConfig::default())).merge(Toml::file(path)))
        .extract()
        .map_err(|e| ConfigError::from(Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        let orch = &config.orchestration;
        assert_eq!(orch.endpoint(), DEFAULT_ENDPOINT_PATH);
        assert_eq!(orch.fallback_repository_id(), FALLBACK_REPOSITORY_ID);
        assert_eq!(orch.max_chunk_count(), 6);
        assert_eq!(orch.history_max_turns(), 0);
        assert_eq!(orch.model_name(), "gemini-2.0-flash-lite");
        assert_eq!(orch.model_version(), "001");
        assert_eq!(orch.max_output_tokens(), 1024);
        assert!((orch.temperature() - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.transport.resource_group, "default");
        assert_eq!(config.transport.timeout_secs(), 60);
        assert!(!config.chat.force_local_fallback);
        assert_eq!(config.gateway.port, 8080);
    }

    #[test]
    fn test_empty_strings_use_defaults() {
        let orch = OrchestrationSettings {
            repository_id: Some(String::new()),
            model_name: Some(String::new()),
            system_prompt: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(orch.fallback_repository_id(), FALLBACK_REPOSITORY_ID);
        assert_eq!(orch.model_name(), DEFAULT_MODEL_NAME);
        assert_eq!(orch.system_prompt(), DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = BridgeConfig::default();
        config.orchestration.max_chunk_count = Some(10);
        config.orchestration.model_name = Some("gpt-4o".into());
        let toml_str = toml::to_string(&config).unwrap();
        let restored: BridgeConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(restored.orchestration, config.orchestration);
        assert_eq!(restored.gateway.port, config.gateway.port);
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let config: BridgeConfig = toml::from_str(
            r#"
[orchestration]
max_chunk_count = "12"
temperature = "0.3"
max_output_tokens = 2048
history_max_turns = "3"
"#,
        )
        .unwrap();
        assert_eq!(config.orchestration.max_chunk_count(), 12);
        assert!((config.orchestration.temperature() - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.orchestration.max_output_tokens(), 2048);
        assert_eq!(config.orchestration.history_max_turns(), 3);
    }

    #[test]
    fn test_non_numeric_overrides_fall_back_to_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
[orchestration]
max_chunk_count = "lots"
temperature = "warm"
max_output_tokens = -5
"#,
        )
        .unwrap();
        assert_eq!(config.orchestration.max_chunk_count, None);
        assert_eq!(config.orchestration.max_chunk_count(), 6);
        assert!((config.orchestration.temperature() - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.orchestration.max_output_tokens(), 1024);
    }

    #[test]
    fn test_force_local_fallback_is_case_insensitive() {
        let config: BridgeConfig =
            toml::from_str("[chat]\nforce_local_fallback = \"TRUE\"\n").unwrap();
        assert!(config.chat.force_local_fallback);
        let config: BridgeConfig =
            toml::from_str("[chat]\nforce_local_fallback = \"yes\"\n").unwrap();
        assert!(!config.chat.force_local_fallback);
        let config: BridgeConfig = toml::from_str("[chat]\nforce_local_fallback = true\n").unwrap();
        assert!(config.chat.force_local_fallback);
    }

    #[test]
    fn test_load_config_with_overrides() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let mut overrides = BridgeConfig::default();
            overrides.orchestration.model_name = Some("claude-sonnet".to_string());
            overrides.gateway.port = 9090;

            let config = load_config(None, Some(&overrides)).unwrap();
            assert_eq!(config.orchestration.model_name(), "claude-sonnet");
            assert_eq!(config.gateway.port, 9090);
            Ok(())
        });
    }

    #[test]
    fn test_load_config_from_workspace() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_dir(".ragbridge")?;
            jail.create_file(
                ".ragbridge/config.toml",
                r#"
[orchestration]
repository_id = "repo-from-workspace"
max_chunk_count = 4
system_prompt = "Answer like a librarian."

[transport]
base_url = "https://proxy.example.com"
resource_group = "rag"

[gateway]
port = 4004
"#,
            )?;

            let config = load_config(Some(jail.directory()), None).unwrap();
            assert_eq!(
                config.orchestration.fallback_repository_id(),
                "repo-from-workspace"
            );
            assert_eq!(config.orchestration.max_chunk_count(), 4);
            assert_eq!(config.orchestration.system_prompt(), "Answer like a librarian.");
            assert_eq!(
                config.transport.base_url.as_deref(),
                Some("https://proxy.example.com")
            );
            assert_eq!(config.transport.resource_group, "rag");
            assert_eq!(config.gateway.port, 4004);
            assert_eq!(config.gateway.host, "127.0.0.1");
            Ok(())
        });
    }

    #[test]
    fn test_load_config_file_missing() {
        let err = load_config_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_load_config_file_explicit() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("bridge.toml", "[orchestration]\nmodel_version = \"002\"\n")?;
            let config = load_config_file(Path::new("bridge.toml")).unwrap();
            assert_eq!(config.orchestration.model_version(), "002");
            Ok(())
        });
    }

    #[test]
    fn test_validate_defaults_warn_about_missing_pieces() {
        let warnings = BridgeConfig::default().validate();
        assert!(warnings.iter().any(|w| w.contains("repository_id")));
        assert!(warnings.iter().any(|w| w.contains("base_url")));
    }

    #[test]
    fn test_validate_bad_temperature() {
        let mut config = BridgeConfig::default();
        config.orchestration.temperature = Some(3.5);
        config.orchestration.repository_id = Some("repo".into());
        config.transport.base_url = Some("https://proxy.example.com".into());
        let warnings = config.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("temperature"));
    }

    #[test]
    fn test_legacy_env_table_targets_known_sections() {
        for (_, path) in LEGACY_ENV_VARS {
            let section = path.split('.').next().unwrap();
            assert!(matches!(section, "orchestration" | "transport" | "chat"));
        }
    }

    #[test]
    fn test_legacy_env_vars_map_onto_settings() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("AI_CORE_VECTOR_REPOSITORY_ID", "repo-from-env");
            jail.set_env("AI_MAX_CHUNK_COUNT", "9");
            jail.set_env("AI_HISTORY_MAX_TURNS", "2");
            jail.set_env("AI_TEMPERATURE", "0.4");
            jail.set_env("AI_CORE_PROXY_BASE_URL", "https://proxy.example.com");
            jail.set_env("AI_RESOURCE_GROUP", "rag");
            jail.set_env("CHATBOT_FORCE_LOCAL_FALLBACK", "true");

            let config = load_config(None, None).unwrap();
            let orch = &config.orchestration;
            assert_eq!(orch.fallback_repository_id(), "repo-from-env");
            assert_eq!(orch.max_chunk_count(), 9);
            assert_eq!(orch.history_max_turns(), 2);
            assert!((orch.temperature() - 0.4).abs() < f64::EPSILON);
            assert_eq!(
                config.transport.base_url.as_deref(),
                Some("https://proxy.example.com")
            );
            assert_eq!(config.transport.resource_group, "rag");
            assert!(config.chat.force_local_fallback);
            Ok(())
        });
    }

    #[test]
    fn test_numeric_looking_text_env_values_stay_verbatim() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("bridge.toml", "")?;
            jail.set_env("AI_MODEL_VERSION", "002");
            jail.set_env("AI_CORE_VECTOR_REPOSITORY_ID", "12345");
            jail.set_env("AI_MODEL_NAME", "4");
            jail.set_env("AI_SYSTEM_PROMPT", "42");

            let config = load_config_file(Path::new("bridge.toml")).unwrap();
            let orch = &config.orchestration;
            assert_eq!(orch.model_version(), "002");
            assert_eq!(orch.fallback_repository_id(), "12345");
            assert_eq!(orch.model_name(), "4");
            assert_eq!(orch.system_prompt(), "42");

            let config = load_config(None, None).unwrap();
            assert_eq!(config.orchestration.model_version(), "002");
            Ok(())
        });
    }

    #[test]
    fn test_prefixed_env_splits_sections() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("RAGBRIDGE_GATEWAY__PORT", "9191");
            jail.set_env("RAGBRIDGE_GATEWAY__SERVICE_NAME", "2024");
            jail.set_env("RAGBRIDGE_TRANSPORT__TIMEOUT_SECS", "15");
            jail.set_env("RAGBRIDGE_ORCHESTRATION__MODEL_VERSION", "010");

            let config = load_config(None, None).unwrap();
            assert_eq!(config.gateway.port, 9191);
            assert_eq!(config.gateway.service_name, "2024");
            assert_eq!(config.transport.timeout_secs(), 15);
            assert_eq!(config.orchestration.model_version(), "010");
            Ok(())
        });
    }

    #[test]
    fn test_env_layer_priority() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_dir(".ragbridge")?;
            jail.create_file(
                ".ragbridge/config.toml",
                "[orchestration]\nmodel_name = \"from-file\"\nmax_chunk_count = 3\n",
            )?;
            jail.set_env("AI_MODEL_NAME", "from-legacy");
            jail.set_env("AI_MAX_CHUNK_COUNT", "4");
            jail.set_env("RAGBRIDGE_ORCHESTRATION__MAX_CHUNK_COUNT", "5");

            let workspace = jail.directory().to_path_buf();
            let config = load_config(Some(&workspace), None).unwrap();
            assert_eq!(config.orchestration.model_name(), "from-legacy");
            assert_eq!(config.orchestration.max_chunk_count(), 5);

            jail.set_env("RAGBRIDGE_ORCHESTRATION__MODEL_NAME", "from-prefixed");
            let config = load_config(Some(&workspace), None).unwrap();
            assert_eq!(config.orchestration.model_name(), "from-prefixed");

            let mut overrides = BridgeConfig::default();
            overrides.orchestration.model_name = Some("from-override".into());
            let config = load_config(Some(&workspace), Some(&overrides)).unwrap();
            assert_eq!(config.orchestration.model_name(), "from-override");
            Ok(())
        });
    }

    #[test]
    fn test_unparsable_env_numerics_fall_back_to_defaults() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("AI_MAX_CHUNK_COUNT", "lots");
            jail.set_env("AI_TEMPERATURE", "warm");
            jail.set_env("AI_MAX_OUTPUT_TOKENS", "-5");
            jail.set_env("CHATBOT_FORCE_LOCAL_FALLBACK", "yes");

            let config = load_config(None, None).unwrap();
            assert_eq!(config.orchestration.max_chunk_count(), 6);
            assert!((config.orchestration.temperature() - 0.1).abs() < f64::EPSILON);
            assert_eq!(config.orchestration.max_output_tokens(), 1024);
            assert!(!config.chat.force_local_fallback);
            Ok(())
        });
    }
}
