//! Orchestration request payload.
//!
//! The request combines three modules: document grounding against one vector
//! repository, a prompt template (system, history window, grounded question)
//! and the LLM parameters. Template placeholders are substituted by the
//! orchestration service at execution time, never here.

use crate::adapter::history;
use crate::config::OrchestrationSettings;
use crate::types::{ChatTurn, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Template variable carrying the user question into grounding and the prompt.
pub const QUESTION_PARAM: &str = "grounding_input_variable_1";
/// Template variable the grounding module fills with retrieved context.
pub const GROUNDING_OUTPUT_PARAM: &str = "grounding_output_variable";
pub const GROUNDING_MODULE_TYPE: &str = "document_grounding_service";
pub const FILTER_ID: &str = "filter1";
pub const DATA_REPOSITORY_TYPE: &str = "vector";

/// Text of the trailing user message. Both placeholders are resolved upstream.
pub const USER_TEMPLATE: &str =
    "UserQuestion: {{?grounding_input_variable_1}}, Context: {{?grounding_output_variable}}";

/// The full request body posted to the orchestration endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    pub orchestration_config: PipelineConfig,
    pub input_params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub module_configurations: ModuleConfigurations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfigurations {
    pub grounding_module_config: GroundingModule,
    pub templating_module_config: TemplatingModule,
    pub llm_module_config: LlmModule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingModule {
    #[serde(rename = "type")]
    pub kind: String,
    pub config: GroundingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingConfig {
    pub filters: Vec<GroundingFilter>,
    pub input_params: Vec<String>,
    pub output_param: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingFilter {
    pub id: String,
    pub search_config: SearchConfig,
    pub data_repositories: Vec<String>,
    pub data_repository_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    pub max_chunk_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatingModule {
    pub template: Vec<TemplateMessage>,
    pub defaults: BTreeMap<String, String>,
}

/// One prompt message in the orchestration content shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateMessage {
    pub role: Role,
    pub content: Vec<TemplateContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TemplateContent {
    Text { text: String },
}

impl TemplateMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![TemplateContent::Text { text: text.into() }],
        }
    }

    /// Concatenated text of all content parts.
    pub fn as_text(&self) -> String {
        self.content
            .iter()
            .map(|TemplateContent::Text { text }| text.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

impl From<&ChatTurn> for TemplateMessage {
    fn from(turn: &ChatTurn) -> Self {
        TemplateMessage::text(turn.role, turn.content.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmModule {
    pub model_name: String,
    pub model_params: ModelParams,
    pub model_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub max_output_tokens: u32,
    pub temperature: f64,
}

/// Resolve the repository to ground against: the caller's id, then the
/// configured fallback, then the development constant.
pub fn resolve_repository_id<'a>(
    repository_id: Option<&'a str>,
    settings: &'a OrchestrationSettings,
) -> &'a str {
    repository_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| settings.fallback_repository_id())
}

/// Build the orchestration request for one question.
///
/// Pure: no I/O and no failure modes. History is injected only when
/// `history_max_turns` is positive.
pub fn build(
    message: &str,
    repository_id: Option<&str>,
    history: &[ChatTurn],
    settings: &OrchestrationSettings,
) -> OrchestrationRequest {
    let repo_id = resolve_repository_id(repository_id, settings).to_string();
    let history_window = history::window(history, settings.history_max_turns());

    debug!(
        repository_id = %repo_id,
        history_turns = history_window.len(),
        max_chunk_count = settings.max_chunk_count(),
        "Building orchestration payload"
    );

    let mut template = Vec::with_capacity(history_window.len() + 2);
    template.push(TemplateMessage::text(Role::System, settings.system_prompt()));
    template.extend(history_window.iter().map(TemplateMessage::from));
    template.push(TemplateMessage::text(Role::User, USER_TEMPLATE));

    let grounding = GroundingModule {
        kind: GROUNDING_MODULE_TYPE.to_string(),
        config: GroundingConfig {
            filters: vec![GroundingFilter {
                id: FILTER_ID.to_string(),
                search_config: SearchConfig {
                    max_chunk_count: settings.max_chunk_count(),
                },
                data_repositories: vec![repo_id],
                data_repository_type: DATA_REPOSITORY_TYPE.to_string(),
            }],
            input_params: vec![QUESTION_PARAM.to_string()],
            output_param: GROUNDING_OUTPUT_PARAM.to_string(),
        },
    };

    let llm = LlmModule {
        model_name: settings.model_name().to_string(),
        model_params: ModelParams {
            max_output_tokens: settings.max_output_tokens(),
            temperature: settings.temperature(),
        },
        model_version: settings.model_version().to_string(),
    };

    OrchestrationRequest {
        orchestration_config: PipelineConfig {
            module_configurations: ModuleConfigurations {
                grounding_module_config: grounding,
                templating_module_config: TemplatingModule {
                    template,
                    defaults: BTreeMap::from([(QUESTION_PARAM.to_string(), String::new())]),
                },
                llm_module_config: llm,
            },
        },
        input_params: BTreeMap::from([(QUESTION_PARAM.to_string(), message.to_string())]),
    }
}

impl OrchestrationRequest {
    /// The repository filter. `build` always emits one; deserialized requests may not.
    pub fn grounding_filter(&self) -> Option<&GroundingFilter> {
        self.orchestration_config
            .module_configurations
            .grounding_module_config
            .config
            .filters
            .first()
    }

    pub fn template(&self) -> &[TemplateMessage] {
        &self
            .orchestration_config
            .module_configurations
            .templating_module_config
            .template
    }

    pub fn llm(&self) -> &LlmModule {
        &self.orchestration_config.module_configurations.llm_module_config
    }

    pub fn question(&self) -> Option<&str> {
        self.input_params.get(QUESTION_PARAM).map(String::as_str)
    }
}
