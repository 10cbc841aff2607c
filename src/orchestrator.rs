//! The generation pipeline: decide between a single-file quick modify and a
//! plan/execute run, drive the provider, and aggregate validated results.
//!
//! One request is processed start to finish with no internal parallelism:
//! later tasks' prompts may assume earlier files conceptually exist, and
//! most LLM services rate-limit per account.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::analyzer::{AnalysisCache, ProjectAnalysis};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::extract::extract_json;
use crate::paths::safe_join;
use crate::prompts;
use crate::providers::{self, CodeProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Create,
    Modify,
}

/// One unit of planned work: create or modify one file.
#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub path: String,
    pub action: TaskAction,
    pub instruction: String,
}

#[derive(Debug, Deserialize)]
struct Plan {
    plan: Vec<Task>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct ExecutionReply {
    files: Vec<GeneratedFile>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub files: Vec<GeneratedFile>,
    pub description: String,
    pub provider: String,
    pub model: String,
    pub usage: Value,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub context: String,
    /// Per-request provider override. Threaded explicitly; process
    /// configuration is never mutated.
    pub provider: Option<String>,
    pub file_to_modify: Option<String>,
}

pub struct Pipeline {
    config: Arc<AppConfig>,
    cache: Arc<AnalysisCache>,
}

impl Pipeline {
    pub fn new(config: Arc<AppConfig>, cache: Arc<AnalysisCache>) -> Self {
        Self { config, cache }
    }

    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerationResponse, AppError> {
        let provider_id = request
            .provider
            .clone()
            .unwrap_or_else(|| self.config.default_provider.clone())
            .to_lowercase();
        let provider_config = self.config.provider_config(&provider_id)?;
        let provider = providers::create_provider(&provider_id, provider_config)?;

        self.run(request, provider_id, provider.as_ref()).await
    }

    /// Entry point with an explicit adapter, used directly by tests.
    pub async fn run(
        &self,
        request: GenerateRequest,
        provider_id: String,
        provider: &dyn CodeProvider,
    ) -> Result<GenerationResponse, AppError> {
        let analysis = self.cache.get_or_analyze(&self.config.source_root()).await;
        let system_context = prompts::system_context(&analysis);

        info!(provider = %provider_id, prompt = %truncate(&request.prompt, 120), "generation started");

        let response = match &request.file_to_modify {
            Some(path) => {
                self.quick_modify(&request, path, &system_context, provider)
                    .await?
            }
            None => {
                self.plan_and_execute(&request, &analysis, &system_context, provider)
                    .await?
            }
        };

        info!(
            provider = %provider_id,
            files = response.files.len(),
            "generation finished"
        );

        Ok(GenerationResponse {
            provider: provider_id,
            ..response
        })
    }

    /// Single-file flow: one synthesized modify task, one provider call.
    async fn quick_modify(
        &self,
        request: &GenerateRequest,
        path: &str,
        system_context: &str,
        provider: &dyn CodeProvider,
    ) -> Result<GenerationResponse, AppError> {
        let resolved = safe_join(&self.config.source_root(), path)?;
        let original = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|_| AppError::NotFound(format!("file to modify not found: {path}")))?;

        let prompt = prompts::execute_modify(path, &request.prompt, &original);
        let result = provider.generate(&prompt, system_context).await?;
        let reply = parse_execution_reply(&result.content)?;

        if reply.files.is_empty() {
            return Err(AppError::EmptyResult(
                "the model returned no files for this modification".to_string(),
            ));
        }

        Ok(GenerationResponse {
            files: reply.files,
            description: reply.description,
            provider: String::new(),
            model: result.model,
            usage: result.usage,
        })
    }

    /// Architect call, then one developer call per task in strict plan
    /// order. Individual task failures are logged and skipped; the request
    /// fails only if the aggregate file list ends up empty.
    async fn plan_and_execute(
        &self,
        request: &GenerateRequest,
        analysis: &ProjectAnalysis,
        system_context: &str,
        provider: &dyn CodeProvider,
    ) -> Result<GenerationResponse, AppError> {
        let planning_prompt = prompts::planning(analysis, &request.prompt, &request.context);
        let plan_result = provider.generate(&planning_prompt, system_context).await?;
        let plan_value = extract_json(&plan_result.content)?;
        let plan: Plan =
            serde_json::from_value(plan_value).map_err(|e| AppError::MalformedResponse {
                reason: format!("plan does not match the expected shape: {e}"),
                excerpt: truncate(&plan_result.content, 500),
            })?;

        if plan.plan.is_empty() {
            return Err(AppError::EmptyResult(
                "the planner produced an empty plan; try rephrasing the request".to_string(),
            ));
        }

        info!(tasks = plan.plan.len(), description = %plan.description, "plan accepted");

        let mut files = Vec::new();
        let mut model = plan_result.model;
        let mut usage = plan_result.usage;

        for (index, task) in plan.plan.iter().enumerate() {
            let prompt = match self.build_task_prompt(task, analysis).await {
                Ok(prompt) => prompt,
                Err(reason) => {
                    warn!(task = index, path = %task.path, %reason, "skipping task");
                    continue;
                }
            };

            let result = match provider.generate(&prompt, system_context).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(task = index, path = %task.path, error = %e, "task call failed, skipping");
                    continue;
                }
            };

            match parse_execution_reply(&result.content) {
                Ok(reply) => {
                    // Encounter order is the response order; duplicates are
                    // kept and resolved last-write-wins at materialization.
                    files.extend(reply.files);
                    model = result.model;
                    usage = result.usage;
                }
                Err(e) => {
                    warn!(task = index, path = %task.path, error = %e, "task reply unusable, skipping");
                }
            }
        }

        if files.is_empty() {
            return Err(AppError::EmptyResult(
                "no task produced any files; try rephrasing the request".to_string(),
            ));
        }

        Ok(GenerationResponse {
            files,
            description: plan.description,
            provider: String::new(),
            model,
            usage,
        })
    }

    /// Render the developer instruction for one task. Modify targets are
    /// re-read here, immediately before the call, so the inlined content is
    /// never stale. A missing or unsafe target is a per-task skip reason,
    /// not a request failure.
    async fn build_task_prompt(
        &self,
        task: &Task,
        analysis: &ProjectAnalysis,
    ) -> Result<String, String> {
        match task.action {
            TaskAction::Create => Ok(prompts::execute_create(
                &task.path,
                &task.instruction,
                analysis,
            )),
            TaskAction::Modify => {
                let resolved = safe_join(&self.config.source_root(), &task.path)
                    .map_err(|e| e.to_string())?;
                let original = tokio::fs::read_to_string(&resolved)
                    .await
                    .map_err(|_| format!("modify target not found: {}", task.path))?;
                Ok(prompts::execute_modify(
                    &task.path,
                    &task.instruction,
                    &original,
                ))
            }
        }
    }
}

fn parse_execution_reply(raw: &str) -> Result<ExecutionReply, AppError> {
    let value = extract_json(raw)?;
    serde_json::from_value(value).map_err(|e| AppError::MalformedResponse {
        reason: format!("reply does not match the expected files shape: {e}"),
        excerpt: truncate(raw, 500),
    })
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_action_deserializes_lowercase() {
        let task: Task = serde_json::from_str(
            r#"{"path":"a.tsx","action":"create","instruction":"build it"}"#,
        )
        .unwrap();
        assert_eq!(task.action, TaskAction::Create);
    }

    #[test]
    fn execution_reply_requires_files_key() {
        assert!(parse_execution_reply(r#"{"description":"no files key"}"#).is_err());
        let reply =
            parse_execution_reply(r#"{"files":[{"path":"a.tsx","content":"x"}],"description":"d"}"#)
                .unwrap();
        assert_eq!(reply.files.len(), 1);
    }
}
