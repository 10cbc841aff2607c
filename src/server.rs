//! HTTP surface of the generation service. Thin glue: every handler
//! validates input, delegates to the pipeline/materializer/analyzer, and
//! shapes the JSON response.

use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::info;
use walkdir::WalkDir;

use crate::analyzer::{AnalysisCache, CACHE_TTL};
use crate::checkpoint;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::materializer::Materializer;
use crate::orchestrator::{GenerateRequest, GeneratedFile, Pipeline};
use crate::paths::safe_join;
use crate::providers;

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<AnalysisCache>,
    pub pipeline: Pipeline,
    pub materializer: Materializer,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let cache = Arc::new(AnalysisCache::new(CACHE_TTL));
        let pipeline = Pipeline::new(config.clone(), cache.clone());
        let materializer = Materializer::new(
            config.source_root(),
            checkpoint::for_strategy(
                config.checkpoint_strategy,
                &config.template_path,
                &config.source_root(),
            ),
            cache.clone(),
        );
        Self {
            config,
            cache,
            pipeline,
            materializer,
        }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .route("/apply", post(apply))
        .route("/analyze", get(analyze))
        .route("/providers", get(list_providers))
        .route("/status", get(status))
        .route("/file/{*path}", get(read_file).delete(delete_file))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", state.config.port);
    let router = build_router(state.clone());

    info!(
        addr = %addr,
        template = %state.config.template_path.display(),
        provider = %state.config.default_provider,
        "buildsmith backend listening"
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    prompt: Option<String>,
    #[serde(default)]
    context: String,
    provider: Option<String>,
    file_to_modify: Option<String>,
}

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateBody>,
) -> Result<Json<Value>, AppError> {
    let prompt = body
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("prompt is required".to_string()))?;

    let response = state
        .pipeline
        .generate(GenerateRequest {
            prompt,
            context: body.context,
            provider: body.provider,
            file_to_modify: body.file_to_modify,
        })
        .await?;

    let analysis = state
        .cache
        .get_or_analyze(&state.config.source_root())
        .await;

    Ok(Json(json!({
        "success": true,
        "files": response.files,
        "description": response.description,
        "provider": response.provider,
        "model": response.model,
        "usage": response.usage,
        "projectContext": {
            "componentsCount": analysis.components.len(),
            "pagesCount": analysis.pages.len(),
            "technologies": analysis.technologies,
        },
    })))
}

#[derive(Debug, Deserialize)]
struct ApplyBody {
    files: Option<Vec<GeneratedFile>>,
}

async fn apply(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ApplyBody>,
) -> Result<Json<Value>, AppError> {
    let files = body
        .files
        .ok_or_else(|| AppError::BadRequest("files array is required".to_string()))?;

    let results = state.materializer.apply(&files).await;

    Ok(Json(json!({
        "success": true,
        "message": "files applied",
        "results": results,
    })))
}

async fn analyze(State(state): State<Arc<AppState>>) -> Json<Value> {
    let analysis = state
        .cache
        .get_or_analyze(&state.config.source_root())
        .await;

    Json(json!({
        "success": true,
        "components": analysis.components,
        "pages": analysis.pages,
        "services": analysis.services,
        "technologies": analysis.technologies,
        "imports": analysis.imports,
        "summary": analysis.summary,
    }))
}

async fn list_providers(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let current_id = &state.config.default_provider;
    let current_config = state.config.provider_config(current_id)?;

    Ok(Json(json!({
        "success": true,
        "providers": providers::catalog(),
        "current": {
            "provider": current_id,
            "model": current_config.model,
            "configured": current_config.api_key.is_some() || current_config.base_url.is_some(),
        },
    })))
}

async fn status(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let source_root = state.config.source_root();

    let mut files: Vec<String> = WalkDir::new(&source_root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .strip_prefix(&source_root)
                .ok()
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();

    let provider_config = state.config.provider_config(&state.config.default_provider)?;

    Ok(Json(json!({
        "success": true,
        "templatePath": state.config.template_path.display().to_string(),
        "fileCount": files.len(),
        "files": files,
        "aiProvider": {
            "name": state.config.default_provider,
            "model": provider_config.model,
            "configured": provider_config.api_key.is_some() || provider_config.base_url.is_some(),
        },
    })))
}

async fn read_file(
    State(state): State<Arc<AppState>>,
    UrlPath(path): UrlPath<String>,
) -> Result<Json<Value>, AppError> {
    let resolved = safe_join(&state.config.source_root(), &path)?;
    let content = tokio::fs::read_to_string(&resolved)
        .await
        .map_err(|_| AppError::NotFound(format!("file not found: {path}")))?;

    Ok(Json(json!({
        "success": true,
        "path": path,
        "content": content,
    })))
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    UrlPath(path): UrlPath<String>,
) -> Result<Json<Value>, AppError> {
    let resolved = safe_join(&state.config.source_root(), &path)?;
    tokio::fs::remove_file(&resolved)
        .await
        .map_err(|_| AppError::NotFound(format!("file not found: {path}")))?;

    state.cache.invalidate().await;
    info!(%path, "file deleted");

    Ok(Json(json!({
        "success": true,
        "message": "file deleted",
    })))
}
