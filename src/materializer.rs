//! Applies an accepted batch of generated files to the template's source
//! tree. One unsafe path skips that entry, never the batch; checkpoint
//! failures degrade to warnings; any successful write invalidates the
//! analysis cache.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::analyzer::AnalysisCache;
use crate::checkpoint::Checkpoint;
use crate::orchestrator::GeneratedFile;
use crate::paths::safe_join;

#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    pub path: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

pub struct Materializer {
    source_root: PathBuf,
    checkpoint: Box<dyn Checkpoint>,
    cache: Arc<AnalysisCache>,
}

impl Materializer {
    pub fn new(
        source_root: PathBuf,
        checkpoint: Box<dyn Checkpoint>,
        cache: Arc<AnalysisCache>,
    ) -> Self {
        Self {
            source_root,
            checkpoint,
            cache,
        }
    }

    /// Write every file in the batch, last write wins for duplicate paths.
    /// Returns a per-file status list; partial application is detectable
    /// there and is the accepted consistency model.
    pub async fn apply(&self, files: &[GeneratedFile]) -> Vec<ApplyOutcome> {
        let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();

        match self.checkpoint.before_apply(&paths) {
            Ok(Some(token)) => info!(%token, "pre-apply checkpoint created"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "pre-apply checkpoint failed, continuing"),
        }

        let mut outcomes = Vec::with_capacity(files.len());
        let mut written = 0usize;

        for file in files {
            let resolved = match safe_join(&self.source_root, &file.path) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(path = %file.path, error = %e, "skipping unsafe path");
                    outcomes.push(ApplyOutcome {
                        path: file.path.clone(),
                        status: "skipped (unsafe)".to_string(),
                        size: None,
                    });
                    continue;
                }
            };

            if let Some(parent) = resolved.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!(path = %file.path, error = %e, "failed to create parent directory");
                    outcomes.push(ApplyOutcome {
                        path: file.path.clone(),
                        status: "failed".to_string(),
                        size: None,
                    });
                    continue;
                }
            }

            match tokio::fs::write(&resolved, &file.content).await {
                Ok(()) => {
                    info!(path = %file.path, bytes = file.content.len(), "file written");
                    written += 1;
                    outcomes.push(ApplyOutcome {
                        path: file.path.clone(),
                        status: "written".to_string(),
                        size: Some(file.content.len()),
                    });
                }
                Err(e) => {
                    warn!(path = %file.path, error = %e, "write failed");
                    outcomes.push(ApplyOutcome {
                        path: file.path.clone(),
                        status: "failed".to_string(),
                        size: None,
                    });
                }
            }
        }

        if written > 0 {
            match self.checkpoint.after_apply(&paths) {
                Ok(Some(token)) => info!(%token, "post-apply checkpoint created"),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "post-apply checkpoint failed"),
            }
            self.cache.invalidate().await;
        }

        outcomes
    }
}
