//! Structural summary of the template's source tree, used to enrich
//! prompts with existing-code context.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use walkdir::WalkDir;

const SOURCE_EXTENSIONS: [&str; 4] = ["js", "jsx", "ts", "tsx"];
pub const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectAnalysis {
    pub components: Vec<String>,
    pub pages: Vec<String>,
    pub services: Vec<String>,
    pub technologies: Vec<String>,
    pub imports: Vec<String>,
    pub summary: String,
}

/// Walk `source_root` and classify every recognized source file by its
/// top-level directory. A missing root yields an empty analysis rather
/// than an error. Deterministic given the same file set: entries are
/// visited in sorted order and technology names come from an ordered set.
pub fn analyze(source_root: &Path) -> ProjectAnalysis {
    let mut components = Vec::new();
    let mut pages = Vec::new();
    let mut services = Vec::new();
    let mut technologies: BTreeSet<String> = ["React", "Tailwind CSS"]
        .into_iter()
        .map(String::from)
        .collect();
    let mut imports: BTreeSet<String> = BTreeSet::new();

    let walker = WalkDir::new(source_root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok());

    for entry in walker {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let recognized = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SOURCE_EXTENSIONS.contains(&ext))
            .unwrap_or(false);
        if !recognized {
            continue;
        }

        let relative = match path.strip_prefix(source_root) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => continue,
        };

        match relative.split('/').next() {
            Some("components") => components.push(relative.clone()),
            Some("pages") => pages.push(relative.clone()),
            Some("services") => services.push(relative.clone()),
            _ => {}
        }

        if let Ok(content) = std::fs::read_to_string(path) {
            detect_technologies(&content, &mut technologies);
            collect_imports(&content, &mut imports);
        }
    }

    let technologies: Vec<String> = technologies.into_iter().collect();
    let summary = render_summary(&components, &pages, &services, &technologies);

    ProjectAnalysis {
        components,
        pages,
        services,
        technologies,
        imports: imports.into_iter().collect(),
        summary,
    }
}

fn detect_technologies(content: &str, technologies: &mut BTreeSet<String>) {
    if content.contains("react-router") {
        technologies.insert("React Router".to_string());
    }
    if content.contains("axios") {
        technologies.insert("Axios".to_string());
    }
    if content.contains("useState") || content.contains("useEffect") {
        technologies.insert("React Hooks".to_string());
    }
    if content.contains("recharts") {
        technologies.insert("Recharts".to_string());
    }
    if content.contains("lucide-react") {
        technologies.insert("Lucide Icons".to_string());
    }
    if content.contains("interface ") || content.contains("type ") {
        technologies.insert("TypeScript".to_string());
    }
}

fn collect_imports(content: &str, imports: &mut BTreeSet<String>) {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static IMPORT_FROM: Lazy<Regex> =
        Lazy::new(|| Regex::new(r#"import .+ from ['"]([^'"]+)['"]"#).unwrap());

    for caps in IMPORT_FROM.captures_iter(content) {
        imports.insert(caps[1].to_string());
    }
}

fn render_summary(
    components: &[String],
    pages: &[String],
    services: &[String],
    technologies: &[String],
) -> String {
    let mut parts = vec![format!(
        "The project currently has {} components, {} pages and {} services.",
        components.len(),
        pages.len(),
        services.len()
    )];

    if !technologies.is_empty() {
        parts.push(format!("Technologies in use: {}.", technologies.join(", ")));
    }

    if !components.is_empty() {
        let shown: Vec<&str> = components.iter().take(5).map(String::as_str).collect();
        let ellipsis = if components.len() > 5 { "..." } else { "" };
        parts.push(format!("Existing components: {}{}.", shown.join(", "), ellipsis));
    }

    parts.join(" ")
}

/// Memoized analysis with a wall-clock TTL.
///
/// The materializer and the delete handler call [`AnalysisCache::invalidate`]
/// after any accepted write, which forces the next read to recompute
/// regardless of age. Shared read access is uncoordinated by design: the
/// value is replaced wholesale, never partially mutated.
pub struct AnalysisCache {
    ttl: Duration,
    slot: RwLock<Option<(ProjectAnalysis, Instant)>>,
}

impl AnalysisCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub async fn get_or_analyze(&self, source_root: &Path) -> ProjectAnalysis {
        {
            let slot = self.slot.read().await;
            if let Some((analysis, at)) = slot.as_ref() {
                if at.elapsed() < self.ttl {
                    return analysis.clone();
                }
            }
        }

        let analysis = analyze(source_root);
        let mut slot = self.slot.write().await;
        *slot = Some((analysis.clone(), Instant::now()));
        analysis
    }

    pub async fn invalidate(&self) {
        let mut slot = self.slot.write().await;
        *slot = None;
    }
}
