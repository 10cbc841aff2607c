//! Pluggable pre-write safety for the materializer.
//!
//! Two real strategies: whole-tree git commits and per-file `.backup`
//! copies. Checkpoint failures are reported to the caller, which logs them
//! as warnings; they never abort a write batch.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

use crate::config::CheckpointStrategy;
use crate::paths::safe_join;

pub trait Checkpoint: Send + Sync {
    /// Snapshot the pre-write state. `paths` are the relative paths about
    /// to be touched. Returns an identifying token when the strategy
    /// produces one.
    fn before_apply(&self, paths: &[String]) -> Result<Option<String>>;

    /// Record the post-write state. Strategies whose snapshot would
    /// clobber the pre-write one make this a no-op.
    fn after_apply(&self, paths: &[String]) -> Result<Option<String>>;

    /// Roll the tree back to a previously returned token.
    fn restore(&self, token: &str) -> Result<()>;
}

pub fn for_strategy(
    strategy: CheckpointStrategy,
    template_root: &Path,
    source_root: &Path,
) -> Box<dyn Checkpoint> {
    match strategy {
        CheckpointStrategy::Git => Box::new(GitCheckpoint::new(template_root.to_path_buf())),
        CheckpointStrategy::Copy => Box::new(BackupCopy::new(source_root.to_path_buf())),
        CheckpointStrategy::None => Box::new(NoCheckpoint),
    }
}

/// Whole-tree commit in the template's repository. A template that is not
/// a git repository is a no-op, not an error.
pub struct GitCheckpoint {
    template_root: PathBuf,
}

impl GitCheckpoint {
    pub fn new(template_root: PathBuf) -> Self {
        Self { template_root }
    }

    fn commit_all(&self, label: &str) -> Result<Option<String>> {
        let repo = match git2::Repository::open(&self.template_root) {
            Ok(repo) => repo,
            Err(_) => {
                tracing::warn!(
                    path = %self.template_root.display(),
                    "template is not a git repository, skipping checkpoint"
                );
                return Ok(None);
            }
        };

        let mut index = repo.index().context("failed to open index")?;
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .context("failed to stage files")?;
        index.write().context("failed to write index")?;

        let tree_id = index.write_tree().context("failed to write tree")?;
        let tree = repo.find_tree(tree_id)?;
        let signature = git2::Signature::now("buildsmith", "buildsmith@localhost")?;

        let parent = repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();

        let oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &format!("buildsmith checkpoint: {label}"),
            &tree,
            &parents,
        )?;

        Ok(Some(oid.to_string()))
    }
}

impl Checkpoint for GitCheckpoint {
    fn before_apply(&self, _paths: &[String]) -> Result<Option<String>> {
        self.commit_all("pre-apply")
    }

    fn after_apply(&self, _paths: &[String]) -> Result<Option<String>> {
        self.commit_all("post-apply")
    }

    fn restore(&self, token: &str) -> Result<()> {
        let repo = git2::Repository::open(&self.template_root)?;
        let oid = git2::Oid::from_str(token)?;
        let commit = repo.find_commit(oid)?;
        repo.reset(commit.as_object(), git2::ResetType::Hard, None)
            .context("failed to reset to checkpoint")?;
        Ok(())
    }
}

/// Copy each file that is about to be overwritten to `<path>.backup`.
pub struct BackupCopy {
    source_root: PathBuf,
}

impl BackupCopy {
    pub fn new(source_root: PathBuf) -> Self {
        Self { source_root }
    }
}

impl Checkpoint for BackupCopy {
    fn before_apply(&self, paths: &[String]) -> Result<Option<String>> {
        let mut copied = 0usize;
        for relative in paths {
            // Generated paths are untrusted; a traversal entry must not
            // make the snapshot read or write outside the source root.
            let target = match safe_join(&self.source_root, relative) {
                Ok(target) => target,
                Err(_) => continue,
            };
            if target.is_file() {
                let backup = backup_path(&target);
                std::fs::copy(&target, &backup)
                    .with_context(|| format!("failed to back up {}", target.display()))?;
                copied += 1;
            }
        }
        if copied == 0 {
            Ok(None)
        } else {
            Ok(Some(format!("{copied} files backed up")))
        }
    }

    // A second snapshot here would overwrite the pre-write backups with
    // the content that was just written.
    fn after_apply(&self, _paths: &[String]) -> Result<Option<String>> {
        Ok(None)
    }

    fn restore(&self, _token: &str) -> Result<()> {
        for entry in WalkDir::new(&self.source_root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_file()
                && path.extension().and_then(|e| e.to_str()) == Some("backup")
            {
                let original = path.with_extension("");
                std::fs::copy(path, &original)
                    .with_context(|| format!("failed to restore {}", original.display()))?;
            }
        }
        Ok(())
    }
}

fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

pub struct NoCheckpoint;

impl Checkpoint for NoCheckpoint {
    fn before_apply(&self, _paths: &[String]) -> Result<Option<String>> {
        Ok(None)
    }

    fn after_apply(&self, _paths: &[String]) -> Result<Option<String>> {
        Ok(None)
    }

    fn restore(&self, _token: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn backup_copy_only_touches_existing_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("components")).unwrap();
        fs::write(src.join("components/Button.tsx"), "old").unwrap();

        let strategy = BackupCopy::new(src.clone());
        let token = strategy
            .before_apply(&[
                "components/Button.tsx".to_string(),
                "components/New.tsx".to_string(),
            ])
            .unwrap();

        assert!(token.is_some());
        assert_eq!(
            fs::read_to_string(src.join("components/Button.tsx.backup")).unwrap(),
            "old"
        );
        assert!(!src.join("components/New.tsx.backup").exists());
    }

    #[test]
    fn backup_copy_restore_puts_content_back() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.ts"), "old").unwrap();

        let strategy = BackupCopy::new(src.clone());
        strategy.before_apply(&["a.ts".to_string()]).unwrap();
        fs::write(src.join("a.ts"), "new").unwrap();
        strategy.restore("ignored").unwrap();

        assert_eq!(fs::read_to_string(src.join("a.ts")).unwrap(), "old");
    }

    #[test]
    fn backup_copy_post_apply_leaves_backups_alone() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.ts"), "old").unwrap();

        let strategy = BackupCopy::new(src.clone());
        let paths = vec!["a.ts".to_string()];
        strategy.before_apply(&paths).unwrap();
        fs::write(src.join("a.ts"), "new").unwrap();
        strategy.after_apply(&paths).unwrap();

        assert_eq!(fs::read_to_string(src.join("a.ts.backup")).unwrap(), "old");
        strategy.restore("ignored").unwrap();
        assert_eq!(fs::read_to_string(src.join("a.ts")).unwrap(), "old");
    }

    #[test]
    fn backup_copy_never_reads_outside_the_source_root() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(dir.path().join("outside.txt"), "secret").unwrap();

        let strategy = BackupCopy::new(src.clone());
        let token = strategy
            .before_apply(&["../outside.txt".to_string()])
            .unwrap();

        assert!(token.is_none());
        assert!(!dir.path().join("outside.txt.backup").exists());
    }

    #[test]
    fn git_checkpoint_outside_repo_is_noop() {
        let dir = TempDir::new().unwrap();
        let strategy = GitCheckpoint::new(dir.path().to_path_buf());
        let token = strategy.before_apply(&[]).unwrap();
        assert!(token.is_none());
    }

    #[test]
    fn git_checkpoint_commits_in_a_repo() {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let strategy = GitCheckpoint::new(dir.path().to_path_buf());
        let token = strategy.before_apply(&[]).unwrap();
        assert!(token.is_some());

        let repo = git2::Repository::open(dir.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert!(head.message().unwrap().contains("pre-apply"));
    }

    #[test]
    fn git_checkpoint_records_both_phases() {
        let dir = TempDir::new().unwrap();
        git2::Repository::init(dir.path()).unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();

        let strategy = GitCheckpoint::new(dir.path().to_path_buf());
        strategy.before_apply(&[]).unwrap();
        fs::write(dir.path().join("a.txt"), "changed").unwrap();
        strategy.after_apply(&[]).unwrap();

        let repo = git2::Repository::open(dir.path()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert!(head.message().unwrap().contains("post-apply"));
        assert_eq!(head.parent_count(), 1);
    }
}
