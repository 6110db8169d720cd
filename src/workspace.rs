// todo-plus/src/workspace.rs

use crate::item::TodoItem;
use crate::language::LanguageRegistry;
use crate::scanner::TodoScanner;
use crate::settings::Settings;
use crate::sidecar::ConfigResolver;
use anyhow::{Context, Result};
use globset::GlobSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One open project: settings, language table, sidecar resolver, and the
/// scan orchestration over the file tree.
pub struct Workspace {
    root: PathBuf,
    settings: Settings,
    languages: LanguageRegistry,
    resolver: ConfigResolver,
    exclude: GlobSet,
}

impl Workspace {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let settings = Settings::load(&root);
        let exclude = settings.exclude_set()?;
        let languages = LanguageRegistry::new(settings.languages.clone());
        let resolver = ConfigResolver::new(&root);
        Ok(Self {
            root,
            settings,
            languages,
            resolver,
            exclude,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Startup pass. Runs the sidecar purge when enabled in settings.
    pub async fn initialize(&self) -> Result<()> {
        if self.settings.purge_obsolete_on_start {
            info!(root = %self.root.display(), "purging obsolete sidecar records");
            self.resolver.purge().await?;
        }
        Ok(())
    }

    /// All files worth scanning: honors `.gitignore`, the settings excludes,
    /// and the supported-extension table.
    pub fn relevant_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        // `.gitignore` applies whether or not the root is a git repository.
        let walker = ignore::WalkBuilder::new(&self.root).require_git(false).build();
        for entry in walker.filter_map(|entry| entry.ok()) {
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.into_path();
            let rel = path.strip_prefix(&self.root).unwrap_or(&path);
            if self.exclude.is_match(rel) {
                continue;
            }
            if self.languages.is_file_supported(&path) {
                files.push(path);
            }
        }
        files
    }

    /// Scan one file and reconcile the result against its sidecar. `None`
    /// means the file type is unsupported and was skipped.
    pub async fn scan_file(&self, path: &Path) -> Result<Option<Vec<TodoItem>>> {
        let Some(language) = self.languages.get_language_info(path) else {
            debug!(path = %path.display(), "unsupported file type, skipped");
            return Ok(None);
        };
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let uri = path.to_string_lossy();
        let mut items = TodoScanner::scan_with_language(&uri, &text, &language)?;
        self.resolver.sync_todos(&mut items).await?;
        Ok(Some(items))
    }

    /// Scan every relevant file in the workspace.
    pub async fn scan_all(&self) -> Result<Vec<TodoItem>> {
        let mut all = Vec::new();
        for path in self.relevant_files() {
            if let Some(items) = self.scan_file(&path).await? {
                all.extend(items);
            }
        }
        info!(count = all.len(), "workspace scan complete");
        Ok(all)
    }

    /// Assign stable ids to every untracked annotation in one file, rewrite
    /// the source with the embedded `(id)` tokens, and persist the new
    /// records. Returns how many annotations became tracked.
    pub async fn track_file(&self, path: &Path) -> Result<usize> {
        let Some(language) = self.languages.get_language_info(path) else {
            return Ok(0);
        };
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read {}", path.display()))?;
        let uri = path.to_string_lossy();
        let mut items = TodoScanner::scan_with_language(&uri, &text, &language)?;

        // Rewrite bottom-up so earlier spans stay valid.
        let mut tracked = 0;
        let mut updated_text = text;
        for item in items.iter_mut().rev() {
            if item.id.is_none() {
                item.make_persistable(false);
                updated_text = item.apply_to(&updated_text, &language)?;
                tracked += 1;
            }
        }
        if tracked > 0 {
            tokio::fs::write(path, &updated_text)
                .await
                .with_context(|| format!("write {}", path.display()))?;
            self.resolver.sync_todos(&mut items).await?;
            info!(path = %path.display(), tracked, "annotations tracked");
        }
        Ok(tracked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn workspace_with(files: &[(&str, &str)]) -> (tempfile::TempDir, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, contents) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        let ws = Workspace::open(dir.path()).unwrap();
        (dir, ws)
    }

    #[tokio::test]
    async fn scan_all_collects_supported_files_only() {
        let (_dir, ws) = workspace_with(&[
            ("src/a.rs", "// TODO: in rust\n"),
            ("docs/b.md", "<!-- TODO: in markdown -->\n"),
            ("assets/c.bin", "TODO: not a source file\n"),
        ]);
        let items = ws.scan_all().await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn gitignored_files_are_skipped() {
        let (_dir, ws) = workspace_with(&[
            (".gitignore", "generated/\n"),
            ("generated/gen.rs", "// TODO: machine written\n"),
            ("main.rs", "// TODO: hand written\n"),
        ]);
        let items = ws.scan_all().await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].file_uri.ends_with("main.rs"));
    }

    #[tokio::test]
    async fn settings_excludes_are_applied() {
        let (_dir, ws) = workspace_with(&[
            (".todoplus.toml", "exclude = [\"vendor/**\"]\n"),
            ("vendor/dep.rs", "// TODO: vendored\n"),
            ("main.rs", "// TODO: ours\n"),
        ]);
        let items = ws.scan_all().await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn unsupported_file_scan_returns_none() {
        let (dir, ws) = workspace_with(&[("img.png", "TODO: binary-ish")]);
        assert!(ws.scan_file(&dir.path().join("img.png")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn track_file_embeds_ids_and_persists_records() {
        let (dir, ws) = workspace_with(&[(
            "main.rs",
            "// TODO: first\nfn main() {}\n// TODO: second\n",
        )]);
        let path = dir.path().join("main.rs");
        let tracked = ws.track_file(&path).await.unwrap();
        assert_eq!(tracked, 2);

        let rewritten = fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("// TODO("));
        assert!(!rewritten.contains("// TODO:"));

        // a fresh scan finds both ids and pulls their persisted timestamps
        let ws2 = Workspace::open(dir.path()).unwrap();
        let items = ws2.scan_all().await.unwrap();
        assert_eq!(items.len(), 2);
        for item in &items {
            assert!(item.id.is_some());
            assert!(item.is_synced());
        }

        // tracking again is a no-op
        assert_eq!(ws.track_file(&path).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn initialize_purges_when_enabled() {
        let (dir, ws) = workspace_with(&[(
            "todoPlus.json",
            r#"{"ghost.rs": {"abc123defg": {"created": 1, "updated": 1}}}"#,
        )]);
        ws.initialize().await.unwrap();
        let doc: crate::sidecar::SidecarDoc =
            serde_json::from_str(&fs::read_to_string(dir.path().join("todoPlus.json")).unwrap())
                .unwrap();
        assert!(doc.is_empty());
    }

    #[tokio::test]
    async fn initialize_respects_disabled_purge() {
        let (dir, ws) = workspace_with(&[
            (".todoplus.toml", "purge_obsolete_on_start = false\n"),
            (
                "todoPlus.json",
                r#"{"ghost.rs": {"abc123defg": {"created": 1, "updated": 1}}}"#,
            ),
        ]);
        ws.initialize().await.unwrap();
        let doc: crate::sidecar::SidecarDoc =
            serde_json::from_str(&fs::read_to_string(dir.path().join("todoPlus.json")).unwrap())
                .unwrap();
        assert_eq!(doc.len(), 1);
    }
}
