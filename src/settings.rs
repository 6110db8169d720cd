// todo-plus/src/settings.rs

use crate::language::LanguageInfo;
use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

pub const SETTINGS_FILE_NAME: &str = ".todoplus.toml";

/// Workspace-local settings, read from `.todoplus.toml` at the project root.
/// A missing or unparseable file falls back to defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Run the sidecar purge sweep when the workspace initializes.
    pub purge_obsolete_on_start: bool,
    /// Quiet window between a file change and its re-scan.
    pub scan_debounce_ms: u64,
    /// Glob patterns excluded from workspace scans, on top of `.gitignore`.
    pub exclude: Vec<String>,
    /// Custom comment syntaxes; consulted before the built-in table.
    pub languages: Vec<LanguageInfo>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            purge_obsolete_on_start: true,
            scan_debounce_ms: 1_000,
            exclude: Vec::new(),
            languages: Vec::new(),
        }
    }
}

impl Settings {
    pub fn load(project_root: &Path) -> Self {
        let path = project_root.join(SETTINGS_FILE_NAME);
        let Ok(text) = fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str(&text) {
            Ok(settings) => settings,
            Err(err) => {
                warn!(path = %path.display(), %err, "unparseable settings file, using defaults");
                Self::default()
            }
        }
    }

    pub fn exclude_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude {
            builder.add(Glob::new(pattern).with_context(|| format!("bad exclude glob {pattern:?}"))?);
        }
        builder.build().context("compile exclude globs")
    }
}
