// todo-plus/src/language.rs

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Comment syntax for one family of file extensions. At least one of
/// `line_comment` / `block_comment` is present for every registered language.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LanguageInfo {
    /// Extensions with leading dot, e.g. `[".rs"]`.
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_comment: Option<(String, String)>,
}

impl LanguageInfo {
    fn new(extensions: &[&str], line: Option<&str>, block: Option<(&str, &str)>) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            line_comment: line.map(str::to_string),
            block_comment: block.map(|(o, c)| (o.to_string(), c.to_string())),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.extensions.is_empty() && (self.line_comment.is_some() || self.block_comment.is_some())
    }
}

fn core_languages() -> Vec<LanguageInfo> {
    vec![
        LanguageInfo::new(&[".rs"], Some("//"), Some(("/*", "*/"))),
        LanguageInfo::new(
            &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs"],
            Some("//"),
            Some(("/*", "*/")),
        ),
        LanguageInfo::new(
            &[".c", ".h", ".cpp", ".hpp", ".cc", ".cs", ".java", ".kt", ".swift", ".go", ".scala"],
            Some("//"),
            Some(("/*", "*/")),
        ),
        LanguageInfo::new(&[".css", ".scss", ".less"], None, Some(("/*", "*/"))),
        LanguageInfo::new(&[".py"], Some("#"), Some(("'''", "'''"))),
        LanguageInfo::new(&[".rb"], Some("#"), Some(("=begin", "=end"))),
        LanguageInfo::new(&[".sh", ".bash", ".zsh", ".yml", ".yaml", ".toml"], Some("#"), None),
        LanguageInfo::new(&[".html", ".htm", ".xml", ".vue", ".svelte", ".md"], None, Some(("<!--", "-->"))),
        LanguageInfo::new(&[".lua"], Some("--"), Some(("--[[", "]]"))),
        LanguageInfo::new(&[".sql"], Some("--"), Some(("/*", "*/"))),
        LanguageInfo::new(&[".hs"], Some("--"), Some(("{-", "-}"))),
        LanguageInfo::new(&[".ex", ".exs"], Some("#"), None),
        LanguageInfo::new(&[".php"], Some("//"), Some(("/*", "*/"))),
    ]
}

/// Extension-keyed comment-syntax lookup. Custom languages (from settings)
/// are consulted before the built-in table; lookups are cached per extension
/// for the lifetime of the registry.
pub struct LanguageRegistry {
    languages: Vec<LanguageInfo>,
    cache: RwLock<HashMap<String, Option<LanguageInfo>>>,
}

impl LanguageRegistry {
    pub fn new(custom: Vec<LanguageInfo>) -> Self {
        let mut languages: Vec<LanguageInfo> =
            custom.into_iter().filter(LanguageInfo::is_valid).collect();
        languages.extend(core_languages());
        Self {
            languages,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// `None` means the file type is unsupported and the file must be skipped.
    pub fn get_language_info(&self, file_path: impl AsRef<Path>) -> Option<LanguageInfo> {
        let ext = file_path
            .as_ref()
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))?;
        if let Some(hit) = self.cache.read().get(&ext) {
            return hit.clone();
        }
        let found = self
            .languages
            .iter()
            .find(|lang| lang.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
            .cloned();
        self.cache.write().insert(ext, found.clone());
        found
    }

    pub fn is_file_supported(&self, file_path: impl AsRef<Path>) -> bool {
        self.get_language_info(file_path).is_some()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
