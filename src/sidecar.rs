// todo-plus/src/sidecar.rs

use crate::item::TodoItem;
use crate::reminder::ReminderInfo;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const SIDECAR_FILE_NAME: &str = "todoPlus.json";

/// Persisted metadata for one tracked annotation id. An explicit record type:
/// merging iterates this fixed field list, never dynamic keys.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SidecarRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<i64>,
    #[serde(rename = "customMetadata", default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<Vec<(String, String)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<ReminderInfo>,
}

impl SidecarRecord {
    fn from_item(item: &TodoItem) -> Self {
        Self {
            created: item.created,
            updated: item.updated,
            custom_metadata: item
                .custom_metadata
                .as_ref()
                .filter(|m| !m.is_empty())
                .cloned(),
            reminder: item.reminder.clone(),
        }
    }

    /// Copy every present field onto the item. The store is authoritative for
    /// a freshly discovered, previously known id.
    fn apply_to(&self, item: &mut TodoItem) {
        if self.created.is_some() {
            item.created = self.created;
        }
        if self.updated.is_some() {
            item.updated = self.updated;
        }
        if self.custom_metadata.is_some() {
            item.custom_metadata = self.custom_metadata.clone();
        }
        if self.reminder.is_some() {
            item.reminder = self.reminder.clone();
        }
    }

    /// Item-wins, field-by-field merge: for each field take the item's value
    /// when defined, otherwise pull the persisted one onto the item. Only
    /// invoked when the item's `updated` is strictly newer.
    fn merge_from_newer(&mut self, item: &mut TodoItem) {
        if item.updated.is_some() {
            self.updated = item.updated;
        } else if self.updated.is_some() {
            item.updated = self.updated;
        }
        if item.created.is_some() {
            self.created = item.created;
        } else if self.created.is_some() {
            item.created = self.created;
        }
        if item.custom_metadata.is_some() {
            self.custom_metadata = item.custom_metadata.clone();
        } else if self.custom_metadata.is_some() {
            item.custom_metadata = self.custom_metadata.clone();
        }
        if item.reminder.is_some() {
            self.reminder = item.reminder.clone();
        } else if self.reminder.is_some() {
            item.reminder = self.reminder.clone();
        }
    }
}

/// `{ fileRelativePath: { id: record } }`, one per sidecar file.
pub type SidecarDoc = BTreeMap<String, BTreeMap<String, SidecarRecord>>;

/// Owns sidecar location and access for one project root.
///
/// The `found_paths` cache is long-lived process state: once a start
/// directory resolves to a sidecar path (or to "absent up to the root"), the
/// result is never invalidated. A sidecar created later between a resolved
/// start path and the root is not discovered retroactively.
pub struct ConfigResolver {
    project_root: PathBuf,
    found_paths: Mutex<HashMap<PathBuf, Option<PathBuf>>>,
    sidecar_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConfigResolver {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            found_paths: Mutex::new(HashMap::new()),
            sidecar_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Nearest sidecar file from `start` upward to the project root, first
    /// match wins. Cached per start path.
    pub fn find_sidecar(&self, start: &Path) -> Option<PathBuf> {
        if let Some(cached) = self.found_paths.lock().get(start) {
            return cached.clone();
        }
        let mut dir = start;
        let found = loop {
            let candidate = dir.join(SIDECAR_FILE_NAME);
            if candidate.is_file() {
                break Some(candidate);
            }
            if dir == self.project_root {
                break None;
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break None,
            }
        };
        self.found_paths
            .lock()
            .insert(start.to_path_buf(), found.clone());
        found
    }

    /// Serializes the read-modify-write cycle per sidecar path; concurrent
    /// syncs against the same sidecar must not interleave.
    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.sidecar_locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    /// Reconcile freshly scanned items against their sidecar records and
    /// rewrite the touched sidecar files. Idempotent. Items without an id are
    /// skipped entirely; write failures propagate.
    pub async fn sync_todos(&self, items: &mut [TodoItem]) -> Result<()> {
        let mut groups: BTreeMap<PathBuf, Vec<usize>> = BTreeMap::new();
        for (index, item) in items.iter().enumerate() {
            if item.id.is_none() {
                continue;
            }
            let dir = Path::new(&item.file_uri)
                .parent()
                .unwrap_or(&self.project_root)
                .to_path_buf();
            groups.entry(dir).or_default().push(index);
        }

        for (dir, indices) in groups {
            let sidecar_path = self
                .find_sidecar(&dir)
                .unwrap_or_else(|| self.project_root.join(SIDECAR_FILE_NAME));
            let lock = self.lock_for(&sidecar_path);
            let _guard = lock.lock().await;
            let mut doc = read_doc_defensive(&sidecar_path).await;
            let sidecar_dir = sidecar_path
                .parent()
                .unwrap_or(&self.project_root)
                .to_path_buf();

            for index in indices {
                let item = &mut items[index];
                let id = item.id.clone().expect("id-less items were filtered out");
                let rel = relative_key(&sidecar_dir, Path::new(&item.file_uri));
                match doc.get_mut(&rel).and_then(|ids| ids.get_mut(&id)) {
                    Some(record) => {
                        if !item.is_synced() {
                            record.apply_to(item);
                        } else if is_strictly_newer(item.updated, record.updated) {
                            record.merge_from_newer(item);
                        }
                        // Ties and older items leave the record untouched.
                    }
                    None if item.can_persist() => {
                        doc.entry(rel)
                            .or_default()
                            .insert(id, SidecarRecord::from_item(item));
                    }
                    None => {}
                }
            }
            // Unconditional rewrite per invocation, not diffed.
            write_doc(&sidecar_path, &doc).await?;
            debug!(sidecar = %sidecar_path.display(), "synced");
        }
        Ok(())
    }

    /// One-shot startup sweep: drop records whose id no longer occurs in the
    /// owning file's text, and path entries whose file is gone. A failure in
    /// one sidecar file abandons only that file's purge.
    pub async fn purge(&self) -> Result<()> {
        let sidecars: Vec<PathBuf> = WalkDir::new(&self.project_root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file() && entry.file_name() == SIDECAR_FILE_NAME
            })
            .map(|entry| entry.into_path())
            .collect();
        for sidecar_path in sidecars {
            if let Err(err) = self.purge_one(&sidecar_path).await {
                warn!(sidecar = %sidecar_path.display(), %err, "purge skipped");
            }
        }
        Ok(())
    }

    async fn purge_one(&self, sidecar_path: &Path) -> Result<()> {
        let lock = self.lock_for(sidecar_path);
        let _guard = lock.lock().await;
        let text = tokio::fs::read_to_string(sidecar_path)
            .await
            .with_context(|| format!("read {}", sidecar_path.display()))?;
        let mut doc: SidecarDoc = serde_json::from_str(&text)
            .with_context(|| format!("parse {}", sidecar_path.display()))?;
        let dir = sidecar_path.parent().unwrap_or(&self.project_root);

        let rels: Vec<String> = doc.keys().cloned().collect();
        for rel in rels {
            let target = dir.join(&rel);
            match tokio::fs::read_to_string(&target).await {
                Ok(contents) => {
                    let ids = doc.get_mut(&rel).expect("key came from the doc");
                    ids.retain(|id, _| contents.contains(id));
                    if ids.is_empty() {
                        doc.remove(&rel);
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    // The whole entry is stale.
                    doc.remove(&rel);
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("read {}", target.display()));
                }
            }
        }
        write_doc(sidecar_path, &doc).await
    }
}

fn is_strictly_newer(item_updated: Option<i64>, record_updated: Option<i64>) -> bool {
    matches!((item_updated, record_updated), (Some(item), Some(record)) if item > record)
}

fn relative_key(sidecar_dir: &Path, file: &Path) -> String {
    let rel = file.strip_prefix(sidecar_dir).unwrap_or(file);
    rel.to_string_lossy().replace('\\', "/")
}

/// An unreadable or unparseable sidecar is treated as an empty store; the
/// next write overwrites the corruption.
async fn read_doc_defensive(path: &Path) -> SidecarDoc {
    let Ok(text) = tokio::fs::read_to_string(path).await else {
        return SidecarDoc::default();
    };
    match serde_json::from_str(&text) {
        Ok(doc) => doc,
        Err(err) => {
            warn!(path = %path.display(), %err, "unparseable sidecar, treating as empty");
            SidecarDoc::default()
        }
    }
}

/// Pretty-printed with 4-space indentation, matching the persisted format.
async fn write_doc(path: &Path, doc: &SidecarDoc) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut serializer).context("serialize sidecar")?;
    tokio::fs::write(path, buf)
        .await
        .with_context(|| format!("write {}", path.display()))
}
