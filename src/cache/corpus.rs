//! Raw template corpus, the last tier consulted and the source of truth.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::snapshot::TemplateSnapshot;

use super::tier::CacheError;

const SOURCE: &str = "cache::corpus";

/// Lookup of raw (un-normalized) template records by template id.
#[async_trait]
pub trait SnapshotCorpus: Send + Sync {
    async fn find(&self, template_id: &str) -> Result<Option<Value>, CacheError>;
}

/// Directory of JSON template records.
///
/// `<id>.json` is tried first; otherwise every `*.json` file is scanned for a record
/// whose `templateId`, `slug` or `name` equals the id. Unreadable or malformed files
/// are skipped.
pub struct FsCorpus {
    dir: PathBuf,
}

impl FsCorpus {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read_record(path: &Path) -> Option<Value> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    warn!(target = SOURCE, path = %path.display(), error = %err, "unreadable template record");
                }
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(target = SOURCE, path = %path.display(), error = %err, "malformed template record");
                None
            }
        }
    }
}

#[async_trait]
impl SnapshotCorpus for FsCorpus {
    async fn find(&self, template_id: &str) -> Result<Option<Value>, CacheError> {
        let safe_name = !template_id.is_empty()
            && !template_id.contains(['/', '\\'])
            && !template_id.contains("..");
        if safe_name {
            let direct = self.dir.join(format!("{template_id}.json"));
            if let Some(record) = Self::read_record(&direct).await {
                return Ok(Some(record));
            }
        }

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(record) = Self::read_record(&path).await else {
                continue;
            };
            let stem_matches = path.file_stem().and_then(|stem| stem.to_str()) == Some(template_id);
            if TemplateSnapshot::record_matches(&record, template_id) || stem_matches {
                debug!(target = SOURCE, template_id, path = %path.display(), "matched by scan");
                return Ok(Some(record));
            }
        }

        Ok(None)
    }
}
