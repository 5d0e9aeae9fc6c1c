//! Durable artifact tier: one precompiled snapshot file per template.
//!
//! Artifacts never expire; a TTL passed to `set` is ignored. Each write goes through
//! its own uniquely named temporary file in the same directory and is persisted with
//! a rename, so concurrent writers of one template never share a staging path and
//! readers never observe a partial artifact.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::tier::{CacheError, CacheTier};

const SOURCE: &str = "cache::artifact";

pub struct ArtifactTier {
    dir: PathBuf,
}

impl ArtifactTier {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, template_id: &str) -> Result<PathBuf, CacheError> {
        validate_artifact_name(template_id)?;
        Ok(self.dir.join(format!("{template_id}.json")))
    }
}

fn validate_artifact_name(name: &str) -> Result<(), CacheError> {
    let reason = if name.is_empty() {
        "empty template id"
    } else if name.contains(['/', '\\']) {
        "path separator in template id"
    } else if name.contains("..") || name.starts_with('.') {
        "relative path component in template id"
    } else {
        return Ok(());
    };

    Err(CacheError::InvalidKey {
        key: name.to_string(),
        reason,
    })
}

#[async_trait]
impl CacheTier for ArtifactTier {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(Bytes::from(bytes))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: Bytes, _ttl: Option<Duration>) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let dir = self.dir.clone();
        let len = value.len();
        tokio::task::spawn_blocking(move || -> Result<(), CacheError> {
            let mut staging = tempfile::Builder::new()
                .prefix(".artifact-")
                .suffix(".tmp")
                .tempfile_in(&dir)?;
            staging.write_all(&value)?;
            staging.flush()?;
            staging
                .persist(&path)
                .map_err(|err| CacheError::Io(err.error))?;
            Ok(())
        })
        .await
        .map_err(CacheError::backend)??;

        debug!(
            target = SOURCE,
            template_id = key,
            bytes = len,
            "artifact written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn missing_artifact_is_a_miss() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tier = ArtifactTier::new(dir.path());
        assert!(tier.get("modern").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn writes_land_as_named_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tier = ArtifactTier::new(dir.path().join("nested"));

        tier.set("modern", Bytes::from_static(b"{}"), Some(Duration::from_secs(1)))
            .await
            .expect("set");

        assert!(dir.path().join("nested/modern.json").exists());
        let entries = std::fs::read_dir(dir.path().join("nested"))
            .expect("read dir")
            .count();
        assert_eq!(entries, 1, "no staging files left behind");
        assert_eq!(
            tier.get("modern").await.expect("get"),
            Some(Bytes::from_static(b"{}"))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_of_one_template_all_succeed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tier = Arc::new(ArtifactTier::new(dir.path()));
        let payload = Bytes::from(vec![b'x'; 64 * 1024]);

        let writes = (0..16).map(|_| {
            let tier = Arc::clone(&tier);
            let payload = payload.clone();
            tokio::spawn(async move { tier.set("modern", payload, None).await })
        });
        for result in futures::future::join_all(writes).await {
            result.expect("join").expect("write");
        }

        assert_eq!(tier.get("modern").await.expect("get"), Some(payload));
        let entries = std::fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn rejects_names_that_escape_the_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tier = ArtifactTier::new(dir.path());

        for name in ["", "../etc", "a/b", "a\\b", ".hidden"] {
            let err = tier.get(name).await.expect_err("invalid name");
            assert!(matches!(err, CacheError::InvalidKey { .. }), "{name}");
        }
    }
}
