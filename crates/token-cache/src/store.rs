//! Durable token records
//!
//! One JSON file per identity, named `token-{identity}.json`, inside the store
//! directory. Writes go to a temp file in the same directory and are renamed
//! over the record, so a concurrent reader sees either the old payload or the
//! new one, never a half-written file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::token::TokenPayload;

/// Distinguishes temp files of concurrent writers inside one process.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Directory-backed storage for token payloads, keyed by identity.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `identity`.
    ///
    /// Characters outside `[A-Za-z0-9._@-]` are replaced with `_` so a
    /// username can never escape the store directory.
    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.dir
            .join(format!("token-{}.json", sanitize_identity(identity)))
    }

    /// Read the record for `identity`.
    ///
    /// A missing record (or missing store directory) is `Ok(None)`. An
    /// unreadable (corrupt) record is also treated as absent: the next
    /// refresh overwrites it.
    pub async fn load(&self, identity: &str) -> Result<Option<TokenPayload>> {
        let path = self.path_for(identity);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
                ) =>
            {
                debug!(identity, path = %path.display(), "no cached token");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Io(format!(
                    "reading token record {}: {e}",
                    path.display()
                )));
            }
        };

        match serde_json::from_str::<TokenPayload>(&contents) {
            Ok(payload) => {
                debug!(identity, created = payload.created, "loaded cached token");
                Ok(Some(payload))
            }
            Err(e) => {
                warn!(identity, path = %path.display(), error = %e, "ignoring unreadable token record");
                Ok(None)
            }
        }
    }

    /// Persist `payload` as the record for `identity`, replacing any previous one.
    pub async fn save(&self, identity: &str, payload: &TokenPayload) -> Result<()> {
        let json = serde_json::to_string(payload)
            .map_err(|e| Error::Serialize(format!("serializing token record: {e}")))?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::Io(format!(
                "creating token directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.path_for(identity);
        write_atomic(&self.dir, &path, json.as_bytes()).await?;
        debug!(identity, path = %path.display(), "persisted token");
        Ok(())
    }
}

fn sanitize_identity(identity: &str) -> String {
    identity
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Write `bytes` to `path` via temp file + rename with 0600 permissions.
///
/// The temp file is removed if any step fails.
async fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp_path = dir.join(format!(".token.tmp.{}.{seq}", std::process::id()));

    let result = write_then_rename(&tmp_path, path, bytes).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp_path).await;
    }
    result
}

async fn write_then_rename(tmp_path: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(tmp_path, bytes)
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))
}
