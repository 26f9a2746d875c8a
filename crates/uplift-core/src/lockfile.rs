//! The lock file: an append-only ledger of locally created migration IDs.
//!
//! Lives at `migrations/uplift.lock`. One ID per line, insertion order equal
//! to creation order. When two branches both append and git leaves its merge
//! markers behind, deserialization keeps our side of the conflict and records
//! the remote branch name; no new migration may be created until the conflict
//! is resolved externally.

use crate::error::Error;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// File name of the lock file inside the migrations directory.
pub const LOCK_FILE_NAME: &str = "uplift.lock";

const MARKER_OURS: &str = "<<<<<<<";
const MARKER_SEPARATOR: &str = "=======";
const MARKER_THEIRS: &str = ">>>>>>>";

/// The migration ledger plus an optional unresolved-conflict marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockFile {
    /// Locally created migration IDs, in creation order.
    pub local_migrations: Vec<String>,
    /// Set to the conflicting branch name while a merge conflict is
    /// unresolved.
    pub remote_branch: Option<String>,
}

impl LockFile {
    /// Load the lock file at `path`. A missing file is not an error: it is
    /// equivalent to a fresh empty ledger. Malformed content is.
    pub async fn load(path: &Path) -> Result<LockFile, Error> {
        match fs::read_to_string(path).await {
            Ok(text) => LockFile::deserialize(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no lock file found, starting fresh");
                Ok(LockFile::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Serialize to the on-disk form. Round-trips through [`deserialize`],
    /// including the conflict-marked case.
    ///
    /// [`deserialize`]: LockFile::deserialize
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        if let Some(branch) = &self.remote_branch {
            out.push_str(MARKER_OURS);
            out.push_str(" HEAD\n");
            for id in &self.local_migrations {
                out.push_str(id);
                out.push('\n');
            }
            out.push_str(MARKER_SEPARATOR);
            out.push('\n');
            out.push_str(MARKER_THEIRS);
            out.push(' ');
            out.push_str(branch);
            out.push('\n');
        } else {
            for id in &self.local_migrations {
                out.push_str(id);
                out.push('\n');
            }
        }
        out
    }

    /// Parse the on-disk form. Fails with [`Error::LockFileParse`] on
    /// malformed content such as unterminated or stray conflict markers.
    pub fn deserialize(text: &str) -> Result<LockFile, Error> {
        let mut local_migrations = Vec::new();
        let mut remote_branch = None;
        let mut in_ours = false;
        let mut in_theirs = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with(MARKER_OURS) {
                if in_ours || in_theirs || remote_branch.is_some() {
                    return Err(parse_error("nested or repeated conflict markers"));
                }
                in_ours = true;
            } else if line == MARKER_SEPARATOR {
                if !in_ours {
                    return Err(parse_error("conflict separator without an opening marker"));
                }
                in_ours = false;
                in_theirs = true;
            } else if let Some(rest) = line.strip_prefix(MARKER_THEIRS) {
                if !in_theirs {
                    return Err(parse_error("closing conflict marker without a separator"));
                }
                let branch = rest.trim();
                if branch.is_empty() {
                    return Err(parse_error("closing conflict marker names no branch"));
                }
                remote_branch = Some(branch.to_string());
                in_theirs = false;
            } else if in_theirs {
                // The other branch's entries; the ledger only records the
                // conflict itself, not the foreign IDs.
            } else {
                if line.contains(char::is_whitespace) {
                    return Err(parse_error(&format!("invalid migration id line {line:?}")));
                }
                local_migrations.push(line.to_string());
            }
        }

        if in_ours || in_theirs {
            return Err(parse_error("unterminated conflict marker"));
        }

        Ok(LockFile {
            local_migrations,
            remote_branch,
        })
    }

    /// Append a freshly created migration ID. Refused while a merge conflict
    /// is unresolved.
    pub fn append_migration(&mut self, id: impl Into<String>) -> Result<(), Error> {
        if let Some(branch) = &self.remote_branch {
            return Err(Error::Conflict {
                branch: branch.clone(),
            });
        }
        self.local_migrations.push(id.into());
        Ok(())
    }
}

fn parse_error(message: &str) -> Error {
    Error::LockFileParse {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_with(ids: &[&str]) -> LockFile {
        LockFile {
            local_migrations: ids.iter().map(|s| s.to_string()).collect(),
            remote_branch: None,
        }
    }

    #[test]
    fn test_round_trip_empty() {
        let lf = LockFile::default();
        assert_eq!(LockFile::deserialize(&lf.serialize()).unwrap(), lf);
    }

    #[test]
    fn test_round_trip_populated() {
        let lf = lock_with(&["20200101120000-init", "20200102090000-add-users"]);
        assert_eq!(LockFile::deserialize(&lf.serialize()).unwrap(), lf);
    }

    #[test]
    fn test_round_trip_conflict_marked() {
        let lf = LockFile {
            local_migrations: vec!["20200101120000-init".to_string()],
            remote_branch: Some("feature/other".to_string()),
        };
        assert_eq!(LockFile::deserialize(&lf.serialize()).unwrap(), lf);
    }

    #[test]
    fn test_deserialize_conflict_keeps_our_side_only() {
        let text = "<<<<<<< HEAD\n\
                    20200101120000-init\n\
                    20200102090000-ours\n\
                    =======\n\
                    20200102100000-theirs\n\
                    >>>>>>> feature/other\n";
        let lf = LockFile::deserialize(text).unwrap();
        assert_eq!(
            lf.local_migrations,
            vec!["20200101120000-init", "20200102090000-ours"]
        );
        assert_eq!(lf.remote_branch.as_deref(), Some("feature/other"));
    }

    #[test]
    fn test_deserialize_unterminated_conflict_fails() {
        let text = "<<<<<<< HEAD\n20200101120000-init\n";
        assert!(matches!(
            LockFile::deserialize(text),
            Err(Error::LockFileParse { .. })
        ));
    }

    #[test]
    fn test_deserialize_stray_separator_fails() {
        assert!(matches!(
            LockFile::deserialize("=======\n"),
            Err(Error::LockFileParse { .. })
        ));
    }

    #[test]
    fn test_deserialize_rejects_id_with_whitespace() {
        assert!(matches!(
            LockFile::deserialize("20200101120000 init\n"),
            Err(Error::LockFileParse { .. })
        ));
    }

    #[test]
    fn test_append_migration() {
        let mut lf = lock_with(&["20200101120000-init"]);
        lf.append_migration("20200102090000-next").unwrap();
        assert_eq!(lf.local_migrations.len(), 2);
        assert_eq!(lf.local_migrations[1], "20200102090000-next");
    }

    #[test]
    fn test_append_refused_while_conflicted() {
        let mut lf = LockFile {
            local_migrations: vec![],
            remote_branch: Some("feature/other".to_string()),
        };
        let err = lf.append_migration("20200102090000-next").unwrap_err();
        assert!(matches!(err, Error::Conflict { ref branch } if branch == "feature/other"));
        assert!(lf.local_migrations.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let lf = LockFile::load(&dir.path().join(LOCK_FILE_NAME)).await.unwrap();
        assert_eq!(lf, LockFile::default());
    }

    #[tokio::test]
    async fn test_load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        tokio::fs::write(&path, "20200101120000-init\n").await.unwrap();

        let lf = LockFile::load(&path).await.unwrap();
        assert_eq!(lf.local_migrations, vec!["20200101120000-init"]);
    }

    #[tokio::test]
    async fn test_load_malformed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        tokio::fs::write(&path, ">>>>>>> stray\n").await.unwrap();

        assert!(matches!(
            LockFile::load(&path).await,
            Err(Error::LockFileParse { .. })
        ));
    }
}
