//! Completion artifacts dropped by the external task runner.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("invalid ticket id: {0}")]
    InvalidTicketId(String),

    #[error("failed to read completion artifact {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove completion artifact {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where completion summaries arrive, keyed by ticket id.
#[async_trait]
pub trait CompletionInbox: Send + Sync {
    /// Trimmed summary if an artifact exists for the ticket.
    async fn peek(&self, ticket_id: &str) -> Result<Option<String>, CompletionError>;

    /// Consume the artifact. Acknowledging a missing artifact is not an error.
    async fn acknowledge(&self, ticket_id: &str) -> Result<(), CompletionError>;
}

/// Inbox backed by `completion-{ticket_id}.txt` files in a directory.
#[derive(Debug, Clone)]
pub struct FsCompletionInbox {
    dir: PathBuf,
}

impl FsCompletionInbox {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, ticket_id: &str) -> PathBuf {
        self.dir.join(format!("completion-{}.txt", ticket_id))
    }
}

#[async_trait]
impl CompletionInbox for FsCompletionInbox {
    async fn peek(&self, ticket_id: &str) -> Result<Option<String>, CompletionError> {
        let path = self.path_for(ticket_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CompletionError::Read { path, source }),
        }
    }

    async fn acknowledge(&self, ticket_id: &str) -> Result<(), CompletionError> {
        let path = self.path_for(ticket_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CompletionError::Remove { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_peek_missing_file() {
        let dir = TempDir::new().unwrap();
        let inbox = FsCompletionInbox::new(dir.path());
        assert_eq!(inbox.peek("OPS-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_peek_trims_and_acknowledge_removes() {
        let dir = TempDir::new().unwrap();
        let inbox = FsCompletionInbox::new(dir.path());
        std::fs::write(inbox.path_for("OPS-1"), "\n  Fixed the bug  \n").unwrap();

        assert_eq!(
            inbox.peek("OPS-1").await.unwrap().as_deref(),
            Some("Fixed the bug")
        );
        // Peeking does not consume.
        assert!(inbox.path_for("OPS-1").exists());

        inbox.acknowledge("OPS-1").await.unwrap();
        assert!(!inbox.path_for("OPS-1").exists());

        // Already gone.
        inbox.acknowledge("OPS-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_peek_tolerates_invalid_utf8() {
        let dir = TempDir::new().unwrap();
        let inbox = FsCompletionInbox::new(dir.path());
        std::fs::write(inbox.path_for("OPS-1"), b"Fixed \xff\xfe the build\n").unwrap();

        let summary = inbox.peek("OPS-1").await.unwrap().unwrap();
        assert!(summary.starts_with("Fixed "));
        assert!(summary.ends_with(" the build"));
        assert!(summary.contains('\u{FFFD}'));
    }

    #[test]
    fn test_path_layout() {
        let inbox = FsCompletionInbox::new("/tmp");
        assert_eq!(
            inbox.path_for("OPS-7"),
            PathBuf::from("/tmp/completion-OPS-7.txt")
        );
    }
}
