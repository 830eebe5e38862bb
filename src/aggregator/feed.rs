//! JSON-lines change feed: one [`ChangeEvent`] per line, read from a file or
//! stdin and forwarded to the driver over a bounded channel.

use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::aggregator::driver::ChangeEvent;
use crate::aggregator::services::ServiceResult;

pub const DEFAULT_CAPACITY: usize = 256;

/// Open the feed source; `None` or `-` reads stdin.
pub async fn open(path: Option<&Path>) -> ServiceResult<Box<dyn AsyncRead + Unpin + Send>> {
    match path {
        Some(p) if p != Path::new("-") => {
            let file = tokio::fs::File::open(p).await?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(tokio::io::stdin())),
    }
}

/// Spawn a reader task. The task ends at end of input or when the receiver
/// is dropped, and yields the number of events it forwarded.
pub fn spawn_reader<R>(
    reader: R,
    capacity: usize,
) -> (mpsc::Receiver<ChangeEvent>, JoinHandle<ServiceResult<u64>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        let mut forwarded = 0u64;
        let mut line_no = 0u64;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let event: ChangeEvent = match serde_json::from_str(trimmed) {
                Ok(event) => event,
                Err(e) => {
                    warn!(line = line_no, error = %e, "Skipping unreadable change event");
                    continue;
                }
            };
            if tx.send(event).await.is_err() {
                debug!("Change feed receiver dropped");
                break;
            }
            forwarded += 1;
        }
        Ok(forwarded)
    });
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reader_skips_blank_and_bad_lines() {
        let input = br#"
{"entity":"role_assignment","op":"delete","id":"ra-1"}
# comment
not json
{"entity":"role","op":"update","id":"role-1","document":{"permissions":["permA"]}}
"#;
        let (mut rx, handle) = spawn_reader(&input[..], 4);

        let mut ids = Vec::new();
        while let Some(event) = rx.recv().await {
            ids.push(event.id().to_string());
        }
        assert_eq!(ids, vec!["ra-1", "role-1"]);
        assert_eq!(handle.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("missing.jsonl");
        assert!(open(Some(&missing)).await.is_err());
    }
}
