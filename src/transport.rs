//! Transport implementations for the tail poll contract.
//!
//! The viewer only ever talks to a `TailTransport`; whether the lines come
//! from a local file or a remote console backend is invisible to it.
//! Transport-level concerns like retries or auth belong to the backend
//! client, not here.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::tail::{TailRequest, TailResponse};

/// Describes where a log stream comes from
#[derive(Clone, Debug)]
pub enum SourceSpec {
    File { path: PathBuf },
    Remote { base_url: String, path: String },
}

impl SourceSpec {
    pub fn name(&self) -> String {
        match self {
            SourceSpec::File { path } => path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            SourceSpec::Remote { path, .. } => format!("remote:{path}"),
        }
    }

    /// The `path` field sent in tail requests.
    pub fn tail_path(&self) -> String {
        match self {
            SourceSpec::File { path } => path.to_string_lossy().into_owned(),
            SourceSpec::Remote { path, .. } => path.clone(),
        }
    }

    pub fn transport(&self) -> Arc<dyn TailTransport> {
        match self {
            SourceSpec::File { .. } => Arc::new(FileTailTransport),
            SourceSpec::Remote { base_url, .. } => {
                Arc::new(HttpTailTransport::new(base_url.clone()))
            }
        }
    }
}

#[async_trait]
pub trait TailTransport: Send + Sync {
    /// Fetch the next chunk of lines after `req.cursor`.
    async fn fetch(&self, req: &TailRequest) -> Result<TailResponse>;
}

/// Tails a local file. The cursor is a stringified byte offset; only
/// complete lines are returned, and the returned cursor never advances past
/// an incomplete trailing line, so repeating a poll is idempotent.
pub struct FileTailTransport;

#[async_trait]
impl TailTransport for FileTailTransport {
    async fn fetch(&self, req: &TailRequest) -> Result<TailResponse> {
        let offset: u64 = match req.cursor.as_deref() {
            Some(c) => c
                .parse()
                .with_context(|| format!("invalid file cursor: {c:?}"))?,
            None => 0,
        };

        let mut file = tokio::fs::File::open(&req.path)
            .await
            .with_context(|| format!("failed to open {}", req.path))?;
        let len = file
            .metadata()
            .await
            .with_context(|| format!("failed to stat {}", req.path))?
            .len();

        // Cursor beyond EOF means the file was truncated or rotated;
        // start over from the beginning like tail -F does.
        let start = if offset > len { 0 } else { offset };

        file.seek(SeekFrom::Start(start)).await?;
        let budget = req.limit_bytes.min(len - start) as usize;
        let mut chunk = vec![0u8; budget];
        let mut read = 0;
        while read < budget {
            let n = file.read(&mut chunk[read..]).await?;
            if n == 0 {
                break;
            }
            read += n;
        }
        chunk.truncate(read);

        let mut lines = Vec::new();
        let mut consumed = 0usize;
        let mut pos = 0usize;
        while lines.len() < req.max_lines {
            match chunk[pos..].iter().position(|&b| b == b'\n') {
                Some(nl) => {
                    let raw = &chunk[pos..pos + nl];
                    let text = String::from_utf8_lossy(raw.strip_suffix(b"\r").unwrap_or(raw));
                    lines.push(text.into_owned());
                    pos += nl + 1;
                    consumed = pos;
                }
                None => break,
            }
        }

        // A single line longer than the whole byte budget would otherwise
        // never complete; emit the fragment and advance past it.
        if lines.is_empty() && read == req.limit_bytes as usize && read > 0 {
            lines.push(String::from_utf8_lossy(&chunk).into_owned());
            consumed = read;
        }

        Ok(TailResponse {
            lines,
            next_cursor: Some((start + consumed as u64).to_string()),
        })
    }
}

/// Polls a remote console backend over HTTP: the request is POSTed as JSON
/// to `{base_url}/logs/tail` and the response decoded leniently. The
/// blocking ureq call runs on the blocking pool.
pub struct HttpTailTransport {
    base_url: String,
}

impl HttpTailTransport {
    pub fn new(base_url: String) -> Self {
        Self { base_url }
    }
}

#[async_trait]
impl TailTransport for HttpTailTransport {
    async fn fetch(&self, req: &TailRequest) -> Result<TailResponse> {
        let url = format!("{}/logs/tail", self.base_url.trim_end_matches('/'));
        let req = req.clone();
        tokio::task::spawn_blocking(move || {
            let mut response = ureq::post(&url)
                .send_json(&req)
                .with_context(|| format!("tail poll to {url} failed"))?;
            let body: TailResponse = response
                .body_mut()
                .read_json()
                .context("malformed tail response")?;
            Ok(body)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    struct TempLog {
        path: std::path::PathBuf,
    }

    impl TempLog {
        fn new(name: &str, content: &[u8]) -> Self {
            let path = std::env::temp_dir().join(format!("taillight-test-{name}-{}", std::process::id()));
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(content).unwrap();
            Self { path }
        }

        fn append(&self, content: &[u8]) {
            let mut f = std::fs::OpenOptions::new()
                .append(true)
                .open(&self.path)
                .unwrap();
            f.write_all(content).unwrap();
        }

        fn request(&self, cursor: Option<&str>) -> TailRequest {
            TailRequest {
                path: self.path.to_string_lossy().into_owned(),
                cursor: cursor.map(String::from),
                limit_bytes: 65536,
                max_lines: 400,
            }
        }
    }

    impl Drop for TempLog {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    #[tokio::test]
    async fn test_file_tail_from_start() {
        let log = TempLog::new("start", b"boot ok\nlistening on 25565\n");
        let resp = FileTailTransport.fetch(&log.request(None)).await.unwrap();
        assert_eq!(resp.lines, vec!["boot ok", "listening on 25565"]);
        assert_eq!(resp.next_cursor.as_deref(), Some("27"));
    }

    #[tokio::test]
    async fn test_file_tail_resumes_from_cursor() {
        let log = TempLog::new("resume", b"boot ok\n");
        let first = FileTailTransport.fetch(&log.request(None)).await.unwrap();
        let cursor = first.next_cursor.clone();

        // Nothing new yet: no lines, cursor stays put
        let resp = FileTailTransport
            .fetch(&log.request(cursor.as_deref()))
            .await
            .unwrap();
        assert!(resp.lines.is_empty());
        assert_eq!(resp.next_cursor, cursor);

        log.append(b"player joined\n");
        let resp = FileTailTransport
            .fetch(&log.request(cursor.as_deref()))
            .await
            .unwrap();
        assert_eq!(resp.lines, vec!["player joined"]);
    }

    #[tokio::test]
    async fn test_file_tail_holds_back_partial_line() {
        let log = TempLog::new("partial", b"done\nin prog");
        let resp = FileTailTransport.fetch(&log.request(None)).await.unwrap();
        assert_eq!(resp.lines, vec!["done"]);
        // Cursor stops at the end of the last complete line
        assert_eq!(resp.next_cursor.as_deref(), Some("5"));

        log.append(b"ress\n");
        let resp = FileTailTransport
            .fetch(&log.request(Some("5")))
            .await
            .unwrap();
        assert_eq!(resp.lines, vec!["in progress"]);
    }

    #[tokio::test]
    async fn test_file_tail_respects_max_lines() {
        let log = TempLog::new("maxlines", b"a\nb\nc\nd\n");
        let mut req = log.request(None);
        req.max_lines = 2;
        let resp = FileTailTransport.fetch(&req).await.unwrap();
        assert_eq!(resp.lines, vec!["a", "b"]);
        // Remaining lines come on the next poll
        req.cursor = resp.next_cursor;
        let resp = FileTailTransport.fetch(&req).await.unwrap();
        assert_eq!(resp.lines, vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_file_tail_restarts_after_truncation() {
        let log = TempLog::new("truncate", b"old contents that were long\n");
        let first = FileTailTransport.fetch(&log.request(None)).await.unwrap();
        std::fs::write(&log.path, b"fresh\n").unwrap();
        let resp = FileTailTransport
            .fetch(&log.request(first.next_cursor.as_deref()))
            .await
            .unwrap();
        assert_eq!(resp.lines, vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_file_tail_rejects_bad_cursor() {
        let log = TempLog::new("badcursor", b"a\n");
        let err = FileTailTransport
            .fetch(&log.request(Some("not-a-number")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid file cursor"));
    }

    #[tokio::test]
    async fn test_fetch_through_trait_object() {
        let log = TempLog::new("dyn", b"via dyn\n");
        let transport: Arc<dyn TailTransport> = Arc::new(FileTailTransport);
        let resp = transport.fetch(&log.request(None)).await.unwrap();
        assert_eq!(resp.lines, vec!["via dyn"]);
    }
}
