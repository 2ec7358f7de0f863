//! Reading and atomically rewriting the shared Caddyfile
//!
//! The file is the single source of truth: it is read fresh for every
//! registration and rewritten as a whole on append. The rewrite goes through
//! a temp file in the target directory followed by a rename, so an external
//! reader (the proxy, an operator's editor) never observes a partial write.

use crate::caddyfile::{normalize, BlockHeader, ConfigDocument};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Owns access to the configuration document on disk
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and parse the current document. A missing file is an empty
    /// document, not an error; anything else propagates.
    pub fn read(&self) -> Result<ConfigDocument> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(ConfigDocument::parse(&raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Config file absent, treating as empty");
                Ok(ConfigDocument::default())
            }
            Err(e) => Err(e).with_context(|| {
                format!("Failed to read config file '{}'", self.path.display())
            }),
        }
    }

    /// Append a header comment and its site blocks to the document.
    ///
    /// Existing content and each appended part are normalized and joined
    /// with exactly one blank line. The whole file is rewritten via
    /// temp-file-then-rename; callers must hold the registration lock for
    /// the full read-check-append cycle.
    pub fn append(&self, header: &BlockHeader, blocks: &[String]) -> Result<()> {
        let existing = self.read()?;

        let mut parts: Vec<String> = Vec::with_capacity(blocks.len() + 2);
        if !existing.text.is_empty() {
            parts.push(existing.text.trim_end_matches('\n').to_string());
        }
        parts.push(header.render());
        for block in blocks {
            parts.push(block.trim_end_matches('\n').to_string());
        }
        let content = normalize(&parts.join("\n\n"));

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir).with_context(|| {
            format!("Failed to create temp file in '{}'", dir.display())
        })?;
        tmp.write_all(content.as_bytes())
            .context("Failed to write config file contents")?;
        tmp.flush().context("Failed to flush config file contents")?;
        tmp.persist(&self.path).with_context(|| {
            format!("Failed to replace config file '{}'", self.path.display())
        })?;

        debug!(
            path = %self.path.display(),
            sequence = header.sequence,
            blocks = blocks.len(),
            "Config file rewritten"
        );
        Ok(())
    }

    /// Sequence number the next appended header should carry
    pub fn next_header_sequence(&self) -> Result<u64> {
        Ok(self.read()?.next_header_sequence())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn header(seq: u64) -> BlockHeader {
        BlockHeader {
            sequence: seq,
            backend: "10.0.0.5".to_string(),
            machine: "mach-01".to_string(),
            timestamp: "2026-08-25T10:00:00+00:00".to_string(),
        }
    }

    fn block(host: &str, target: &str) -> String {
        format!("{} {{\n    reverse_proxy {}\n}}", host, target)
    }

    #[test]
    fn test_missing_file_is_empty_document() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("Caddyfile"));
        let doc = store.read().unwrap();
        assert!(doc.text.is_empty());
        assert!(doc.sites.is_empty());
        assert_eq!(store.next_header_sequence().unwrap(), 1);
    }

    #[test]
    fn test_append_creates_file_with_single_blank_lines() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("Caddyfile"));

        store
            .append(
                &header(1),
                &[
                    block("app.t1.example.com", "10.0.0.5:3000"),
                    block("code.t1.example.com", "10.0.0.5:8443"),
                ],
            )
            .unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("# registration 1 "));
        assert!(content.ends_with("}\n"));
        assert!(!content.contains("\n\n\n"));
        assert_eq!(content.matches("\n\n").count(), 2);

        let doc = store.read().unwrap();
        assert_eq!(doc.sites.len(), 2);
        assert_eq!(doc.headers.len(), 1);
    }

    #[test]
    fn test_append_preserves_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Caddyfile");
        // operator-managed content with Windows line endings and extra
        // trailing newlines
        std::fs::write(&path, "static.example.com {\r\n    respond \"hi\"\r\n}\r\n\r\n\r\n")
            .unwrap();

        let store = ConfigStore::new(&path);
        store
            .append(&header(1), &[block("app.t1.example.com", "10.0.0.5:3000")])
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("static.example.com {"));
        assert!(content.contains("\n\n# registration 1 "));
        assert!(!content.contains('\r'));
        assert!(!content.contains("\n\n\n"));

        let doc = store.read().unwrap();
        assert_eq!(doc.sites.len(), 2);
    }

    #[test]
    fn test_sequence_increments_across_appends() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("Caddyfile"));

        store
            .append(&header(1), &[block("app.t1.example.com", "10.0.0.5:3000")])
            .unwrap();
        assert_eq!(store.next_header_sequence().unwrap(), 2);

        store
            .append(&header(2), &[block("app.t2.example.com", "10.0.0.9:3000")])
            .unwrap();
        assert_eq!(store.next_header_sequence().unwrap(), 3);

        let doc = store.read().unwrap();
        assert_eq!(
            doc.headers.iter().map(|h| h.sequence).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_read_error_propagates() {
        let dir = tempdir().unwrap();
        // the path is a directory, not a file
        let store = ConfigStore::new(dir.path());
        assert!(store.read().is_err());
    }
}
