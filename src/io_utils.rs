//! File I/O for uploaded exports and generated documents.
//!
//! The `-` path convention routes through standard streams, both for
//! reading an export from stdin and for writing generated JSON to stdout.

use std::{
    fs::{self, File},
    io::{self, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

const STDIN_NAME: &str = "stdin";

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

/// Raw uploaded bytes plus the name they were uploaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        if is_dash(path) {
            let mut bytes = Vec::new();
            io::stdin()
                .lock()
                .read_to_end(&mut bytes)
                .context("Reading export from stdin")?;
            return Ok(Self::new(STDIN_NAME, bytes));
        }
        let bytes = fs::read(path).with_context(|| format!("Opening input file {path:?}"))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    /// Lowercase hex SHA-256 of the file contents.
    pub fn fingerprint(&self) -> String {
        format!("{:x}", Sha256::digest(&self.bytes))
    }
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) if !is_dash(p) => {
            if let Some(parent) = p.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Creating directory {parent:?}"))?;
            }
            Ok(Box::new(BufWriter::new(
                File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
            )))
        }
        _ => Ok(Box::new(io::stdout())),
    }
}

/// Writes `value` as pretty JSON followed by a newline.
pub fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let mut writer = open_output(path)?;
    serde_json::to_writer_pretty(&mut writer, value).context("Serializing JSON output")?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_hex() {
        let file = SourceFile::new("a.json", b"{}".to_vec());
        assert_eq!(file.fingerprint().len(), 64);
        assert_eq!(file.fingerprint(), SourceFile::new("b.json", b"{}".to_vec()).fingerprint());
        assert_ne!(file.fingerprint(), SourceFile::new("a.json", b"[]".to_vec()).fingerprint());
    }

    #[test]
    fn read_uses_file_name_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("export.json");
        fs::write(&path, b"{\"Items\": []}").expect("write");
        let file = SourceFile::read(&path).expect("read");
        assert_eq!(file.name, "export.json");
        assert_eq!(file.bytes, b"{\"Items\": []}");
    }

    #[test]
    fn write_json_creates_parent_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("out.json");
        write_json(Some(&path), &serde_json::json!({"ok": true})).expect("write");
        let written = fs::read_to_string(&path).expect("read back");
        assert!(written.contains("\"ok\": true"));
    }
}
