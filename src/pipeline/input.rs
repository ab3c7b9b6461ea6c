//! Input resolution: validate a user-supplied document before reading it.
//!
//! Uploaded bytes are written to a `TempDir` so every reader can work from a
//! file-system path; cleanup happens when [`ResolvedDocument`] is dropped.
//! Zip-based formats are checked for the `PK\x03\x04` magic so callers get a
//! meaningful error rather than a zip parser failure deep inside a reader.

use crate::config::DocumentFormat;
use crate::error::FrdError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

const ZIP_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// A document ready for extraction.
pub enum ResolvedDocument {
    /// Input was already a local file.
    Local { path: PathBuf, format: DocumentFormat },
    /// Input arrived as bytes and was written to a temp directory.
    /// The `TempDir` is kept alive until extraction completes.
    Uploaded {
        path: PathBuf,
        format: DocumentFormat,
        _temp_dir: TempDir,
    },
}

impl ResolvedDocument {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedDocument::Local { path, .. } => path,
            ResolvedDocument::Uploaded { path, .. } => path,
        }
    }

    pub fn format(&self) -> DocumentFormat {
        match self {
            ResolvedDocument::Local { format, .. } => *format,
            ResolvedDocument::Uploaded { format, .. } => *format,
        }
    }
}

/// Resolve a local path: existence, permission, format and magic bytes.
pub fn resolve_document(path: impl AsRef<Path>) -> Result<ResolvedDocument, FrdError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(FrdError::FileNotFound { path });
    }

    let format = DocumentFormat::from_path(&path)
        .ok_or_else(|| FrdError::UnsupportedFormat { path: path.clone() })?;

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            if format.is_zip_container() {
                let mut magic = [0u8; 4];
                if f.read_exact(&mut magic).is_err() || magic != ZIP_MAGIC {
                    return Err(FrdError::CorruptDocument {
                        path,
                        detail: format!("not a {format} container (first bytes {magic:?})"),
                    });
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(FrdError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(FrdError::FileNotFound { path });
        }
    }

    debug!("Resolved {} document: {}", format, path.display());
    Ok(ResolvedDocument::Local { path, format })
}

/// Write uploaded bytes to a temp file and resolve it.
///
/// `name` is only used for the temp file name and error messages.
pub fn resolve_bytes(
    bytes: &[u8],
    name: &str,
    format: DocumentFormat,
) -> Result<ResolvedDocument, FrdError> {
    let temp_dir = TempDir::new().map_err(|e| FrdError::Internal(format!("tempdir: {e}")))?;
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("upload");
    let path = temp_dir.path().join(format!("{stem}.{}", format.extension()));

    std::fs::write(&path, bytes)
        .map_err(|e| FrdError::Internal(format!("Failed to write temp file: {e}")))?;

    if format.is_zip_container() && !bytes.starts_with(&ZIP_MAGIC) {
        return Err(FrdError::CorruptDocument {
            path: PathBuf::from(name),
            detail: format!("not a {format} container"),
        });
    }

    Ok(ResolvedDocument::Uploaded {
        path,
        format,
        _temp_dir: temp_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_reported() {
        let err = resolve_document("/definitely/not/here.docx")
            .err()
            .expect("should fail");
        assert!(matches!(err, FrdError::FileNotFound { .. }));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("scan.pdf");
        std::fs::write(&p, b"%PDF-1.7").unwrap();
        let err = resolve_document(&p).err().expect("should fail");
        assert!(matches!(err, FrdError::UnsupportedFormat { .. }));
    }

    #[test]
    fn docx_without_zip_magic_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("brd.docx");
        std::fs::write(&p, b"plain text pretending").unwrap();
        let err = resolve_document(&p).err().expect("should fail");
        assert!(matches!(err, FrdError::CorruptDocument { .. }));
    }

    #[test]
    fn text_file_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("brd.txt");
        std::fs::write(&p, b"Req 1").unwrap();
        let doc = resolve_document(&p).unwrap();
        assert_eq!(doc.format(), DocumentFormat::Text);
        assert_eq!(doc.path(), p.as_path());
    }

    #[test]
    fn uploaded_bytes_live_until_drop() {
        let doc = resolve_bytes(b"line one\nline two", "notes.txt", DocumentFormat::Text).unwrap();
        let path = doc.path().to_path_buf();
        assert!(path.exists());
        assert!(path.to_string_lossy().ends_with("notes.txt"));
        drop(doc);
        assert!(!path.exists());
    }
}
