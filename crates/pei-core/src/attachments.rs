//! Reading support files from disk.

use std::path::Path;

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use pei_db::models::{NewRagFile, RagFileKind};

/// Kind and MIME type for a file extension, if supported.
pub fn classify(path: &Path) -> Option<(RagFileKind, &'static str)> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let kind = match ext.as_str() {
        "txt" => (RagFileKind::Text, "text/plain"),
        "md" | "markdown" => (RagFileKind::Text, "text/markdown"),
        "csv" => (RagFileKind::Text, "text/csv"),
        "json" => (RagFileKind::Text, "application/json"),
        "png" => (RagFileKind::Image, "image/png"),
        "jpg" | "jpeg" => (RagFileKind::Image, "image/jpeg"),
        "gif" => (RagFileKind::Image, "image/gif"),
        "webp" => (RagFileKind::Image, "image/webp"),
        _ => return None,
    };
    Some(kind)
}

/// Read a text or image file into a support file ready to store.
///
/// Text files are kept as UTF-8; images are base64-encoded.
pub fn load_support_file(path: &Path, selected: bool) -> Result<NewRagFile> {
    let Some((kind, mime_type)) = classify(path) else {
        bail!(
            "unsupported support file {}: expected a text (.txt, .md, .csv, .json) or image (.png, .jpg, .gif, .webp) file",
            path.display()
        );
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let content = match kind {
        RagFileKind::Text => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read text file {}", path.display()))?,
        RagFileKind::Image => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read image {}", path.display()))?;
            STANDARD.encode(bytes)
        }
    };

    Ok(NewRagFile {
        name,
        kind,
        mime_type: mime_type.to_string(),
        content,
        selected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_file_is_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Regimento.TXT");
        std::fs::write(&path, "Regras da escola").unwrap();

        let file = load_support_file(&path, true).unwrap();
        assert_eq!(file.name, "Regimento.TXT");
        assert_eq!(file.kind, RagFileKind::Text);
        assert_eq!(file.mime_type, "text/plain");
        assert_eq!(file.content, "Regras da escola");
        assert!(file.selected);
    }

    #[test]
    fn image_is_base64_encoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foto.png");
        std::fs::write(&path, b"hello").unwrap();

        let file = load_support_file(&path, false).unwrap();
        assert_eq!(file.kind, RagFileKind::Image);
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.content, "aGVsbG8=");
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laudo.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let err = load_support_file(&path, false).unwrap_err();
        assert!(err.to_string().contains("unsupported support file"));
    }
}
