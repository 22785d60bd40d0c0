use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::layout::LayoutError;
use crate::model::QuoteDocument;
use crate::render::RenderError;
use crate::validate::ValidationError;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("cannot access quote file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid quote file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize quote: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Everything that stops a PDF from being produced.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("layout failed: {0}")]
    Layout(#[from] LayoutError),
    #[error("PDF rendering failed: {0}")]
    Render(#[from] RenderError),
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("an export is already running")]
    AlreadyRunning,
}

pub fn load_quote(path: &Path) -> Result<QuoteDocument, DocumentError> {
    let content = fs::read_to_string(path).map_err(|source| DocumentError::Io { path: path.to_path_buf(), source })?;
    Ok(QuoteDocument::from_toml_str(&content)?)
}

pub fn save_quote(path: &Path, doc: &QuoteDocument) -> Result<(), DocumentError> {
    let content = doc.to_toml_string()?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| DocumentError::Io { path: dir.to_path_buf(), source })?;
    }
    fs::write(path, content).map_err(|source| DocumentError::Io { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotes/q.toml");
        let mut doc = QuoteDocument::default();
        doc.client.name = "Mairie de Lyon".into();

        save_quote(&path, &doc).unwrap();
        assert_eq!(load_quote(&path).unwrap(), doc);
    }

    #[test]
    fn missing_quote_file_names_the_path() {
        let err = load_quote(Path::new("/nonexistent/q.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/q.toml"));
    }

    #[test]
    fn validation_message_passes_through() {
        let err = ExportError::from(ValidationError::MissingClient);
        assert_eq!(err.to_string(), "Veuillez remplir au moins le nom du client.");
    }
}
