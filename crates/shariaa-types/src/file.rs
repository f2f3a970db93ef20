//! Uploaded contract files and format detection.

use serde::{Deserialize, Serialize};

/// Supported contract file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractFormat {
    Pdf,
    Txt,
    Docx,
}

impl ContractFormat {
    /// Resolve a format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// Resolve a format from a file name's extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        Self::from_extension(ext)
    }

    /// MIME type sent to the analysis service.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Txt => "text/plain",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    /// Canonical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Docx => "docx",
        }
    }
}

/// A contract file queued for upload.
///
/// Content is opaque to the core; only the name and resolved MIME type
/// participate in validation.
#[derive(Debug, Clone)]
pub struct ContractFile {
    /// File name including extension.
    pub name: String,
    /// Explicit MIME type, when the caller already knows it.
    pub mime_type: Option<String>,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl ContractFile {
    /// Create a file whose MIME type will be resolved from its name.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            bytes,
        }
    }

    /// Create a file with an explicit MIME type.
    pub fn with_mime_type(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: Some(mime_type.into()),
            bytes,
        }
    }

    /// MIME type to upload with: the explicit one, else inferred from the
    /// file name. `None` means the file type cannot be resolved.
    pub fn resolved_mime_type(&self) -> Option<String> {
        if let Some(mime) = &self.mime_type {
            return Some(mime.clone());
        }
        ContractFormat::from_file_name(&self.name).map(|f| f.mime_type().to_string())
    }

    /// Format inferred from the file name, when recognizable.
    pub fn format(&self) -> Option<ContractFormat> {
        ContractFormat::from_file_name(&self.name)
    }
}

/// Which generated document to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentVariant {
    /// Contract with non-compliant clauses rewritten.
    Modified,
    /// Original contract with non-compliant clauses marked.
    Marked,
}
