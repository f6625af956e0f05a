//! Document loader dispatch.
//!
//! Each supported [`DocumentType`] has a [`DocumentLoader`] that turns a
//! [`RawInput`] into plain text. Site and Youtube documents are fetched over
//! HTTP; PDF, CSV and Txt documents arrive as uploaded bytes and are parsed in
//! memory, so no temporary files are written.

pub mod csv;
pub mod error;
pub mod fetch;
pub mod pdf;
pub mod site;
pub mod youtube;

use std::fmt;
use std::path::Path;
use std::time::Duration;

pub use error::{LoadError, LoadResult};

/// The kind of document the oracle is grounded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Site,
    Youtube,
    Pdf,
    Csv,
    Txt,
}

impl DocumentType {
    /// All document types, in the order they are offered to the user.
    pub const ALL: [DocumentType; 5] = [
        DocumentType::Site,
        DocumentType::Youtube,
        DocumentType::Pdf,
        DocumentType::Csv,
        DocumentType::Txt,
    ];

    /// Whether this type is loaded from a URL rather than an uploaded file.
    pub fn expects_url(self) -> bool {
        matches!(self, Self::Site | Self::Youtube)
    }

    /// File extension accepted for uploads, without the dot.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Site | Self::Youtube => None,
            Self::Pdf => Some("pdf"),
            Self::Csv => Some("csv"),
            Self::Txt => Some("txt"),
        }
    }

    /// Parse from a string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "site" | "web" | "url" => Some(Self::Site),
            "youtube" | "video" | "yt" => Some(Self::Youtube),
            "pdf" => Some(Self::Pdf),
            "csv" => Some(Self::Csv),
            "txt" | "text" => Some(Self::Txt),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Site => write!(f, "Site"),
            Self::Youtube => write!(f, "Youtube"),
            Self::Pdf => write!(f, "PDF"),
            Self::Csv => write!(f, "CSV"),
            Self::Txt => write!(f, "Txt"),
        }
    }
}

/// An uploaded file: its original name and contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk as if it had been uploaded.
    pub fn from_path(path: &Path) -> LoadResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { file_name, bytes })
    }

    fn has_extension(&self, ext: &str) -> bool {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// The raw document input selected by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    Url(String),
    Upload(Upload),
}

impl RawInput {
    /// Interpret a source string for the given type: a URL for Site/Youtube,
    /// a file path for everything else.
    pub fn from_source(document_type: DocumentType, source: &str) -> LoadResult<Self> {
        if document_type.expects_url() {
            Ok(Self::Url(source.trim().to_string()))
        } else {
            Upload::from_path(Path::new(source.trim())).map(Self::Upload)
        }
    }

    /// Short human-readable description (URL or file name).
    pub fn describe(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Upload(upload) => format!("{} ({} bytes)", upload.file_name, upload.bytes.len()),
        }
    }
}

/// Network and language settings shared by the loaders.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    /// Timeout for each HTTP request.
    pub http_timeout: Duration,
    /// Preferred transcript languages, most preferred first.
    pub transcript_languages: Vec<String>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            transcript_languages: vec!["pt".into(), "en".into()],
        }
    }
}

/// Trait for type-specific document loaders.
pub trait DocumentLoader {
    /// Turn the raw input into plain text.
    fn load(&self, input: &RawInput) -> LoadResult<String>;
}

/// Get the loader for a document type.
pub fn loader_for(
    document_type: DocumentType,
    settings: &LoaderSettings,
) -> Box<dyn DocumentLoader> {
    match document_type {
        DocumentType::Site => Box::new(site::SiteLoader::new(settings)),
        DocumentType::Youtube => Box::new(youtube::YoutubeLoader::new(settings)),
        DocumentType::Pdf => Box::new(pdf::PdfLoader),
        DocumentType::Csv => Box::new(csv::CsvLoader),
        DocumentType::Txt => Box::new(TextLoader),
    }
}

/// Load a document with default settings.
pub fn load(document_type: DocumentType, input: &RawInput) -> LoadResult<String> {
    load_with(&LoaderSettings::default(), document_type, input)
}

/// Load a document with explicit settings.
pub fn load_with(
    settings: &LoaderSettings,
    document_type: DocumentType,
    input: &RawInput,
) -> LoadResult<String> {
    let loader = loader_for(document_type, settings);
    let text = loader.load(input)?;
    tracing::info!(
        document_type = %document_type,
        source = %input.describe(),
        chars = text.len(),
        "document loaded"
    );
    Ok(text)
}

/// Extract a usable URL from the input or fail with the right error.
pub(crate) fn require_url(document_type: DocumentType, input: &RawInput) -> LoadResult<&str> {
    match input {
        RawInput::Url(url) => {
            let url = url.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                Ok(url)
            } else {
                Err(LoadError::InvalidUrl {
                    document_type: document_type.to_string(),
                    url: url.to_string(),
                })
            }
        }
        RawInput::Upload(upload) => Err(LoadError::UnsupportedInput {
            document_type: document_type.to_string(),
            given: format!("uploaded file \"{}\"", upload.file_name),
            expected: "a URL".into(),
        }),
    }
}

/// Extract the upload from the input, checking its extension.
pub(crate) fn require_upload(document_type: DocumentType, input: &RawInput) -> LoadResult<&Upload> {
    let ext = document_type.extension().unwrap_or_default();
    match input {
        RawInput::Upload(upload) if upload.has_extension(ext) => Ok(upload),
        RawInput::Upload(upload) => Err(LoadError::UnsupportedInput {
            document_type: document_type.to_string(),
            given: format!("file \"{}\"", upload.file_name),
            expected: format!(".{ext}"),
        }),
        RawInput::Url(url) => Err(LoadError::UnsupportedInput {
            document_type: document_type.to_string(),
            given: format!("URL \"{url}\""),
            expected: format!(".{ext}"),
        }),
    }
}

/// Plain-text loader: contents verbatim, minus a UTF-8 byte order mark.
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, input: &RawInput) -> LoadResult<String> {
        let upload = require_upload(DocumentType::Txt, input)?;
        let bytes = upload
            .bytes
            .strip_prefix(b"\xEF\xBB\xBF".as_slice())
            .unwrap_or(&upload.bytes);
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_from_str() {
        assert_eq!(DocumentType::from_str_loose("PDF"), Some(DocumentType::Pdf));
        assert_eq!(DocumentType::from_str_loose(" youtube "), Some(DocumentType::Youtube));
        assert_eq!(DocumentType::from_str_loose("text"), Some(DocumentType::Txt));
        assert_eq!(DocumentType::from_str_loose("docx"), None);
    }

    #[test]
    fn only_web_types_expect_urls() {
        let url_types: Vec<_> = DocumentType::ALL
            .iter()
            .filter(|t| t.expects_url())
            .collect();
        assert_eq!(url_types, vec![&DocumentType::Site, &DocumentType::Youtube]);
    }

    #[test]
    fn text_loader_keeps_contents_verbatim() {
        let input = RawInput::Upload(Upload::new("notes.txt", "A\nB\nC"));
        let text = load(DocumentType::Txt, &input).unwrap();
        assert_eq!(text, "A\nB\nC");
    }

    #[test]
    fn text_loader_strips_bom() {
        let input = RawInput::Upload(Upload::new("bom.txt", b"\xEF\xBB\xBFhello".to_vec()));
        assert_eq!(load(DocumentType::Txt, &input).unwrap(), "hello");
    }

    #[test]
    fn upload_extension_is_checked() {
        let input = RawInput::Upload(Upload::new("report.pdf", b"%PDF".to_vec()));
        let err = load(DocumentType::Txt, &input).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedInput { .. }));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let input = RawInput::Upload(Upload::new("NOTES.TXT", "x"));
        assert!(load(DocumentType::Txt, &input).is_ok());
    }

    #[test]
    fn url_types_reject_uploads() {
        let input = RawInput::Upload(Upload::new("page.txt", "x"));
        let err = load(DocumentType::Site, &input).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedInput { .. }));
    }

    #[test]
    fn url_types_reject_bare_hosts() {
        let input = RawInput::Url("example.com".into());
        let err = load(DocumentType::Site, &input).unwrap_err();
        assert!(matches!(err, LoadError::InvalidUrl { .. }));
    }

    #[test]
    fn upload_from_path_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "contents").unwrap();

        let input = RawInput::from_source(DocumentType::Txt, path.to_str().unwrap()).unwrap();
        match input {
            RawInput::Upload(upload) => {
                assert_eq!(upload.file_name, "doc.txt");
                assert_eq!(upload.bytes, b"contents");
            }
            RawInput::Url(_) => panic!("expected an upload"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = RawInput::from_source(DocumentType::Pdf, "/nonexistent/file.pdf").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
