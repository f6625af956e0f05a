//! Rich diagnostic error types for document loading.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from fetching or parsing a document.
#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("invalid URL for {document_type} document: \"{url}\"")]
    #[diagnostic(
        code(oracle::load::invalid_url),
        help("Provide a full URL starting with http:// or https://.")
    )]
    InvalidUrl { document_type: String, url: String },

    #[error("{document_type} documents cannot be loaded from {given}")]
    #[diagnostic(
        code(oracle::load::unsupported_input),
        help(
            "Site and Youtube take a URL. PDF, CSV and Txt take an uploaded file \
             with the matching extension ({expected})."
        )
    )]
    UnsupportedInput {
        document_type: String,
        given: String,
        expected: String,
    },

    #[error("fetch error for URL \"{url}\": {message}")]
    #[diagnostic(
        code(oracle::load::fetch_error),
        help(
            "Failed to download the URL. Check that the URL is reachable \
             and the network is available."
        )
    )]
    Fetch { url: String, message: String },

    #[error("parse error in {format} document: {message}")]
    #[diagnostic(
        code(oracle::load::parse_error),
        help(
            "The document could not be parsed. Verify the file is valid {format} \
             and not corrupted."
        )
    )]
    Parse { format: String, message: String },

    #[error("no transcript available for video \"{video_id}\"")]
    #[diagnostic(
        code(oracle::load::no_transcript),
        help(
            "The video has no captions, or captions are disabled. \
             Pick a video with subtitles or auto-generated captions."
        )
    )]
    NoTranscript { video_id: String },

    #[error("empty document: no content extracted from \"{origin}\"")]
    #[diagnostic(
        code(oracle::load::empty_document),
        help(
            "The parser could not extract any text from the source. \
             The file may be empty or contain only images."
        )
    )]
    EmptyDocument { origin: String },

    #[error("I/O error reading \"{path}\": {source}")]
    #[diagnostic(
        code(oracle::load::io),
        help("Check that the file exists and is readable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for loader results.
pub type LoadResult<T> = std::result::Result<T, LoadError>;
