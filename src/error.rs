//! Error type shared by every catalog operation.

use thiserror::Error;

/// Everything that can go wrong between reading a selector and printing a report.
///
/// Input-validation variants are raised before any request is sent. Transport and
/// response variants abort the command; nothing is retried.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("'{0}' is not a valid entity reference, expected {{kind}}:{{namespace}}/{{name}}")]
    InvalidReferenceFormat(String),

    #[error("backstage doesn't have a kind '{kind}' (allowed kinds are: {allowed})")]
    UnknownKind { kind: String, allowed: String },

    #[error("{0}")]
    MissingRequiredSelector(String),

    #[error("too many arguments: expected at most {max}, got {got}")]
    TooManyArguments { max: usize, got: usize },

    #[error("catalog request failed with status {status}: {body}")]
    CatalogRequestFailed { status: u16, body: String },

    #[error("unexpected catalog response: {0}")]
    MalformedResponse(String),

    #[error("no {0} relations found for the selected entities")]
    NoQualifyingRelations(String),

    #[error("unknown relation type '{0}' (expected dependsOn, partOf or ownedBy)")]
    UnknownRelationType(String),

    #[error("unknown output format '{0}' (expected table, json or yaml)")]
    UnknownOutputFormat(String),

    #[error("cannot render output: {0}")]
    Render(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Stable name for the `error` field of JSON error output.
    pub fn code(&self) -> &'static str {
        match self {
            CatalogError::InvalidReferenceFormat(_) => "invalid_reference",
            CatalogError::UnknownKind { .. } => "unknown_kind",
            CatalogError::MissingRequiredSelector(_) => "missing_selector",
            CatalogError::TooManyArguments { .. } => "too_many_arguments",
            CatalogError::CatalogRequestFailed { .. } => "request_failed",
            CatalogError::MalformedResponse(_) => "malformed_response",
            CatalogError::NoQualifyingRelations(_) => "no_relations",
            CatalogError::UnknownRelationType(_) => "unknown_relation_type",
            CatalogError::UnknownOutputFormat(_) => "unknown_output_format",
            CatalogError::Render(_) => "render",
            CatalogError::Config(_) => "config",
            CatalogError::Transport(_) => "transport",
            CatalogError::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
