//! Error types for reference resolution

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Resource type '{resource_type}' in the reference '{reference}' is not supported.")]
    UnsupportedResourceType {
        resource_type: String,
        reference: String,
    },

    /// Zero or more than one search match. Both cases share one message.
    #[error("Given conditional reference '{reference}' does not resolve to a resource.")]
    ReferenceNotResolved { reference: String },

    #[error("Given reference '{reference}' does not resolve to a resource in this transaction.")]
    PlaceholderNotResolved { reference: String },

    #[error("Conditional reference '{reference}' in request '{request_url}' must name a resource type and at least one search parameter.")]
    InvalidConditionalReference {
        reference: String,
        request_url: String,
    },

    #[error("Unknown or unsupported search parameters in conditional reference '{reference}': {params}")]
    UnsupportedSearchParameters { reference: String, params: String },

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),

    #[error("Transaction entry {index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Reference resolution was cancelled")]
    Cancelled,

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for every failure the caller should report as "reference could not be resolved".
    pub fn is_not_resolved(&self) -> bool {
        match self {
            Error::ReferenceNotResolved { .. } | Error::PlaceholderNotResolved { .. } => true,
            Error::Entry { source, .. } => source.is_not_resolved(),
            _ => false,
        }
    }

    /// The innermost error, with bundle entry context peeled off.
    pub fn root(&self) -> &Error {
        match self {
            Error::Entry { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn in_entry(self, index: usize) -> Self {
        Error::Entry {
            index,
            source: Box::new(self),
        }
    }
}

/// Failures raised by a [`SearchSubsystem`](crate::search::SearchSubsystem).
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Search error: {0}")]
    Backend(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
