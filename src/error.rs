use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("invalid resource id \"{0}\", expected \"datasetId:resourceId\"")]
    InvalidResourceId(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("an API key is required to {0}")]
    MissingApiKey(String),

    #[error("invalid API key for {url}")]
    Unauthorized { url: String },

    #[error("API key has no access to organization {organization} on {url}")]
    Forbidden { url: String, organization: String },

    #[error("{0}")]
    NotFound(String),

    #[error(
        "cannot retrieve the existing dataset {id} from {url} (status {status}), was it deleted from the catalog?"
    )]
    RemoteDatasetMissing { id: String, url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{url} returned status {status}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    #[error("error deleting {target} on {url}: {message}")]
    Delete {
        target: String,
        url: String,
        message: String,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl CatalogError {
    pub fn status(&self) -> u16 {
        match self {
            CatalogError::InvalidResourceId(_)
            | CatalogError::InvalidInput(_)
            | CatalogError::ConfigParse(_) => 400,
            CatalogError::MissingApiKey(_) | CatalogError::Unauthorized { .. } => 401,
            CatalogError::Forbidden { .. } => 403,
            CatalogError::NotFound(_) | CatalogError::ConfigRead(_) => 404,
            CatalogError::RemoteDatasetMissing { status, .. } => *status,
            CatalogError::Status { status, .. } => *status,
            CatalogError::Http { .. }
            | CatalogError::Delete { .. }
            | CatalogError::Filesystem(_) => 500,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CatalogError::Status { status: 404 | 410, .. })
    }
}
