use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChecksumError {
    #[error("Unsupported checksum algorithm: {0}")]
    Unsupported(String),

    #[error("Malformed checksum specification: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File '{file_id}' not found in collection '{collection_id}'")]
    NotFound {
        file_id: String,
        collection_id: String,
    },

    #[error("File '{file_id}' already exists in collection '{collection_id}'")]
    AlreadyExists {
        file_id: String,
        collection_id: String,
    },

    #[error("Collection '{0}' is not served by this pillar")]
    UnknownCollection(String),

    #[error("Invalid file id '{file_id}': {reason}")]
    InvalidFileId { file_id: String, reason: String },

    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn not_found(file_id: &str, collection_id: &str) -> Self {
        StorageError::NotFound {
            file_id: file_id.to_string(),
            collection_id: collection_id.to_string(),
        }
    }

    pub(crate) fn already_exists(file_id: &str, collection_id: &str) -> Self {
        StorageError::AlreadyExists {
            file_id: file_id.to_string(),
            collection_id: collection_id.to_string(),
        }
    }
}
