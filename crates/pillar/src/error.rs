use crate::storage::StorageError;
use common::SettingsError;
use security::SecurityError;
use thiserror::Error;

/// 节点启动与网络服务的错误
#[derive(Error, Debug)]
pub enum PillarError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
