use thiserror::Error;

/// 信任层错误
///
/// 认证失败、操作授权失败、证书使用授权失败是互不相同的变体，
/// 调用方据此区分失败原因。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Message authentication failed: {0}")]
    MessageAuthentication(String),

    #[error("Message signing failed: {0}")]
    MessageSigning(String),

    #[error("Operation not authorized: {0}")]
    OperationAuthorization(String),

    #[error("Certificate use not authorized: {0}")]
    CertificateUse(String),

    #[error("Unregistered permission: {0}")]
    UnregisteredPermission(String),

    #[error("Permission configuration error: {0}")]
    PermissionConfiguration(String),
}
