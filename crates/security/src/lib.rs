//! 信任层
//!
//! - 从证书或签名中提取签名者身份 (`identity`)
//! - 权限索引 (`permission`)
//! - 消息认证、签名、操作授权 (`authenticator`, `signer`, `authorizer`)
//! - 组合以上功能的 `SecurityManager` 门面 (`manager`)

pub mod authenticator;
pub mod authorizer;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod manager;
pub mod permission;
pub mod signer;

pub use authenticator::MessageAuthenticator;
pub use authorizer::OperationAuthorizor;
pub use envelope::{SignatureEnvelope, SignerIdentifier, SignerInfo};
pub use error::SecurityError;
pub use identity::{
    identity_from_certificate, identity_from_signature, CertificateIdentity, SerialNumber,
    TrustedCertificate,
};
pub use manager::{
    security_manager_from_settings, BasicSecurityManager, PermissiveSecurityManager,
    SecurityManager, SignerIdentity,
};
pub use permission::PermissionStore;
pub use signer::{MessageSigner, SigningCredential};
