use crate::envelope::{SignatureEnvelope, ED25519_ALGORITHM};
use crate::error::SecurityError;
use crate::identity::{identity_from_signer_identifier, CertificateIdentity, TrustedCertificate};
use crate::permission::PermissionStore;
use ed25519_dalek::Signature;
use log::debug;
use std::sync::Arc;

/// 消息认证器
///
/// 只做密码学校验和注册表查找，不检查操作权限。
pub struct MessageAuthenticator {
    permission_store: Arc<PermissionStore>,
}

impl MessageAuthenticator {
    pub fn new(permission_store: Arc<PermissionStore>) -> Self {
        MessageAuthenticator { permission_store }
    }

    /// 校验 `message` 上的分离式签名，返回签名者身份
    ///
    /// 签名总是用权限存储中注册的证书公钥校验；信封中内嵌的同身份证书
    /// 必须与注册证书逐字节一致。
    pub fn authenticate_message(
        &self,
        message: &[u8],
        signature: &[u8],
    ) -> Result<CertificateIdentity, SecurityError> {
        let envelope = SignatureEnvelope::from_bytes(signature).map_err(into_authentication)?;
        let signer = envelope.single_signer().map_err(into_authentication)?;
        let identity = identity_from_signer_identifier(&signer.sid).map_err(into_authentication)?;

        let registered = self.permission_store.certificate(&identity).ok_or_else(|| {
            SecurityError::MessageAuthentication(format!("signer {} is not registered", identity))
        })?;

        for der in envelope.certificate_ders().map_err(into_authentication)? {
            let embedded = TrustedCertificate::from_der(&der).map_err(into_authentication)?;
            if embedded.identity() == &identity && embedded.fingerprint() != registered.fingerprint()
            {
                return Err(SecurityError::MessageAuthentication(format!(
                    "embedded certificate for {} differs from the registered certificate",
                    identity
                )));
            }
        }

        if signer.signature_algorithm != ED25519_ALGORITHM {
            return Err(SecurityError::MessageAuthentication(format!(
                "unsupported signature algorithm '{}'",
                signer.signature_algorithm
            )));
        }
        let key = registered.ed25519_key().ok_or_else(|| {
            SecurityError::MessageAuthentication(format!(
                "registered certificate for {} carries no Ed25519 key",
                identity
            ))
        })?;
        let signature_bytes = signer.signature_bytes().map_err(into_authentication)?;
        let signature = Signature::from_slice(&signature_bytes)
            .map_err(|e| SecurityError::MessageAuthentication(format!("signature value: {}", e)))?;
        key.verify_strict(message, &signature).map_err(|_| {
            SecurityError::MessageAuthentication(format!(
                "signature by {} does not verify",
                identity
            ))
        })?;

        debug!("Authenticated message signed by {}", identity);
        Ok(identity)
    }
}

fn into_authentication(err: SecurityError) -> SecurityError {
    match err {
        SecurityError::MessageAuthentication(_) => err,
        other => SecurityError::MessageAuthentication(other.to_string()),
    }
}
