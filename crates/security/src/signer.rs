//! 消息签名
//!
//! 节点自己的凭据是一个 PEM 包：PKCS#8 编码的 Ed25519 私钥
//! （`PRIVATE KEY`）加上对应的证书（`CERTIFICATE`）。

use crate::envelope::{
    SignatureEnvelope, SignerIdentifier, SignerInfo, ED25519_ALGORITHM, ENVELOPE_VERSION,
};
use crate::error::SecurityError;
use crate::identity::TrustedCertificate;
use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signer, SigningKey};
use std::path::Path;

/// 私钥 + 证书
pub struct SigningCredential {
    signing_key: SigningKey,
    certificate: TrustedCertificate,
}

impl SigningCredential {
    /// 由 PKCS#8 私钥和 DER 证书构建，要求两者匹配
    pub fn from_parts(pkcs8_der: &[u8], certificate_der: &[u8]) -> Result<Self, SecurityError> {
        let signing_key = SigningKey::from_pkcs8_der(pkcs8_der)
            .map_err(|e| SecurityError::MessageSigning(format!("private key: {}", e)))?;
        let certificate = TrustedCertificate::from_der(certificate_der)
            .map_err(|e| SecurityError::MessageSigning(e.to_string()))?;

        let certificate_key = certificate.ed25519_key().ok_or_else(|| {
            SecurityError::MessageSigning("credential certificate is not an Ed25519 certificate".into())
        })?;
        if certificate_key != signing_key.verifying_key() {
            return Err(SecurityError::MessageSigning(
                "private key does not match the credential certificate".into(),
            ));
        }

        Ok(SigningCredential {
            signing_key,
            certificate,
        })
    }

    /// 从 PEM 包解析
    pub fn from_pem(pem: &[u8]) -> Result<Self, SecurityError> {
        let mut key_der = None;
        let mut cert_der = None;
        for block in x509_parser::pem::Pem::iter_from_buffer(pem) {
            let block = block.map_err(|e| SecurityError::MessageSigning(e.to_string()))?;
            match block.label.as_str() {
                "PRIVATE KEY" if key_der.is_none() => key_der = Some(block.contents),
                "CERTIFICATE" if cert_der.is_none() => cert_der = Some(block.contents),
                _ => {}
            }
        }
        let key_der = key_der.ok_or_else(|| {
            SecurityError::MessageSigning("credential has no PRIVATE KEY block".into())
        })?;
        let cert_der = cert_der.ok_or_else(|| {
            SecurityError::MessageSigning("credential has no CERTIFICATE block".into())
        })?;
        Self::from_parts(&key_der, &cert_der)
    }

    pub fn from_pem_file(path: &Path) -> Result<Self, SecurityError> {
        let bytes = std::fs::read(path).map_err(|e| {
            SecurityError::MessageSigning(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_pem(&bytes)
    }

    pub fn certificate(&self) -> &TrustedCertificate {
        &self.certificate
    }
}

/// 用节点凭据对外发消息签名
pub struct MessageSigner {
    credential: SigningCredential,
}

impl MessageSigner {
    pub fn new(credential: SigningCredential) -> Self {
        MessageSigner { credential }
    }

    pub fn certificate(&self) -> &TrustedCertificate {
        self.credential.certificate()
    }

    /// 生成分离式签名信封
    pub fn sign_message(&self, message: &[u8]) -> Result<Vec<u8>, SecurityError> {
        let signature = self
            .credential
            .signing_key
            .try_sign(message)
            .map_err(|e| SecurityError::MessageSigning(e.to_string()))?;
        let certificate = self.credential.certificate();

        let envelope = SignatureEnvelope {
            version: ENVELOPE_VERSION,
            signer_infos: vec![SignerInfo {
                sid: SignerIdentifier::IssuerAndSerialNumber {
                    issuer: hex::encode(certificate.issuer_der()),
                    serial_number: hex::encode(certificate.serial_bytes()),
                },
                signature_algorithm: ED25519_ALGORITHM.to_string(),
                signature: hex::encode(signature.to_bytes()),
            }],
            certificates: vec![hex::encode(certificate.der())],
        };
        envelope.to_bytes()
    }
}
