//! 证书身份
//!
//! 身份 = 签发者（RFC 4514 形式的 DN 字符串）+ 序列号。无论身份来自
//! 证书文件还是来自一条实时签名，同一张证书都必须得到相等的身份，
//! 这是信任链匹配的基础。

use crate::envelope::{SignatureEnvelope, SignerIdentifier};
use crate::error::SecurityError;
use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};
use std::fmt;
use x509_parser::prelude::*;

/// Ed25519 公钥算法 OID
const ED25519_OID: &str = "1.3.101.112";

/// 证书序列号
///
/// 内部保存为去掉前导零的小写十六进制，等价的大整数编码得到相同的值。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SerialNumber(String);

impl SerialNumber {
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let trimmed = &bytes[start..];
        if trimmed.is_empty() {
            SerialNumber("0".to_string())
        } else {
            SerialNumber(hex::encode(trimmed))
        }
    }

    pub fn from_hex(text: &str) -> Result<Self, SecurityError> {
        let bytes = hex::decode(text)
            .map_err(|e| SecurityError::MalformedSignature(format!("serial number: {}", e)))?;
        Ok(Self::from_be_bytes(&bytes))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.0)
    }
}

/// 证书身份：签发者 + 序列号
///
/// 两个分量都可以缺失（表示"没有证书"），只有两个分量都相等时
/// 两个身份才相等，包括都缺失的情况。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CertificateIdentity {
    issuer: Option<String>,
    serial: Option<SerialNumber>,
}

impl CertificateIdentity {
    pub fn new(issuer: Option<String>, serial: Option<SerialNumber>) -> Self {
        CertificateIdentity { issuer, serial }
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn serial(&self) -> Option<&SerialNumber> {
        self.serial.as_ref()
    }
}

impl fmt::Display for CertificateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let issuer = self.issuer.as_deref().unwrap_or("<none>");
        match &self.serial {
            Some(serial) => write!(f, "issuer='{}', serial={}", issuer, serial),
            None => write!(f, "issuer='{}', serial=<none>", issuer),
        }
    }
}

/// 解析后的受信任证书
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCertificate {
    der: Vec<u8>,
    identity: CertificateIdentity,
    issuer_der: Vec<u8>,
    serial_bytes: Vec<u8>,
    subject: String,
    fingerprint: String,
    key_algorithm: String,
    public_key: Vec<u8>,
}

impl TrustedCertificate {
    /// 从 DER 编码解析证书
    pub fn from_der(der: &[u8]) -> Result<Self, SecurityError> {
        if der.is_empty() {
            return Err(SecurityError::InvalidCertificate("empty certificate".into()));
        }
        let (rest, cert) = X509Certificate::from_der(der)
            .map_err(|e| SecurityError::InvalidCertificate(e.to_string()))?;
        if !rest.is_empty() {
            return Err(SecurityError::InvalidCertificate(
                "trailing data after certificate".into(),
            ));
        }

        let issuer_der = cert.issuer().as_raw().to_vec();
        let serial_bytes = cert.raw_serial().to_vec();
        let identity = CertificateIdentity::new(
            Some(cert.issuer().to_string()),
            Some(SerialNumber::from_be_bytes(&serial_bytes)),
        );
        let spki = cert.public_key();
        let key_algorithm = spki.algorithm.algorithm.to_id_string();
        let public_key = spki.subject_public_key.data.to_vec();

        Ok(TrustedCertificate {
            der: der.to_vec(),
            identity,
            issuer_der,
            serial_bytes,
            subject: cert.subject().to_string(),
            fingerprint: hex::encode(Sha256::digest(der)),
            key_algorithm,
            public_key,
        })
    }

    /// 从 PEM 文本解析证书（取第一个 CERTIFICATE 块）
    pub fn from_pem(pem: &[u8]) -> Result<Self, SecurityError> {
        for block in x509_parser::pem::Pem::iter_from_buffer(pem) {
            let block = block.map_err(|e| SecurityError::InvalidCertificate(e.to_string()))?;
            if block.label == "CERTIFICATE" {
                return Self::from_der(&block.contents);
            }
        }
        Err(SecurityError::InvalidCertificate(
            "no CERTIFICATE block found".into(),
        ))
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn identity(&self) -> &CertificateIdentity {
        &self.identity
    }

    pub fn issuer_der(&self) -> &[u8] {
        &self.issuer_der
    }

    pub fn serial_bytes(&self) -> &[u8] {
        &self.serial_bytes
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// SHA-256(DER) 的十六进制
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// 证书中的 Ed25519 公钥；其它算法返回 `None`
    pub fn ed25519_key(&self) -> Option<VerifyingKey> {
        if self.key_algorithm != ED25519_OID {
            return None;
        }
        let bytes: [u8; 32] = self.public_key.as_slice().try_into().ok()?;
        VerifyingKey::from_bytes(&bytes).ok()
    }
}

/// 直接从证书字段读取身份
pub fn identity_from_certificate(der: &[u8]) -> Result<CertificateIdentity, SecurityError> {
    Ok(TrustedCertificate::from_der(der)?.identity)
}

/// 从签名信封中提取签名者身份
///
/// 信封必须恰好包含一个签名者信息，且签名者以签发者+序列号标识。
/// 任一步失败都返回 `MalformedSignature`，不会产生部分解析的身份。
pub fn identity_from_signature(signature: &[u8]) -> Result<CertificateIdentity, SecurityError> {
    let envelope = SignatureEnvelope::from_bytes(signature)?;
    let signer = envelope.single_signer()?;
    identity_from_signer_identifier(&signer.sid)
}

pub(crate) fn identity_from_signer_identifier(
    sid: &SignerIdentifier,
) -> Result<CertificateIdentity, SecurityError> {
    match sid {
        SignerIdentifier::IssuerAndSerialNumber {
            issuer,
            serial_number,
        } => {
            let issuer_der = hex::decode(issuer)
                .map_err(|e| SecurityError::MalformedSignature(format!("issuer: {}", e)))?;
            let (rest, name) = X509Name::from_der(&issuer_der)
                .map_err(|e| SecurityError::MalformedSignature(format!("issuer: {}", e)))?;
            if !rest.is_empty() {
                return Err(SecurityError::MalformedSignature(
                    "trailing data after issuer name".into(),
                ));
            }
            let serial = SerialNumber::from_hex(serial_number)?;
            Ok(CertificateIdentity::new(Some(name.to_string()), Some(serial)))
        }
        SignerIdentifier::SubjectKeyIdentifier(_) => Err(SecurityError::MalformedSignature(
            "signer is identified by subject key identifier, issuer and serial number required"
                .into(),
        )),
    }
}
