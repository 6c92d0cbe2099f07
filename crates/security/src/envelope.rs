//! 分离式签名信封
//!
//! 结构上对应 CMS SignedData 中与本系统相关的部分：签名者信息列表
//! 和可选的证书链。信封以 JSON 编码，二进制字段使用十六进制。

use crate::error::SecurityError;
use serde::{Deserialize, Serialize};

pub const ENVELOPE_VERSION: u8 = 1;
pub const ED25519_ALGORITHM: &str = "Ed25519";

/// 签名者标识
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignerIdentifier {
    /// 签发者 DN 的 DER（十六进制）+ 序列号（十六进制）
    #[serde(rename_all = "camelCase")]
    IssuerAndSerialNumber {
        issuer: String,
        serial_number: String,
    },
    /// 公钥哈希标识，本系统不接受
    SubjectKeyIdentifier(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerInfo {
    pub sid: SignerIdentifier,
    pub signature_algorithm: String,
    pub signature: String,
}

impl SignerInfo {
    pub fn signature_bytes(&self) -> Result<Vec<u8>, SecurityError> {
        hex::decode(&self.signature)
            .map_err(|e| SecurityError::MalformedSignature(format!("signature value: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureEnvelope {
    pub version: u8,
    pub signer_infos: Vec<SignerInfo>,
    /// 内嵌证书（DER，十六进制）
    #[serde(default)]
    pub certificates: Vec<String>,
}

impl SignatureEnvelope {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SecurityError> {
        let envelope: SignatureEnvelope = serde_json::from_slice(bytes)
            .map_err(|e| SecurityError::MalformedSignature(e.to_string()))?;
        if envelope.version != ENVELOPE_VERSION {
            return Err(SecurityError::MalformedSignature(format!(
                "unsupported envelope version {}",
                envelope.version
            )));
        }
        Ok(envelope)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SecurityError> {
        serde_json::to_vec(self).map_err(|e| SecurityError::MessageSigning(e.to_string()))
    }

    /// 恰好一个签名者信息，否则视为格式错误
    pub fn single_signer(&self) -> Result<&SignerInfo, SecurityError> {
        match self.signer_infos.as_slice() {
            [signer] => Ok(signer),
            [] => Err(SecurityError::MalformedSignature(
                "envelope contains no signer info".into(),
            )),
            many => Err(SecurityError::MalformedSignature(format!(
                "envelope contains {} signer infos, expected exactly one",
                many.len()
            ))),
        }
    }

    pub fn certificate_ders(&self) -> Result<Vec<Vec<u8>>, SecurityError> {
        self.certificates
            .iter()
            .map(|c| {
                hex::decode(c).map_err(|e| {
                    SecurityError::MalformedSignature(format!("embedded certificate: {}", e))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(n: u8) -> SignerInfo {
        SignerInfo {
            sid: SignerIdentifier::IssuerAndSerialNumber {
                issuer: "3000".to_string(),
                serial_number: format!("{:02x}", n),
            },
            signature_algorithm: ED25519_ALGORITHM.to_string(),
            signature: "00".to_string(),
        }
    }

    #[test]
    fn test_signer_count_must_be_one() {
        let mut envelope = SignatureEnvelope {
            version: ENVELOPE_VERSION,
            signer_infos: vec![],
            certificates: vec![],
        };
        assert!(envelope.single_signer().is_err());

        envelope.signer_infos.push(signer(1));
        assert!(envelope.single_signer().is_ok());

        envelope.signer_infos.push(signer(2));
        assert!(matches!(
            envelope.single_signer(),
            Err(SecurityError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_unparseable_envelope() {
        assert!(matches!(
            SignatureEnvelope::from_bytes(b"{not json"),
            Err(SecurityError::MalformedSignature(_))
        ));
        let wrong_version = br#"{"version":9,"signerInfos":[]}"#;
        assert!(SignatureEnvelope::from_bytes(wrong_version).is_err());
    }
}
