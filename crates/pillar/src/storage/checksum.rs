//! 校验和计算与缓存
//!
//! 支持 MD5、SHA1、SHA256、SHA384、SHA512 及其 HMAC 变体。HMAC 变体
//! 必须带盐（十六进制），普通算法不能带盐。

use super::error::ChecksumError;
use chrono::{DateTime, Utc};
use common::ChecksumSpec;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::collections::HashMap;
use std::io::Read;
use std::sync::{PoisonError, RwLock};

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    HmacMd5,
    HmacSha1,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl ChecksumAlgorithm {
    /// 算法名不区分大小写，`-`、`_` 可省略
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();
        let algorithm = match normalized.as_str() {
            "MD5" => ChecksumAlgorithm::Md5,
            "SHA1" => ChecksumAlgorithm::Sha1,
            "SHA256" => ChecksumAlgorithm::Sha256,
            "SHA384" => ChecksumAlgorithm::Sha384,
            "SHA512" => ChecksumAlgorithm::Sha512,
            "HMACMD5" => ChecksumAlgorithm::HmacMd5,
            "HMACSHA1" => ChecksumAlgorithm::HmacSha1,
            "HMACSHA256" => ChecksumAlgorithm::HmacSha256,
            "HMACSHA384" => ChecksumAlgorithm::HmacSha384,
            "HMACSHA512" => ChecksumAlgorithm::HmacSha512,
            _ => return None,
        };
        Some(algorithm)
    }

    pub fn is_salted(self) -> bool {
        matches!(
            self,
            ChecksumAlgorithm::HmacMd5
                | ChecksumAlgorithm::HmacSha1
                | ChecksumAlgorithm::HmacSha256
                | ChecksumAlgorithm::HmacSha384
                | ChecksumAlgorithm::HmacSha512
        )
    }
}

/// 校验算法是否受支持，返回解析后的算法和盐
pub fn verify_algorithm_supported(
    spec: &ChecksumSpec,
) -> Result<(ChecksumAlgorithm, Option<Vec<u8>>), ChecksumError> {
    let name = spec.checksum_type.trim();
    if name.is_empty() {
        return Err(ChecksumError::Malformed("checksum type is empty".into()));
    }
    let algorithm = ChecksumAlgorithm::from_name(name)
        .ok_or_else(|| ChecksumError::Unsupported(name.to_string()))?;

    let salt = match &spec.checksum_salt {
        Some(salt) => Some(hex::decode(salt.trim()).map_err(|e| {
            ChecksumError::Malformed(format!("checksum salt is not hex: {}", e))
        })?),
        None => None,
    };
    match (algorithm.is_salted(), &salt) {
        (true, None) => Err(ChecksumError::Malformed(format!(
            "{} requires a salt",
            name
        ))),
        (false, Some(_)) => Err(ChecksumError::Malformed(format!(
            "{} does not take a salt",
            name
        ))),
        _ => Ok((algorithm, salt)),
    }
}

/// 计算数据流的校验和，返回小写十六进制
pub fn compute_digest(source: &mut dyn Read, spec: &ChecksumSpec) -> Result<String, ChecksumError> {
    let (algorithm, salt) = verify_algorithm_supported(spec)?;
    let key = salt.unwrap_or_default();
    let digest = match algorithm {
        ChecksumAlgorithm::Md5 => hash_stream::<Md5>(source)?,
        ChecksumAlgorithm::Sha1 => hash_stream::<Sha1>(source)?,
        ChecksumAlgorithm::Sha256 => hash_stream::<Sha256>(source)?,
        ChecksumAlgorithm::Sha384 => hash_stream::<Sha384>(source)?,
        ChecksumAlgorithm::Sha512 => hash_stream::<Sha512>(source)?,
        ChecksumAlgorithm::HmacMd5 => mac_stream::<Hmac<Md5>>(&key, source)?,
        ChecksumAlgorithm::HmacSha1 => mac_stream::<Hmac<Sha1>>(&key, source)?,
        ChecksumAlgorithm::HmacSha256 => mac_stream::<Hmac<Sha256>>(&key, source)?,
        ChecksumAlgorithm::HmacSha384 => mac_stream::<Hmac<Sha384>>(&key, source)?,
        ChecksumAlgorithm::HmacSha512 => mac_stream::<Hmac<Sha512>>(&key, source)?,
    };
    Ok(hex::encode(digest))
}

/// 按字节比较两个十六进制校验和（忽略大小写和首尾空白）
pub fn checksums_match(expected_hex: &str, actual_hex: &str) -> bool {
    match (hex::decode(expected_hex.trim()), hex::decode(actual_hex.trim())) {
        (Ok(expected), Ok(actual)) => expected == actual,
        _ => false,
    }
}

fn hash_stream<D: Digest>(source: &mut dyn Read) -> std::io::Result<Vec<u8>> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = source.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize().to_vec())
}

fn mac_stream<M: Mac + KeyInit>(
    key: &[u8],
    source: &mut dyn Read,
) -> Result<Vec<u8>, ChecksumError> {
    let mut mac = <M as KeyInit>::new_from_slice(key)
        .map_err(|e| ChecksumError::Malformed(format!("checksum salt: {}", e)))?;
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = source.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        mac.update(&buffer[..n]);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

/// 缓存的默认校验和
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumEntry {
    pub file_id: String,
    pub checksum: String,
    pub calculation_timestamp: DateTime<Utc>,
}

/// 默认规格校验和的内存缓存，按 (集合, 文件) 索引
///
/// 每个键带一个代数，`invalidate` 时递增。计算前取得的代数过期后，
/// 计算结果不再写入缓存。
#[derive(Default)]
pub struct ChecksumStore {
    index: RwLock<ChecksumIndex>,
}

#[derive(Default)]
struct ChecksumIndex {
    entries: HashMap<(String, String), ChecksumEntry>,
    generations: HashMap<(String, String), u64>,
}

impl ChecksumStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(collection_id: &str, file_id: &str) -> (String, String) {
        (collection_id.to_string(), file_id.to_string())
    }

    pub fn get(&self, collection_id: &str, file_id: &str) -> Option<ChecksumEntry> {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(&Self::key(collection_id, file_id))
            .cloned()
    }

    /// 当前代数；在打开文件之前读取
    pub fn generation(&self, collection_id: &str, file_id: &str) -> u64 {
        self.index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generations
            .get(&Self::key(collection_id, file_id))
            .copied()
            .unwrap_or(0)
    }

    /// 代数未变时写入，返回是否写入
    pub fn insert_if_current(
        &self,
        collection_id: &str,
        entry: ChecksumEntry,
        generation: u64,
    ) -> bool {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let key = Self::key(collection_id, &entry.file_id);
        let current = index.generations.get(&key).copied().unwrap_or(0);
        if current != generation {
            return false;
        }
        index.entries.insert(key, entry);
        true
    }

    pub fn invalidate(&self, collection_id: &str, file_id: &str) {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let key = Self::key(collection_id, file_id);
        index.entries.remove(&key);
        *index.generations.entry(key).or_insert(0) += 1;
    }
}
