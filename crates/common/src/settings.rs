//! Pillar 配置
//!
//! 配置以 JSON 文件形式保存，启动时加载一次。权限配置（PermissionSet）
//! 也在这里定义，由 security crate 解析成权限索引。

use crate::types::{AllowedOperation, ChecksumSpec};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// 信任模式
///
/// `Permissive` 是显式命名的直通模式：不验证签名、不做授权、不签名。
/// 只用于非生产部署，绝不会作为出错时的回退。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrustMode {
    Verified,
    Permissive,
}

/// 单条操作权限，`collections` 为空表示不限集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPermission {
    pub operation: AllowedOperation,
    #[serde(default)]
    pub collections: Vec<String>,
}

impl OperationPermission {
    pub fn applies_to_collection(&self, collection_id: Option<&str>) -> bool {
        if self.collections.is_empty() {
            return true;
        }
        match collection_id {
            Some(id) => self.collections.iter().any(|c| c == id),
            None => false,
        }
    }
}

/// 权限规则：证书（PEM）+ 允许使用该证书的组件 + 允许的操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub certificate: String,
    #[serde(default)]
    pub allowed_certificate_users: Vec<String>,
    #[serde(default)]
    pub operation_permissions: Vec<OperationPermission>,
}

/// 有序的权限规则列表
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// 安全配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySettings {
    pub mode: TrustMode,
    #[serde(default = "default_true")]
    pub require_message_authentication: bool,
    #[serde(default = "default_true")]
    pub require_operation_authorization: bool,
    /// PEM 文件，包含 PRIVATE KEY 和 CERTIFICATE 两个块
    #[serde(default)]
    pub credential_file: Option<PathBuf>,
    #[serde(default)]
    pub permissions: PermissionSet,
}

impl SecuritySettings {
    pub fn permissive() -> Self {
        SecuritySettings {
            mode: TrustMode::Permissive,
            require_message_authentication: false,
            require_operation_authorization: false,
            credential_file: None,
            permissions: PermissionSet::default(),
        }
    }
}

/// Pillar 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarSettings {
    pub pillar_id: String,
    pub collections: Vec<String>,
    pub storage_dir: PathBuf,
    pub capacity_bytes: u64,
    #[serde(default)]
    pub minimum_size_left: u64,
    #[serde(default = "default_time_to_deliver")]
    pub time_to_deliver_ms: u64,
    #[serde(default = "default_checksum_spec")]
    pub default_checksum_spec: ChecksumSpec,
    #[serde(default = "default_true")]
    pub require_checksum_for_destructive_requests: bool,
    #[serde(default)]
    pub require_checksum_for_new_file_requests: bool,
    #[serde(default = "default_max_results")]
    pub max_number_of_results: u64,
    #[serde(default)]
    pub allowed_file_id_pattern: Option<String>,
    #[serde(default = "default_max_file_id_length")]
    pub max_file_id_length: usize,
    pub alarm_destination: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// 内存审计保留的事件数
    #[serde(default = "default_max_audit_events")]
    pub max_audit_events: usize,
    /// 本地文件交换只能访问该目录，缺省为 `<storage_dir>/exchange`
    #[serde(default)]
    pub exchange_dir: Option<PathBuf>,
    pub security: SecuritySettings,
}

fn default_true() -> bool {
    true
}

fn default_time_to_deliver() -> u64 {
    1_000
}

fn default_checksum_spec() -> ChecksumSpec {
    ChecksumSpec::new("MD5")
}

fn default_max_results() -> u64 {
    10_000
}

fn default_max_file_id_length() -> usize {
    255
}

fn default_max_audit_events() -> usize {
    100_000
}

fn default_listen_addr() -> String {
    "127.0.0.1:50052".to_string()
}

impl PillarSettings {
    /// 创建一个带默认值的配置
    pub fn new(pillar_id: impl Into<String>, collections: Vec<String>, storage_dir: PathBuf) -> Self {
        PillarSettings {
            pillar_id: pillar_id.into(),
            collections,
            storage_dir,
            capacity_bytes: u64::MAX,
            minimum_size_left: 0,
            time_to_deliver_ms: default_time_to_deliver(),
            default_checksum_spec: default_checksum_spec(),
            require_checksum_for_destructive_requests: true,
            require_checksum_for_new_file_requests: false,
            max_number_of_results: default_max_results(),
            allowed_file_id_pattern: None,
            max_file_id_length: default_max_file_id_length(),
            alarm_destination: "alarm-topic".to_string(),
            listen_addr: default_listen_addr(),
            max_audit_events: default_max_audit_events(),
            exchange_dir: None,
            security: SecuritySettings::permissive(),
        }
    }

    /// 文件交换目录；未配置时使用存储目录下的 `exchange`
    pub fn exchange_dir(&self) -> PathBuf {
        self.exchange_dir
            .clone()
            .unwrap_or_else(|| self.storage_dir.join("exchange"))
    }

    pub fn serves_collection(&self, collection_id: &str) -> bool {
        self.collections.iter().any(|c| c == collection_id)
    }

    /// 编译文件 ID 白名单正则（完整匹配）
    pub fn file_id_pattern(&self) -> Result<Option<Regex>, SettingsError> {
        match &self.allowed_file_id_pattern {
            Some(pattern) => Regex::new(&format!("^(?:{})$", pattern))
                .map(Some)
                .map_err(|e| SettingsError::Invalid(format!("allowed_file_id_pattern: {}", e))),
            None => Ok(None),
        }
    }

    /// 校验配置的内部一致性
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.pillar_id.trim().is_empty() {
            return Err(SettingsError::Invalid("pillar_id must not be empty".into()));
        }
        if self.collections.is_empty() {
            return Err(SettingsError::Invalid(
                "at least one collection must be configured".into(),
            ));
        }
        if self.collections.iter().any(|c| c.trim().is_empty()) {
            return Err(SettingsError::Invalid("collection ids must not be empty".into()));
        }
        if self.default_checksum_spec.checksum_type.trim().is_empty() {
            return Err(SettingsError::Invalid(
                "default_checksum_spec must name an algorithm".into(),
            ));
        }
        if self.max_number_of_results == 0 {
            return Err(SettingsError::Invalid(
                "max_number_of_results must be positive".into(),
            ));
        }
        if self.alarm_destination.trim().is_empty() {
            return Err(SettingsError::Invalid("alarm_destination must not be empty".into()));
        }
        self.file_id_pattern()?;

        if self.security.mode == TrustMode::Verified {
            if self.security.credential_file.is_none() {
                return Err(SettingsError::Invalid(
                    "VERIFIED trust mode requires a credential_file".into(),
                ));
            }
            if self.security.permissions.permissions.is_empty() {
                return Err(SettingsError::Invalid(
                    "VERIFIED trust mode requires at least one permission".into(),
                ));
            }
        }
        Ok(())
    }
}
