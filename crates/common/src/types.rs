use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// Unique file identifier inside a collection
pub type FileId = String;

// Identifier of a collection served by the pillar
pub type CollectionId = String;

/// 响应码
///
/// 每个响应都携带一个响应码，它是操作结果的唯一权威信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseCode {
    IdentificationPositive,
    IdentificationNegative,
    OperationAcceptedProgress,
    OperationCompleted,
    Failure,
    RequestNotUnderstoodFailure,
    RequestNotSupported,
    FileNotFoundFailure,
    DuplicateFileFailure,
    ExistingFileChecksumFailure,
    NewFileChecksumFailure,
    FileTransferFailure,
}

impl ResponseCode {
    /// 是否为成功路径上的响应码
    pub fn is_positive(self) -> bool {
        matches!(
            self,
            ResponseCode::IdentificationPositive
                | ResponseCode::OperationAcceptedProgress
                | ResponseCode::OperationCompleted
        )
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ResponseCode::IdentificationPositive => "IDENTIFICATION_POSITIVE",
            ResponseCode::IdentificationNegative => "IDENTIFICATION_NEGATIVE",
            ResponseCode::OperationAcceptedProgress => "OPERATION_ACCEPTED_PROGRESS",
            ResponseCode::OperationCompleted => "OPERATION_COMPLETED",
            ResponseCode::Failure => "FAILURE",
            ResponseCode::RequestNotUnderstoodFailure => "REQUEST_NOT_UNDERSTOOD_FAILURE",
            ResponseCode::RequestNotSupported => "REQUEST_NOT_SUPPORTED",
            ResponseCode::FileNotFoundFailure => "FILE_NOT_FOUND_FAILURE",
            ResponseCode::DuplicateFileFailure => "DUPLICATE_FILE_FAILURE",
            ResponseCode::ExistingFileChecksumFailure => "EXISTING_FILE_CHECKSUM_FAILURE",
            ResponseCode::NewFileChecksumFailure => "NEW_FILE_CHECKSUM_FAILURE",
            ResponseCode::FileTransferFailure => "FILE_TRANSFER_FAILURE",
        };
        f.write_str(text)
    }
}

/// 响应信息：响应码 + 诊断文本
///
/// 文本只用于诊断，不能用于任何控制决策。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseInfo {
    pub response_code: ResponseCode,
    pub response_text: String,
}

impl ResponseInfo {
    pub fn new(response_code: ResponseCode, response_text: impl Into<String>) -> Self {
        ResponseInfo {
            response_code,
            response_text: response_text.into(),
        }
    }
}

/// 校验和规格：算法 + 可选的盐（十六进制）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumSpec {
    pub checksum_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_salt: Option<String>,
}

impl ChecksumSpec {
    pub fn new(checksum_type: impl Into<String>) -> Self {
        ChecksumSpec {
            checksum_type: checksum_type.into(),
            checksum_salt: None,
        }
    }

    pub fn salted(checksum_type: impl Into<String>, salt_hex: impl Into<String>) -> Self {
        ChecksumSpec {
            checksum_type: checksum_type.into(),
            checksum_salt: Some(salt_hex.into()),
        }
    }
}

impl fmt::Display for ChecksumSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.checksum_salt {
            Some(salt) => write!(f, "{} (salt {})", self.checksum_type, salt),
            None => write!(f, "{}", self.checksum_type),
        }
    }
}

/// 某个文件的校验和数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumData {
    pub checksum_spec: ChecksumSpec,
    /// 十六进制编码的校验和值
    pub checksum_value: String,
    pub calculation_timestamp: DateTime<Utc>,
}

impl ChecksumData {
    /// Decoded checksum bytes, `None` when the value is not valid hex.
    pub fn value_bytes(&self) -> Option<Vec<u8>> {
        hex::decode(self.checksum_value.trim()).ok()
    }
}

/// 文件选择器：全部文件或单个文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileIds {
    #[serde(rename = "allFileIDs")]
    AllFileIds,
    #[serde(rename = "fileID")]
    FileId(String),
}

impl FileIds {
    pub fn single_file(&self) -> Option<&str> {
        match self {
            FileIds::AllFileIds => None,
            FileIds::FileId(id) => Some(id.as_str()),
        }
    }
}

/// 文件片段（GetFile 只取部分字节时使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    pub part_offset: u64,
    pub part_length: u64,
}

/// 可被授权的操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    GetFile,
    PutFile,
    DeleteFile,
    ReplaceFile,
    GetChecksums,
    GetFileIds,
    GetStatus,
    GetAuditTrails,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 权限配置中允许的操作，`All` 表示全部操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllowedOperation {
    All,
    GetFile,
    PutFile,
    DeleteFile,
    ReplaceFile,
    GetChecksums,
    GetFileIds,
    GetStatus,
    GetAuditTrails,
}

impl AllowedOperation {
    pub fn permits(self, operation: OperationType) -> bool {
        match self {
            AllowedOperation::All => true,
            AllowedOperation::GetFile => operation == OperationType::GetFile,
            AllowedOperation::PutFile => operation == OperationType::PutFile,
            AllowedOperation::DeleteFile => operation == OperationType::DeleteFile,
            AllowedOperation::ReplaceFile => operation == OperationType::ReplaceFile,
            AllowedOperation::GetChecksums => operation == OperationType::GetChecksums,
            AllowedOperation::GetFileIds => operation == OperationType::GetFileIds,
            AllowedOperation::GetStatus => operation == OperationType::GetStatus,
            AllowedOperation::GetAuditTrails => operation == OperationType::GetAuditTrails,
        }
    }
}

/// 告警码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmCode {
    ChecksumAlarm,
    ComponentFailure,
    FailedTransfer,
    InvalidMessage,
}

/// 带外告警：数据完整性问题或内部错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub alarm_code: AlarmCode,
    pub alarm_raiser: String,
    #[serde(rename = "fileID", default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
    #[serde(rename = "collectionID", default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<CollectionId>,
    pub alarm_text: String,
    pub orig_date_time: DateTime<Utc>,
}

/// 审计事件对应的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileAction {
    PutFile,
    GetFile,
    DeleteFile,
    ReplaceFile,
    GetChecksums,
    GetFileIds,
    ChecksumCalculated,
    Failure,
    Other,
}

/// 审计事件（只追加）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub sequence_number: u64,
    #[serde(rename = "collectionID")]
    pub collection_id: CollectionId,
    #[serde(rename = "fileID", default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
    pub actor_on_file: String,
    pub info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_trail_information: Option<String>,
    pub action_on_file: FileAction,
    #[serde(rename = "operationID", default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub action_date_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_code_wire_names() {
        let json = serde_json::to_string(&ResponseCode::ExistingFileChecksumFailure).unwrap();
        assert_eq!(json, "\"EXISTING_FILE_CHECKSUM_FAILURE\"");
        assert_eq!(
            ResponseCode::ExistingFileChecksumFailure.to_string(),
            "EXISTING_FILE_CHECKSUM_FAILURE"
        );
    }

    #[test]
    fn test_file_ids_selector() {
        let all: FileIds = serde_json::from_str("\"allFileIDs\"").unwrap();
        assert_eq!(all, FileIds::AllFileIds);
        assert_eq!(all.single_file(), None);

        let one: FileIds = serde_json::from_str(r#"{"fileID":"doc1"}"#).unwrap();
        assert_eq!(one.single_file(), Some("doc1"));
    }

    #[test]
    fn test_allowed_operation_all_permits_everything() {
        assert!(AllowedOperation::All.permits(OperationType::DeleteFile));
        assert!(AllowedOperation::GetFile.permits(OperationType::GetFile));
        assert!(!AllowedOperation::GetFile.permits(OperationType::PutFile));

        let parsed: AllowedOperation = serde_json::from_str("\"ALL\"").unwrap();
        assert_eq!(parsed, AllowedOperation::All);
    }

    #[test]
    fn test_checksum_value_bytes_ignores_case() {
        let upper = ChecksumData {
            checksum_spec: ChecksumSpec::new("MD5"),
            checksum_value: "ABC123".to_string(),
            calculation_timestamp: Utc::now(),
        };
        assert_eq!(upper.value_bytes(), Some(vec![0xab, 0xc1, 0x23]));

        let broken = ChecksumData {
            checksum_value: "xyz".to_string(),
            ..upper
        };
        assert_eq!(broken.value_bytes(), None);
    }
}
