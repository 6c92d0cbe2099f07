//! 消息模型
//!
//! 请求和响应都由一个公共头（关联 ID、集合 ID、路由信息）和一个
//! 按 `type` 字段区分的消息体组成。总线上传输的是 [`BusEnvelope`]：
//! 消息体的 JSON 文本加上可选的签名。

use crate::types::{
    Alarm, AuditEvent, ChecksumData, ChecksumSpec, FileIds, FilePart, OperationType,
    ResponseInfo,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 总线信封：原始消息文本 + 十六进制编码的签名信封
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusEnvelope {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

// ============================================================
// Requests
// ============================================================

/// 请求公共头
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestHeader {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    #[serde(rename = "collectionID", default)]
    pub collection_id: Option<String>,
    #[serde(rename = "pillarID", default)]
    pub pillar_id: Option<String>,
    pub reply_to: String,
    pub from: String,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub audit_trail_information: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(flatten)]
    pub header: RequestHeader,
    #[serde(flatten)]
    pub body: RequestBody,
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        self.body.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyPillarsForGetFileRequest {
    #[serde(rename = "fileID")]
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFileRequest {
    #[serde(rename = "fileID")]
    pub file_id: String,
    pub file_address: String,
    #[serde(default)]
    pub file_part: Option<FilePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPillarsForPutFileRequest {
    #[serde(rename = "fileID", default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutFileRequest {
    #[serde(rename = "fileID")]
    pub file_id: String,
    pub file_address: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub checksum_data_for_new_file: Option<ChecksumData>,
    #[serde(default)]
    pub checksum_request_for_new_file: Option<ChecksumSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyPillarsForDeleteFileRequest {
    #[serde(rename = "fileID")]
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileRequest {
    #[serde(rename = "fileID")]
    pub file_id: String,
    #[serde(default)]
    pub checksum_data_for_existing_file: Option<ChecksumData>,
    #[serde(default)]
    pub checksum_request_for_existing_file: Option<ChecksumSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPillarsForReplaceFileRequest {
    #[serde(rename = "fileID")]
    pub file_id: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceFileRequest {
    #[serde(rename = "fileID")]
    pub file_id: String,
    pub file_address: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub checksum_data_for_existing_file: Option<ChecksumData>,
    #[serde(default)]
    pub checksum_request_for_existing_file: Option<ChecksumSpec>,
    #[serde(default)]
    pub checksum_data_for_new_file: Option<ChecksumData>,
    #[serde(default)]
    pub checksum_request_for_new_file: Option<ChecksumSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyPillarsForGetChecksumsRequest {
    #[serde(rename = "fileIDs")]
    pub file_ids: FileIds,
    #[serde(default)]
    pub checksum_request_for_existing_file: Option<ChecksumSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetChecksumsRequest {
    #[serde(rename = "fileIDs")]
    pub file_ids: FileIds,
    #[serde(default)]
    pub checksum_request_for_existing_file: Option<ChecksumSpec>,
    #[serde(default)]
    pub result_address: Option<String>,
    #[serde(default)]
    pub min_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_number_of_results: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyPillarsForGetFileIdsRequest {
    #[serde(rename = "fileIDs")]
    pub file_ids: FileIds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFileIdsRequest {
    #[serde(rename = "fileIDs")]
    pub file_ids: FileIds,
    #[serde(default)]
    pub result_address: Option<String>,
    #[serde(default)]
    pub min_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_number_of_results: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdentifyContributorsForGetStatusRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetStatusRequest {
    pub contributor: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdentifyContributorsForGetAuditTrailsRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAuditTrailsRequest {
    pub contributor: String,
    #[serde(default)]
    pub min_sequence_number: Option<u64>,
    #[serde(default)]
    pub max_sequence_number: Option<u64>,
    #[serde(rename = "fileID", default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub min_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_number_of_results: Option<u64>,
    #[serde(default)]
    pub result_address: Option<String>,
}

/// 请求体，按 `type` 字段区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RequestBody {
    IdentifyPillarsForGetFileRequest(IdentifyPillarsForGetFileRequest),
    GetFileRequest(GetFileRequest),
    IdentifyPillarsForPutFileRequest(IdentifyPillarsForPutFileRequest),
    PutFileRequest(PutFileRequest),
    IdentifyPillarsForDeleteFileRequest(IdentifyPillarsForDeleteFileRequest),
    DeleteFileRequest(DeleteFileRequest),
    IdentifyPillarsForReplaceFileRequest(IdentifyPillarsForReplaceFileRequest),
    ReplaceFileRequest(ReplaceFileRequest),
    IdentifyPillarsForGetChecksumsRequest(IdentifyPillarsForGetChecksumsRequest),
    GetChecksumsRequest(GetChecksumsRequest),
    #[serde(rename = "IdentifyPillarsForGetFileIDsRequest")]
    IdentifyPillarsForGetFileIdsRequest(IdentifyPillarsForGetFileIdsRequest),
    #[serde(rename = "GetFileIDsRequest")]
    GetFileIdsRequest(GetFileIdsRequest),
    IdentifyContributorsForGetStatusRequest(IdentifyContributorsForGetStatusRequest),
    GetStatusRequest(GetStatusRequest),
    IdentifyContributorsForGetAuditTrailsRequest(IdentifyContributorsForGetAuditTrailsRequest),
    GetAuditTrailsRequest(GetAuditTrailsRequest),
}

/// 请求种类，用作处理器注册表的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    IdentifyPillarsForGetFile,
    GetFile,
    IdentifyPillarsForPutFile,
    PutFile,
    IdentifyPillarsForDeleteFile,
    DeleteFile,
    IdentifyPillarsForReplaceFile,
    ReplaceFile,
    IdentifyPillarsForGetChecksums,
    GetChecksums,
    IdentifyPillarsForGetFileIds,
    GetFileIds,
    IdentifyContributorsForGetStatus,
    GetStatus,
    IdentifyContributorsForGetAuditTrails,
    GetAuditTrails,
}

impl RequestKind {
    pub const ALL: [RequestKind; 16] = [
        RequestKind::IdentifyPillarsForGetFile,
        RequestKind::GetFile,
        RequestKind::IdentifyPillarsForPutFile,
        RequestKind::PutFile,
        RequestKind::IdentifyPillarsForDeleteFile,
        RequestKind::DeleteFile,
        RequestKind::IdentifyPillarsForReplaceFile,
        RequestKind::ReplaceFile,
        RequestKind::IdentifyPillarsForGetChecksums,
        RequestKind::GetChecksums,
        RequestKind::IdentifyPillarsForGetFileIds,
        RequestKind::GetFileIds,
        RequestKind::IdentifyContributorsForGetStatus,
        RequestKind::GetStatus,
        RequestKind::IdentifyContributorsForGetAuditTrails,
        RequestKind::GetAuditTrails,
    ];

    /// 该请求需要的操作权限；识别阶段请求使用其对应操作的权限
    pub fn operation(self) -> OperationType {
        match self {
            RequestKind::IdentifyPillarsForGetFile | RequestKind::GetFile => OperationType::GetFile,
            RequestKind::IdentifyPillarsForPutFile | RequestKind::PutFile => OperationType::PutFile,
            RequestKind::IdentifyPillarsForDeleteFile | RequestKind::DeleteFile => {
                OperationType::DeleteFile
            }
            RequestKind::IdentifyPillarsForReplaceFile | RequestKind::ReplaceFile => {
                OperationType::ReplaceFile
            }
            RequestKind::IdentifyPillarsForGetChecksums | RequestKind::GetChecksums => {
                OperationType::GetChecksums
            }
            RequestKind::IdentifyPillarsForGetFileIds | RequestKind::GetFileIds => {
                OperationType::GetFileIds
            }
            RequestKind::IdentifyContributorsForGetStatus | RequestKind::GetStatus => {
                OperationType::GetStatus
            }
            RequestKind::IdentifyContributorsForGetAuditTrails | RequestKind::GetAuditTrails => {
                OperationType::GetAuditTrails
            }
        }
    }

    pub fn is_identification(self) -> bool {
        matches!(
            self,
            RequestKind::IdentifyPillarsForGetFile
                | RequestKind::IdentifyPillarsForPutFile
                | RequestKind::IdentifyPillarsForDeleteFile
                | RequestKind::IdentifyPillarsForReplaceFile
                | RequestKind::IdentifyPillarsForGetChecksums
                | RequestKind::IdentifyPillarsForGetFileIds
                | RequestKind::IdentifyContributorsForGetStatus
                | RequestKind::IdentifyContributorsForGetAuditTrails
        )
    }
}

impl RequestBody {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestBody::IdentifyPillarsForGetFileRequest(_) => RequestKind::IdentifyPillarsForGetFile,
            RequestBody::GetFileRequest(_) => RequestKind::GetFile,
            RequestBody::IdentifyPillarsForPutFileRequest(_) => RequestKind::IdentifyPillarsForPutFile,
            RequestBody::PutFileRequest(_) => RequestKind::PutFile,
            RequestBody::IdentifyPillarsForDeleteFileRequest(_) => {
                RequestKind::IdentifyPillarsForDeleteFile
            }
            RequestBody::DeleteFileRequest(_) => RequestKind::DeleteFile,
            RequestBody::IdentifyPillarsForReplaceFileRequest(_) => {
                RequestKind::IdentifyPillarsForReplaceFile
            }
            RequestBody::ReplaceFileRequest(_) => RequestKind::ReplaceFile,
            RequestBody::IdentifyPillarsForGetChecksumsRequest(_) => {
                RequestKind::IdentifyPillarsForGetChecksums
            }
            RequestBody::GetChecksumsRequest(_) => RequestKind::GetChecksums,
            RequestBody::IdentifyPillarsForGetFileIdsRequest(_) => {
                RequestKind::IdentifyPillarsForGetFileIds
            }
            RequestBody::GetFileIdsRequest(_) => RequestKind::GetFileIds,
            RequestBody::IdentifyContributorsForGetStatusRequest(_) => {
                RequestKind::IdentifyContributorsForGetStatus
            }
            RequestBody::GetStatusRequest(_) => RequestKind::GetStatus,
            RequestBody::IdentifyContributorsForGetAuditTrailsRequest(_) => {
                RequestKind::IdentifyContributorsForGetAuditTrails
            }
            RequestBody::GetAuditTrailsRequest(_) => RequestKind::GetAuditTrails,
        }
    }

    /// 请求直接指向的单个文件（如果有）
    pub fn file_id(&self) -> Option<&str> {
        match self {
            RequestBody::IdentifyPillarsForGetFileRequest(r) => Some(&r.file_id),
            RequestBody::GetFileRequest(r) => Some(&r.file_id),
            RequestBody::IdentifyPillarsForPutFileRequest(r) => r.file_id.as_deref(),
            RequestBody::PutFileRequest(r) => Some(&r.file_id),
            RequestBody::IdentifyPillarsForDeleteFileRequest(r) => Some(&r.file_id),
            RequestBody::DeleteFileRequest(r) => Some(&r.file_id),
            RequestBody::IdentifyPillarsForReplaceFileRequest(r) => Some(&r.file_id),
            RequestBody::ReplaceFileRequest(r) => Some(&r.file_id),
            RequestBody::IdentifyPillarsForGetChecksumsRequest(r) => r.file_ids.single_file(),
            RequestBody::GetChecksumsRequest(r) => r.file_ids.single_file(),
            RequestBody::IdentifyPillarsForGetFileIdsRequest(r) => r.file_ids.single_file(),
            RequestBody::GetFileIdsRequest(r) => r.file_ids.single_file(),
            RequestBody::GetAuditTrailsRequest(r) => r.file_id.as_deref(),
            RequestBody::IdentifyContributorsForGetStatusRequest(_)
            | RequestBody::GetStatusRequest(_)
            | RequestBody::IdentifyContributorsForGetAuditTrailsRequest(_) => None,
        }
    }
}

// ============================================================
// Responses
// ============================================================

/// 响应公共头
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseHeader {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    #[serde(rename = "collectionID", default)]
    pub collection_id: Option<String>,
    pub to: String,
    pub from: String,
    #[serde(rename = "pillarID")]
    pub pillar_id: String,
    pub response_info: ResponseInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(flatten)]
    pub header: ResponseHeader,
    #[serde(flatten)]
    pub body: ResponseBody,
}

impl Response {
    pub fn response_code(&self) -> crate::types::ResponseCode {
        self.header.response_info.response_code
    }

    /// 是否为最终响应（识别响应也视为该阶段的最终响应）
    pub fn is_final(&self) -> bool {
        !self.body.is_progress()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyFileResponse {
    #[serde(rename = "fileID", default)]
    pub file_id: Option<String>,
    pub time_to_deliver_millis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_data_for_existing_file: Option<ChecksumData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileTransferProgress {
    #[serde(rename = "fileID")]
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFileFinalResponse {
    #[serde(rename = "fileID")]
    pub file_id: String,
    pub file_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_part: Option<FilePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutFileFinalResponse {
    #[serde(rename = "fileID")]
    pub file_id: String,
    pub file_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_data_for_new_file: Option<ChecksumData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileFinalResponse {
    #[serde(rename = "fileID")]
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_data_for_existing_file: Option<ChecksumData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceFileFinalResponse {
    #[serde(rename = "fileID")]
    pub file_id: String,
    pub file_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_data_for_existing_file: Option<ChecksumData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_data_for_new_file: Option<ChecksumData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyListingResponse {
    #[serde(rename = "fileIDs", default, skip_serializing_if = "Option::is_none")]
    pub file_ids: Option<FileIds>,
    pub time_to_deliver_millis: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingProgress {
    #[serde(rename = "fileIDs", default, skip_serializing_if = "Option::is_none")]
    pub file_ids: Option<FileIds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_address: Option<String>,
}

/// 某个文件在指定校验和规格下的校验和
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChecksumDataForChecksumSpec {
    #[serde(rename = "fileID")]
    pub file_id: String,
    pub checksum_value: String,
    pub calculation_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultingChecksums {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_address: Option<String>,
    #[serde(default)]
    pub checksum_data_items: Vec<ChecksumDataForChecksumSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetChecksumsFinalResponse {
    #[serde(rename = "fileIDs")]
    pub file_ids: FileIds,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_request_for_existing_file: Option<ChecksumSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_checksums: Option<ResultingChecksums>,
    #[serde(default)]
    pub partial_result: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIdsDataItem {
    #[serde(rename = "fileID")]
    pub file_id: String,
    pub last_modification_time: DateTime<Utc>,
    pub file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultingFileIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_address: Option<String>,
    #[serde(rename = "fileIDsData", default)]
    pub file_ids_data: Vec<FileIdsDataItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetFileIdsFinalResponse {
    #[serde(rename = "fileIDs")]
    pub file_ids: FileIds,
    #[serde(rename = "resultingFileIDs", default, skip_serializing_if = "Option::is_none")]
    pub resulting_file_ids: Option<ResultingFileIds>,
    #[serde(default)]
    pub partial_result: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultingStatus {
    pub status_code: StatusCode,
    pub status_text: String,
    pub status_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStatusFinalResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_status: Option<ResultingStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultingAuditTrails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_address: Option<String>,
    #[serde(default)]
    pub audit_trail_events: Vec<AuditEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAuditTrailsFinalResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_audit_trails: Option<ResultingAuditTrails>,
    #[serde(default)]
    pub partial_result: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Empty {}

/// 响应体，按 `type` 字段区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseBody {
    IdentifyPillarsForGetFileResponse(IdentifyFileResponse),
    GetFileProgressResponse(FileTransferProgress),
    GetFileFinalResponse(GetFileFinalResponse),
    IdentifyPillarsForPutFileResponse(IdentifyFileResponse),
    PutFileProgressResponse(FileTransferProgress),
    PutFileFinalResponse(PutFileFinalResponse),
    IdentifyPillarsForDeleteFileResponse(IdentifyFileResponse),
    DeleteFileProgressResponse(FileTransferProgress),
    DeleteFileFinalResponse(DeleteFileFinalResponse),
    IdentifyPillarsForReplaceFileResponse(IdentifyFileResponse),
    ReplaceFileProgressResponse(FileTransferProgress),
    ReplaceFileFinalResponse(ReplaceFileFinalResponse),
    IdentifyPillarsForGetChecksumsResponse(IdentifyListingResponse),
    GetChecksumsProgressResponse(ListingProgress),
    GetChecksumsFinalResponse(GetChecksumsFinalResponse),
    #[serde(rename = "IdentifyPillarsForGetFileIDsResponse")]
    IdentifyPillarsForGetFileIdsResponse(IdentifyListingResponse),
    #[serde(rename = "GetFileIDsProgressResponse")]
    GetFileIdsProgressResponse(ListingProgress),
    #[serde(rename = "GetFileIDsFinalResponse")]
    GetFileIdsFinalResponse(GetFileIdsFinalResponse),
    IdentifyContributorsForGetStatusResponse(IdentifyListingResponse),
    GetStatusProgressResponse(Empty),
    GetStatusFinalResponse(GetStatusFinalResponse),
    IdentifyContributorsForGetAuditTrailsResponse(IdentifyListingResponse),
    GetAuditTrailsProgressResponse(ListingProgress),
    GetAuditTrailsFinalResponse(GetAuditTrailsFinalResponse),
}

impl ResponseBody {
    pub fn is_progress(&self) -> bool {
        matches!(
            self,
            ResponseBody::GetFileProgressResponse(_)
                | ResponseBody::PutFileProgressResponse(_)
                | ResponseBody::DeleteFileProgressResponse(_)
                | ResponseBody::ReplaceFileProgressResponse(_)
                | ResponseBody::GetChecksumsProgressResponse(_)
                | ResponseBody::GetFileIdsProgressResponse(_)
                | ResponseBody::GetStatusProgressResponse(_)
                | ResponseBody::GetAuditTrailsProgressResponse(_)
        )
    }
}

/// 发往告警目的地的告警消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmMessage {
    #[serde(rename = "correlationID")]
    pub correlation_id: String,
    pub to: String,
    pub from: String,
    pub alarm: Alarm,
}
