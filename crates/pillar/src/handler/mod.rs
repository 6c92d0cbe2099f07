//! 请求处理
//!
//! 每种请求一个处理器，处理器按 validate → progress → perform → final
//! 的顺序推进。各阶段函数都返回 `Result<_, OperationFailure>`，
//! 由 [`process_request`] 在边界上统一把失败（包括 panic）转换成
//! 唯一的一条最终响应。

pub mod audit_trails;
pub mod context;
pub mod delete_file;
pub mod get_checksums;
pub mod get_file;
pub mod get_file_ids;
pub mod identify;
pub mod put_file;
pub mod replace_file;
pub mod status;
pub mod validation;

pub use context::PillarContext;

use crate::bus::BusError;
use crate::exchange::ExchangeError;
use crate::storage::{ChecksumError, StorageError};
use common::{
    AlarmCode, BusEnvelope, FileAction, Request, RequestHeader, RequestKind, Response,
    ResponseBody, ResponseCode, ResponseHeader, ResponseInfo,
};
use log::{debug, error, info, warn};
use security::SecurityError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// 操作失败：响应码 + 诊断文本
///
/// `internal` 表示节点内部错误，边界处会额外发出 COMPONENT_FAILURE 告警。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {text}")]
pub struct OperationFailure {
    pub code: ResponseCode,
    pub text: String,
    pub internal: bool,
}

impl OperationFailure {
    pub fn new(code: ResponseCode, text: impl Into<String>) -> Self {
        OperationFailure {
            code,
            text: text.into(),
            internal: false,
        }
    }

    pub fn internal(text: impl Into<String>) -> Self {
        OperationFailure {
            code: ResponseCode::Failure,
            text: text.into(),
            internal: true,
        }
    }

    pub fn not_understood(text: impl Into<String>) -> Self {
        Self::new(ResponseCode::RequestNotUnderstoodFailure, text)
    }

    pub(crate) fn unexpected_body(kind: RequestKind) -> Self {
        Self::internal(format!("handler for {:?} received a different request type", kind))
    }
}

impl From<StorageError> for OperationFailure {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => {
                Self::new(ResponseCode::FileNotFoundFailure, err.to_string())
            }
            StorageError::AlreadyExists { .. } => {
                Self::new(ResponseCode::DuplicateFileFailure, err.to_string())
            }
            StorageError::UnknownCollection(_) => {
                Self::new(ResponseCode::RequestNotSupported, err.to_string())
            }
            StorageError::InvalidFileId { .. } => Self::not_understood(err.to_string()),
            StorageError::Checksum(inner) => inner.into(),
            StorageError::IoError(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<ChecksumError> for OperationFailure {
    fn from(err: ChecksumError) -> Self {
        match err {
            ChecksumError::Unsupported(_) => {
                Self::new(ResponseCode::RequestNotSupported, err.to_string())
            }
            ChecksumError::Malformed(_) => Self::not_understood(err.to_string()),
            ChecksumError::IoError(_) => Self::internal(err.to_string()),
        }
    }
}

impl From<ExchangeError> for OperationFailure {
    fn from(err: ExchangeError) -> Self {
        Self::new(ResponseCode::FileTransferFailure, err.to_string())
    }
}

impl From<BusError> for OperationFailure {
    fn from(err: BusError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<SecurityError> for OperationFailure {
    fn from(err: SecurityError) -> Self {
        Self::not_understood(err.to_string())
    }
}

/// 单个请求的协议阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Received,
    ProgressSent,
    Responded,
}

/// 单个请求的响应通道
///
/// 保证进度响应在最终响应之前，并且最终响应只发一次。
pub struct ResponseChannel<'a> {
    ctx: &'a PillarContext,
    header: &'a RequestHeader,
    state: ProtocolState,
}

impl<'a> ResponseChannel<'a> {
    pub fn new(ctx: &'a PillarContext, header: &'a RequestHeader) -> Self {
        ResponseChannel {
            ctx,
            header,
            state: ProtocolState::Received,
        }
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn has_responded(&self) -> bool {
        self.state == ProtocolState::Responded
    }

    pub fn send_progress(&mut self, body: ResponseBody) -> Result<(), OperationFailure> {
        if self.has_responded() {
            warn!(
                "Refusing progress response after final response (correlationID={})",
                self.header.correlation_id
            );
            return Err(OperationFailure::internal("progress response after final response"));
        }
        if !body.is_progress() {
            return Err(OperationFailure::internal("progress response with a final body"));
        }
        self.send(
            ResponseInfo::new(ResponseCode::OperationAcceptedProgress, "Operation accepted"),
            body,
        )?;
        self.state = ProtocolState::ProgressSent;
        Ok(())
    }

    pub fn send_final(&mut self, info: ResponseInfo, body: ResponseBody) -> Result<(), OperationFailure> {
        if self.has_responded() {
            warn!(
                "Refusing second final response (correlationID={}, code={})",
                self.header.correlation_id, info.response_code
            );
            return Err(OperationFailure::internal("final response already sent"));
        }
        if body.is_progress() {
            return Err(OperationFailure::internal("final response with a progress body"));
        }
        // 发送失败也视为已响应，不会再尝试第二条最终响应
        self.state = ProtocolState::Responded;
        self.send(info, body)
    }

    /// 成功的最终响应
    pub fn complete(&mut self, body: ResponseBody) -> Result<(), OperationFailure> {
        self.send_final(
            ResponseInfo::new(ResponseCode::OperationCompleted, "Operation completed"),
            body,
        )
    }

    fn send(&self, info: ResponseInfo, body: ResponseBody) -> Result<(), OperationFailure> {
        let code = info.response_code;
        let response = Response {
            header: ResponseHeader {
                correlation_id: self.header.correlation_id.clone(),
                collection_id: self.header.collection_id.clone(),
                to: self.header.reply_to.clone(),
                from: self.ctx.pillar_id().to_string(),
                pillar_id: self.ctx.pillar_id().to_string(),
                response_info: info,
            },
            body,
        };
        let text = serde_json::to_string(&response).map_err(BusError::from)?;
        let signature = self
            .ctx
            .security
            .sign_message(text.as_bytes())
            .map_err(|e| OperationFailure::internal(format!("cannot sign response: {}", e)))?
            .map(hex::encode);
        self.ctx.bus.send(
            &self.header.reply_to,
            BusEnvelope {
                body: text,
                signature,
            },
        )?;
        debug!(
            "Sent {} to '{}' (correlationID={})",
            code, self.header.reply_to, self.header.correlation_id
        );
        Ok(())
    }
}

/// 请求处理器
pub trait RequestHandler: Send + Sync {
    fn kind(&self) -> RequestKind;

    /// 执行完整的处理流程；成功时必须已经发出最终响应
    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure>;

    /// 失败最终响应使用的消息体
    fn failure_body(&self, request: &Request) -> ResponseBody;
}

/// 节点支持的全部处理器，每种请求一个
pub fn default_handlers() -> Vec<Arc<dyn RequestHandler>> {
    vec![
        Arc::new(identify::IdentifyForGetFileHandler),
        Arc::new(get_file::GetFileHandler),
        Arc::new(identify::IdentifyForPutFileHandler),
        Arc::new(put_file::PutFileHandler),
        Arc::new(identify::IdentifyForDeleteFileHandler),
        Arc::new(delete_file::DeleteFileHandler),
        Arc::new(identify::IdentifyForReplaceFileHandler),
        Arc::new(replace_file::ReplaceFileHandler),
        Arc::new(identify::IdentifyForGetChecksumsHandler),
        Arc::new(get_checksums::GetChecksumsHandler),
        Arc::new(identify::IdentifyForGetFileIdsHandler),
        Arc::new(get_file_ids::GetFileIdsHandler),
        Arc::new(identify::IdentifyForGetStatusHandler),
        Arc::new(status::GetStatusHandler),
        Arc::new(identify::IdentifyForGetAuditTrailsHandler),
        Arc::new(audit_trails::GetAuditTrailsHandler),
    ]
}

/// 在处理器边界上运行一个请求，保证恰好一条最终响应
pub fn process_request(handler: &dyn RequestHandler, request: &Request, ctx: &PillarContext) {
    let mut channel = ResponseChannel::new(ctx, &request.header);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        handler.handle(request, ctx, &mut channel)
    }));

    let failure = match outcome {
        Ok(Ok(())) if channel.has_responded() => return,
        Ok(Ok(())) => OperationFailure::internal("handler finished without a final response"),
        Ok(Err(failure)) => failure,
        Err(payload) => OperationFailure::internal(format!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        )),
    };
    finish_with_failure(handler, request, ctx, &mut channel, failure);
}

/// 在进入处理器之前拒绝请求（例如授权失败）
pub fn reject_request(
    handler: &dyn RequestHandler,
    request: &Request,
    ctx: &PillarContext,
    failure: OperationFailure,
) {
    let mut channel = ResponseChannel::new(ctx, &request.header);
    finish_with_failure(handler, request, ctx, &mut channel, failure);
}

fn finish_with_failure(
    handler: &dyn RequestHandler,
    request: &Request,
    ctx: &PillarContext,
    channel: &mut ResponseChannel<'_>,
    failure: OperationFailure,
) {
    let collection_id = request.header.collection_id.as_deref();
    let file_id = request.body.file_id();

    if failure.internal {
        error!(
            "{:?} failed internally (correlationID={}): {}",
            handler.kind(),
            request.header.correlation_id,
            failure.text
        );
        ctx.alarms
            .raise(AlarmCode::ComponentFailure, collection_id, file_id, &failure.text);
    } else {
        info!(
            "{:?} failed (correlationID={}): {}",
            handler.kind(),
            request.header.correlation_id,
            failure
        );
    }

    if !handler.kind().is_identification() {
        if let Some(collection_id) = collection_id {
            if ctx.settings.serves_collection(collection_id) {
                ctx.record_audit(request, collection_id, file_id, FileAction::Failure, &failure.to_string());
            }
        }
    }

    if channel.has_responded() {
        warn!(
            "Final response already sent for correlationID={}, dropping {}",
            request.header.correlation_id, failure
        );
        return;
    }
    let info = ResponseInfo::new(failure.code, failure.text);
    if let Err(e) = channel.send_final(info, handler.failure_body(request)) {
        error!(
            "Could not send failure response for correlationID={}: {}",
            request.header.correlation_id, e
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
