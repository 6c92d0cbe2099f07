use super::validation::{
    require_existing_checksum, validate_checksum_spec, validate_collection, validate_file_id,
    validate_pillar_id, verify_existing_checksum, verify_file_exists,
};
use super::{OperationFailure, PillarContext, RequestHandler, ResponseChannel};
use common::messages::{DeleteFileFinalResponse, FileTransferProgress};
use common::{FileAction, Request, RequestBody, RequestKind, ResponseBody};
use log::info;

/// DeleteFile
///
/// 校验和检查在持锁状态下、进度响应之前完成：不匹配时文件不会被删除，
/// 客户端也不会收到"已接受"的进度响应。
pub struct DeleteFileHandler;

impl RequestHandler for DeleteFileHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::DeleteFile
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::DeleteFileRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        let file_id = body.file_id.as_str();

        let collection_id = validate_collection(ctx, request)?;
        validate_pillar_id(ctx, request, true)?;
        validate_file_id(ctx, file_id)?;
        let expected =
            require_existing_checksum(ctx, body.checksum_data_for_existing_file.as_ref())?;
        if let Some(spec) = &body.checksum_request_for_existing_file {
            validate_checksum_spec(spec)?;
        }

        let _lock = ctx.locks.lock(collection_id, file_id);
        verify_file_exists(ctx, collection_id, file_id)?;
        if let Some(expected) = expected {
            verify_existing_checksum(ctx, collection_id, file_id, expected)?;
        }

        channel.send_progress(ResponseBody::DeleteFileProgressResponse(FileTransferProgress {
            file_id: file_id.to_string(),
            file_address: None,
        }))?;

        let checksum = ctx.calculate_requested_checksum(
            request,
            collection_id,
            file_id,
            body.checksum_request_for_existing_file.as_ref(),
        )?;
        ctx.model.delete_file(file_id, collection_id)?;
        ctx.record_audit(
            request,
            collection_id,
            Some(file_id),
            FileAction::DeleteFile,
            "File deleted",
        );
        info!("Deleted {}/{} on request from {}", collection_id, file_id, request.header.from);

        channel.complete(ResponseBody::DeleteFileFinalResponse(DeleteFileFinalResponse {
            file_id: file_id.to_string(),
            checksum_data_for_existing_file: checksum,
        }))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        ResponseBody::DeleteFileFinalResponse(DeleteFileFinalResponse {
            file_id: request.body.file_id().unwrap_or_default().to_string(),
            checksum_data_for_existing_file: None,
        })
    }
}
