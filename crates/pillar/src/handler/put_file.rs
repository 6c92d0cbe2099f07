use super::validation::{
    discard_staged, require_new_checksum, validate_checksum_spec, validate_collection,
    validate_file_id, validate_pillar_id, verify_file_absent, verify_new_checksum, verify_space,
};
use super::{OperationFailure, PillarContext, RequestHandler, ResponseChannel};
use common::messages::{FileTransferProgress, PutFileFinalResponse};
use common::{FileAction, Request, RequestBody, RequestKind, ResponseBody, ResponseCode};
use log::info;

/// PutFile：下载到暂存区 → 校验新文件校验和 → 移入归档
pub struct PutFileHandler;

impl RequestHandler for PutFileHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::PutFile
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::PutFileRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        let file_id = body.file_id.as_str();

        let collection_id = validate_collection(ctx, request)?;
        validate_pillar_id(ctx, request, true)?;
        validate_file_id(ctx, file_id)?;
        let expected = require_new_checksum(ctx, body.checksum_data_for_new_file.as_ref())?;
        if let Some(spec) = &body.checksum_request_for_new_file {
            validate_checksum_spec(spec)?;
        }

        let _lock = ctx.locks.lock(collection_id, file_id);
        verify_file_absent(ctx, collection_id, file_id)?;
        verify_space(ctx, collection_id, body.file_size, 0)?;

        channel.send_progress(ResponseBody::PutFileProgressResponse(FileTransferProgress {
            file_id: file_id.to_string(),
            file_address: Some(body.file_address.clone()),
        }))?;

        let mut source = ctx.exchange.download(&body.file_address)?;
        let received = ctx
            .model
            .stage_file(file_id, collection_id, source.as_mut())
            .map_err(|e| {
                OperationFailure::new(
                    ResponseCode::FileTransferFailure,
                    format!("could not receive '{}' from {}: {}", file_id, body.file_address, e),
                )
            })?;
        if let Err(failure) = verify_space(ctx, collection_id, Some(received), 0) {
            discard_staged(ctx, collection_id, file_id);
            return Err(failure);
        }
        if let Some(expected) = expected {
            verify_new_checksum(ctx, collection_id, file_id, expected)?;
        }
        if let Err(e) = ctx.model.commit_new_file(file_id, collection_id) {
            discard_staged(ctx, collection_id, file_id);
            return Err(e.into());
        }
        ctx.record_audit(
            request,
            collection_id,
            Some(file_id),
            FileAction::PutFile,
            &format!("Received {} bytes", received),
        );

        let checksum = ctx.calculate_requested_checksum(
            request,
            collection_id,
            file_id,
            body.checksum_request_for_new_file.as_ref(),
        )?;
        info!("Put {}/{} ({} bytes)", collection_id, file_id, received);

        channel.complete(ResponseBody::PutFileFinalResponse(PutFileFinalResponse {
            file_id: file_id.to_string(),
            file_address: body.file_address.clone(),
            checksum_data_for_new_file: checksum,
        }))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        let (file_id, file_address) = match &request.body {
            RequestBody::PutFileRequest(body) => (body.file_id.clone(), body.file_address.clone()),
            other => (other.file_id().unwrap_or_default().to_string(), String::new()),
        };
        ResponseBody::PutFileFinalResponse(PutFileFinalResponse {
            file_id,
            file_address,
            checksum_data_for_new_file: None,
        })
    }
}
