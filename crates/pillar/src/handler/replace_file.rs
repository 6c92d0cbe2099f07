use super::validation::{
    discard_staged, require_existing_checksum, require_new_checksum, validate_checksum_spec,
    validate_collection, validate_file_id, validate_pillar_id, verify_existing_checksum,
    verify_file_exists, verify_new_checksum, verify_space,
};
use super::{OperationFailure, PillarContext, RequestHandler, ResponseChannel};
use common::messages::{FileTransferProgress, ReplaceFileFinalResponse};
use common::{FileAction, Request, RequestBody, RequestKind, ResponseBody, ResponseCode};
use log::info;

/// ReplaceFile：删除的保护规则 + 存入的校验规则
pub struct ReplaceFileHandler;

impl RequestHandler for ReplaceFileHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::ReplaceFile
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::ReplaceFileRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        let file_id = body.file_id.as_str();

        let collection_id = validate_collection(ctx, request)?;
        validate_pillar_id(ctx, request, true)?;
        validate_file_id(ctx, file_id)?;
        let expected_existing =
            require_existing_checksum(ctx, body.checksum_data_for_existing_file.as_ref())?;
        let expected_new = require_new_checksum(ctx, body.checksum_data_for_new_file.as_ref())?;
        for spec in [
            &body.checksum_request_for_existing_file,
            &body.checksum_request_for_new_file,
        ]
        .into_iter()
        .flatten()
        {
            validate_checksum_spec(spec)?;
        }

        let _lock = ctx.locks.lock(collection_id, file_id);
        verify_file_exists(ctx, collection_id, file_id)?;
        if let Some(expected) = expected_existing {
            verify_existing_checksum(ctx, collection_id, file_id, expected)?;
        }
        let old_size = ctx.model.file_info(file_id, collection_id)?.size;
        verify_space(ctx, collection_id, body.file_size, old_size)?;

        channel.send_progress(ResponseBody::ReplaceFileProgressResponse(FileTransferProgress {
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
        if let Err(failure) = verify_space(ctx, collection_id, Some(received), old_size) {
            discard_staged(ctx, collection_id, file_id);
            return Err(failure);
        }
        if let Some(expected) = expected_new {
            verify_new_checksum(ctx, collection_id, file_id, expected)?;
        }

        let old_checksum = match ctx.calculate_requested_checksum(
            request,
            collection_id,
            file_id,
            body.checksum_request_for_existing_file.as_ref(),
        ) {
            Ok(data) => data,
            Err(e) => {
                discard_staged(ctx, collection_id, file_id);
                return Err(e.into());
            }
        };
        if let Err(e) = ctx.model.replace_file(file_id, collection_id) {
            discard_staged(ctx, collection_id, file_id);
            return Err(e.into());
        }
        ctx.record_audit(
            request,
            collection_id,
            Some(file_id),
            FileAction::ReplaceFile,
            &format!("Replaced with {} bytes", received),
        );

        let new_checksum = ctx.calculate_requested_checksum(
            request,
            collection_id,
            file_id,
            body.checksum_request_for_new_file.as_ref(),
        )?;
        info!("Replaced {}/{} ({} bytes)", collection_id, file_id, received);

        channel.complete(ResponseBody::ReplaceFileFinalResponse(ReplaceFileFinalResponse {
            file_id: file_id.to_string(),
            file_address: body.file_address.clone(),
            checksum_data_for_existing_file: old_checksum,
            checksum_data_for_new_file: new_checksum,
        }))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        let (file_id, file_address) = match &request.body {
            RequestBody::ReplaceFileRequest(body) => {
                (body.file_id.clone(), body.file_address.clone())
            }
            other => (other.file_id().unwrap_or_default().to_string(), String::new()),
        };
        ResponseBody::ReplaceFileFinalResponse(ReplaceFileFinalResponse {
            file_id,
            file_address,
            checksum_data_for_existing_file: None,
            checksum_data_for_new_file: None,
        })
    }
}
