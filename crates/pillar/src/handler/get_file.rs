use super::validation::{
    validate_collection, validate_file_id, validate_file_part, validate_pillar_id,
    verify_file_exists,
};
use super::{OperationFailure, PillarContext, RequestHandler, ResponseChannel};
use common::messages::{FileTransferProgress, GetFileFinalResponse};
use common::{FileAction, Request, RequestBody, RequestKind, ResponseBody};
use log::info;
use std::io::{Read, Seek, SeekFrom};

/// GetFile：把归档文件（或其中一段）上传到请求给出的地址
pub struct GetFileHandler;

impl RequestHandler for GetFileHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::GetFile
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::GetFileRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        let file_id = body.file_id.as_str();

        let collection_id = validate_collection(ctx, request)?;
        validate_pillar_id(ctx, request, true)?;
        validate_file_id(ctx, file_id)?;
        verify_file_exists(ctx, collection_id, file_id)?;
        if let Some(part) = &body.file_part {
            let size = ctx.model.file_info(file_id, collection_id)?.size;
            validate_file_part(part, size)?;
        }

        channel.send_progress(ResponseBody::GetFileProgressResponse(FileTransferProgress {
            file_id: file_id.to_string(),
            file_address: Some(body.file_address.clone()),
        }))?;

        let mut file = ctx.model.open_file(file_id, collection_id)?;
        let uploaded = match &body.file_part {
            Some(part) => {
                file.seek(SeekFrom::Start(part.part_offset))
                    .map_err(|e| OperationFailure::internal(format!("seek failed: {}", e)))?;
                let mut section = file.take(part.part_length);
                ctx.exchange.upload(&mut section, &body.file_address)?
            }
            None => ctx.exchange.upload(&mut file, &body.file_address)?,
        };
        ctx.record_audit(
            request,
            collection_id,
            Some(file_id),
            FileAction::GetFile,
            &format!("Delivered {} bytes", uploaded),
        );
        info!("Delivered {}/{} to {}", collection_id, file_id, body.file_address);

        channel.complete(ResponseBody::GetFileFinalResponse(GetFileFinalResponse {
            file_id: file_id.to_string(),
            file_address: body.file_address.clone(),
            file_part: body.file_part,
        }))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        let (file_id, file_address, file_part) = match &request.body {
            RequestBody::GetFileRequest(body) => {
                (body.file_id.clone(), body.file_address.clone(), body.file_part)
            }
            other => (other.file_id().unwrap_or_default().to_string(), String::new(), None),
        };
        ResponseBody::GetFileFinalResponse(GetFileFinalResponse {
            file_id,
            file_address,
            file_part,
        })
    }
}
