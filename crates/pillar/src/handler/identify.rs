//! 识别请求
//!
//! 客户端先广播识别请求，再把操作请求发给回答了 IDENTIFICATION_POSITIVE
//! 的节点。识别阶段只做检查，不修改任何状态。

use super::validation::{
    validate_checksum_spec, validate_collection, validate_file_id, validate_pillar_id,
    verify_file_exists, verify_space,
};
use super::{OperationFailure, PillarContext, RequestHandler, ResponseChannel};
use common::messages::{IdentifyFileResponse, IdentifyListingResponse};
use common::{FileIds, Request, RequestBody, RequestKind, ResponseBody, ResponseCode, ResponseInfo};
use log::debug;

fn identified(
    ctx: &PillarContext,
    request: &Request,
    channel: &mut ResponseChannel<'_>,
    body: ResponseBody,
) -> Result<(), OperationFailure> {
    debug!(
        "Identified for {:?} (correlationID={})",
        request.kind(),
        request.header.correlation_id
    );
    channel.send_final(
        ResponseInfo::new(
            ResponseCode::IdentificationPositive,
            format!("Pillar '{}' can handle the request", ctx.pillar_id()),
        ),
        body,
    )
}

fn file_response(ctx: &PillarContext, file_id: Option<&str>) -> IdentifyFileResponse {
    IdentifyFileResponse {
        file_id: file_id.map(str::to_string),
        time_to_deliver_millis: ctx.time_to_deliver(),
        checksum_data_for_existing_file: None,
    }
}

fn listing_response(ctx: &PillarContext, file_ids: Option<&FileIds>) -> IdentifyListingResponse {
    IdentifyListingResponse {
        file_ids: file_ids.cloned(),
        time_to_deliver_millis: ctx.time_to_deliver(),
    }
}

/// 单个文件的识别检查：集合、文件 ID、文件存在
fn identify_existing_file<'r>(
    ctx: &PillarContext,
    request: &'r Request,
    file_id: &str,
) -> Result<&'r str, OperationFailure> {
    let collection_id = validate_collection(ctx, request)?;
    validate_pillar_id(ctx, request, false)?;
    validate_file_id(ctx, file_id)?;
    verify_file_exists(ctx, collection_id, file_id)?;
    Ok(collection_id)
}

/// 列表类请求的识别检查：指定单个文件时该文件必须存在
fn identify_selection(
    ctx: &PillarContext,
    request: &Request,
    file_ids: &FileIds,
) -> Result<(), OperationFailure> {
    let collection_id = validate_collection(ctx, request)?;
    validate_pillar_id(ctx, request, false)?;
    if let Some(file_id) = file_ids.single_file() {
        validate_file_id(ctx, file_id)?;
        verify_file_exists(ctx, collection_id, file_id)?;
    }
    Ok(())
}

pub struct IdentifyForGetFileHandler;

impl RequestHandler for IdentifyForGetFileHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::IdentifyPillarsForGetFile
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::IdentifyPillarsForGetFileRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        identify_existing_file(ctx, request, &body.file_id)?;
        let response = file_response(ctx, Some(&body.file_id));
        identified(ctx, request, channel, ResponseBody::IdentifyPillarsForGetFileResponse(response))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        ResponseBody::IdentifyPillarsForGetFileResponse(IdentifyFileResponse {
            file_id: request.body.file_id().map(str::to_string),
            ..Default::default()
        })
    }
}

/// PutFile 识别：文件已存在时回答 DUPLICATE_FILE_FAILURE 并附上现有文件的校验和，
/// 客户端据此判断是否已经存过同样的内容
pub struct IdentifyForPutFileHandler;

impl RequestHandler for IdentifyForPutFileHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::IdentifyPillarsForPutFile
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::IdentifyPillarsForPutFileRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        let collection_id = validate_collection(ctx, request)?;
        validate_pillar_id(ctx, request, false)?;

        if let Some(file_id) = body.file_id.as_deref() {
            validate_file_id(ctx, file_id)?;
            if ctx.model.has_file(file_id, collection_id)? {
                let existing = ctx.model.checksum_data(file_id, collection_id, None)?;
                return channel.send_final(
                    ResponseInfo::new(
                        ResponseCode::DuplicateFileFailure,
                        format!("file '{}' already exists", file_id),
                    ),
                    ResponseBody::IdentifyPillarsForPutFileResponse(IdentifyFileResponse {
                        file_id: Some(file_id.to_string()),
                        time_to_deliver_millis: ctx.time_to_deliver(),
                        checksum_data_for_existing_file: Some(existing),
                    }),
                );
            }
        }
        verify_space(ctx, collection_id, body.file_size, 0)?;

        let response = file_response(ctx, body.file_id.as_deref());
        identified(ctx, request, channel, ResponseBody::IdentifyPillarsForPutFileResponse(response))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        ResponseBody::IdentifyPillarsForPutFileResponse(IdentifyFileResponse {
            file_id: request.body.file_id().map(str::to_string),
            ..Default::default()
        })
    }
}

pub struct IdentifyForDeleteFileHandler;

impl RequestHandler for IdentifyForDeleteFileHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::IdentifyPillarsForDeleteFile
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::IdentifyPillarsForDeleteFileRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        identify_existing_file(ctx, request, &body.file_id)?;
        let response = file_response(ctx, Some(&body.file_id));
        identified(ctx, request, channel, ResponseBody::IdentifyPillarsForDeleteFileResponse(response))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        ResponseBody::IdentifyPillarsForDeleteFileResponse(IdentifyFileResponse {
            file_id: request.body.file_id().map(str::to_string),
            ..Default::default()
        })
    }
}

pub struct IdentifyForReplaceFileHandler;

impl RequestHandler for IdentifyForReplaceFileHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::IdentifyPillarsForReplaceFile
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::IdentifyPillarsForReplaceFileRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        let collection_id = identify_existing_file(ctx, request, &body.file_id)?;
        let old_size = ctx.model.file_info(&body.file_id, collection_id)?.size;
        verify_space(ctx, collection_id, body.file_size, old_size)?;

        let response = file_response(ctx, Some(&body.file_id));
        identified(ctx, request, channel, ResponseBody::IdentifyPillarsForReplaceFileResponse(response))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        ResponseBody::IdentifyPillarsForReplaceFileResponse(IdentifyFileResponse {
            file_id: request.body.file_id().map(str::to_string),
            ..Default::default()
        })
    }
}

pub struct IdentifyForGetChecksumsHandler;

impl RequestHandler for IdentifyForGetChecksumsHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::IdentifyPillarsForGetChecksums
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::IdentifyPillarsForGetChecksumsRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        if let Some(spec) = &body.checksum_request_for_existing_file {
            validate_checksum_spec(spec)?;
        }
        identify_selection(ctx, request, &body.file_ids)?;

        let response = listing_response(ctx, Some(&body.file_ids));
        identified(ctx, request, channel, ResponseBody::IdentifyPillarsForGetChecksumsResponse(response))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        let file_ids = match &request.body {
            RequestBody::IdentifyPillarsForGetChecksumsRequest(body) => Some(body.file_ids.clone()),
            _ => None,
        };
        ResponseBody::IdentifyPillarsForGetChecksumsResponse(IdentifyListingResponse {
            file_ids,
            time_to_deliver_millis: 0,
        })
    }
}

pub struct IdentifyForGetFileIdsHandler;

impl RequestHandler for IdentifyForGetFileIdsHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::IdentifyPillarsForGetFileIds
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::IdentifyPillarsForGetFileIdsRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        identify_selection(ctx, request, &body.file_ids)?;

        let response = listing_response(ctx, Some(&body.file_ids));
        identified(ctx, request, channel, ResponseBody::IdentifyPillarsForGetFileIdsResponse(response))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        let file_ids = match &request.body {
            RequestBody::IdentifyPillarsForGetFileIdsRequest(body) => Some(body.file_ids.clone()),
            _ => None,
        };
        ResponseBody::IdentifyPillarsForGetFileIdsResponse(IdentifyListingResponse {
            file_ids,
            time_to_deliver_millis: 0,
        })
    }
}

/// 状态识别：节点总是可以报告自己的状态
pub struct IdentifyForGetStatusHandler;

impl RequestHandler for IdentifyForGetStatusHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::IdentifyContributorsForGetStatus
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let response = listing_response(ctx, None);
        identified(ctx, request, channel, ResponseBody::IdentifyContributorsForGetStatusResponse(response))
    }

    fn failure_body(&self, _request: &Request) -> ResponseBody {
        ResponseBody::IdentifyContributorsForGetStatusResponse(IdentifyListingResponse::default())
    }
}

pub struct IdentifyForGetAuditTrailsHandler;

impl RequestHandler for IdentifyForGetAuditTrailsHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::IdentifyContributorsForGetAuditTrails
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        validate_collection(ctx, request)?;
        let response = listing_response(ctx, None);
        identified(
            ctx,
            request,
            channel,
            ResponseBody::IdentifyContributorsForGetAuditTrailsResponse(response),
        )
    }

    fn failure_body(&self, _request: &Request) -> ResponseBody {
        ResponseBody::IdentifyContributorsForGetAuditTrailsResponse(IdentifyListingResponse::default())
    }
}
