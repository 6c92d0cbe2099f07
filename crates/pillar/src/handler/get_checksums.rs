use super::validation::{
    effective_max_results, in_time_range, validate_checksum_spec, validate_collection,
    validate_file_id, validate_pillar_id, verify_file_exists,
};
use super::{OperationFailure, PillarContext, RequestHandler, ResponseChannel};
use crate::storage::StorageError;
use common::messages::{
    ChecksumDataForChecksumSpec, GetChecksumsFinalResponse, ListingProgress, ResultingChecksums,
};
use common::{FileAction, FileIds, Request, RequestBody, RequestKind, ResponseBody};
use log::{debug, info};

/// GetChecksums：按请求的规格（缺省为默认规格）计算校验和
///
/// 结果按计算时间排序，超出上限时截断并标记 `partial_result`。
/// 给出 `result_address` 时结果以 JSON 上传，响应里只带地址。
pub struct GetChecksumsHandler;

impl RequestHandler for GetChecksumsHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::GetChecksums
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::GetChecksumsRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };

        let collection_id = validate_collection(ctx, request)?;
        validate_pillar_id(ctx, request, true)?;
        let spec = body
            .checksum_request_for_existing_file
            .clone()
            .unwrap_or_else(|| ctx.model.default_spec().clone());
        validate_checksum_spec(&spec)?;
        if let Some(file_id) = body.file_ids.single_file() {
            validate_file_id(ctx, file_id)?;
            verify_file_exists(ctx, collection_id, file_id)?;
        }

        channel.send_progress(ResponseBody::GetChecksumsProgressResponse(ListingProgress {
            file_ids: Some(body.file_ids.clone()),
            result_address: body.result_address.clone(),
        }))?;

        let file_ids: Vec<String> = match &body.file_ids {
            FileIds::FileId(file_id) => vec![file_id.clone()],
            FileIds::AllFileIds => ctx
                .model
                .list_files(collection_id)?
                .into_iter()
                .map(|info| info.file_id)
                .collect(),
        };

        let mut items = Vec::with_capacity(file_ids.len());
        for file_id in file_ids {
            let data = match ctx.model.checksum_data(&file_id, collection_id, Some(&spec)) {
                Ok(data) => data,
                // 列出之后被删除的文件
                Err(StorageError::NotFound { .. }) if body.file_ids == FileIds::AllFileIds => {
                    debug!("{}/{} disappeared while listing checksums", collection_id, file_id);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if !in_time_range(data.calculation_timestamp, body.min_timestamp, body.max_timestamp) {
                continue;
            }
            items.push(ChecksumDataForChecksumSpec {
                file_id,
                checksum_value: data.checksum_value,
                calculation_timestamp: data.calculation_timestamp,
            });
        }
        items.sort_by(|a, b| {
            a.calculation_timestamp
                .cmp(&b.calculation_timestamp)
                .then_with(|| a.file_id.cmp(&b.file_id))
        });

        let max_results = effective_max_results(ctx, body.max_number_of_results);
        let partial_result = items.len() > max_results;
        items.truncate(max_results);
        let delivered = items.len();

        let resulting_checksums = match &body.result_address {
            Some(address) => {
                let payload = serde_json::to_vec_pretty(&items).map_err(|e| {
                    OperationFailure::internal(format!("cannot serialize checksums: {}", e))
                })?;
                ctx.exchange.upload(&mut payload.as_slice(), address)?;
                ResultingChecksums {
                    result_address: Some(address.clone()),
                    checksum_data_items: Vec::new(),
                }
            }
            None => ResultingChecksums {
                result_address: None,
                checksum_data_items: items,
            },
        };
        ctx.record_audit(
            request,
            collection_id,
            body.file_ids.single_file(),
            FileAction::GetChecksums,
            &format!("Delivered {} {} checksum(s)", delivered, spec),
        );
        info!(
            "Delivered {} checksum(s) for collection {} (partial={})",
            delivered, collection_id, partial_result
        );

        channel.complete(ResponseBody::GetChecksumsFinalResponse(GetChecksumsFinalResponse {
            file_ids: body.file_ids.clone(),
            checksum_request_for_existing_file: Some(spec),
            resulting_checksums: Some(resulting_checksums),
            partial_result,
        }))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        let (file_ids, spec) = match &request.body {
            RequestBody::GetChecksumsRequest(body) => (
                body.file_ids.clone(),
                body.checksum_request_for_existing_file.clone(),
            ),
            _ => (FileIds::AllFileIds, None),
        };
        ResponseBody::GetChecksumsFinalResponse(GetChecksumsFinalResponse {
            file_ids,
            checksum_request_for_existing_file: spec,
            resulting_checksums: None,
            partial_result: false,
        })
    }
}
