use super::validation::{
    effective_max_results, in_time_range, validate_collection, validate_file_id,
    validate_pillar_id, verify_file_exists,
};
use super::{OperationFailure, PillarContext, RequestHandler, ResponseChannel};
use common::messages::{FileIdsDataItem, GetFileIdsFinalResponse, ListingProgress, ResultingFileIds};
use common::{FileAction, FileIds, Request, RequestBody, RequestKind, ResponseBody};
use log::info;

/// GetFileIDs：列出文件及其修改时间和大小，按修改时间排序
pub struct GetFileIdsHandler;

impl RequestHandler for GetFileIdsHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::GetFileIds
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::GetFileIdsRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };

        let collection_id = validate_collection(ctx, request)?;
        validate_pillar_id(ctx, request, true)?;
        if let Some(file_id) = body.file_ids.single_file() {
            validate_file_id(ctx, file_id)?;
            verify_file_exists(ctx, collection_id, file_id)?;
        }

        channel.send_progress(ResponseBody::GetFileIdsProgressResponse(ListingProgress {
            file_ids: Some(body.file_ids.clone()),
            result_address: body.result_address.clone(),
        }))?;

        let files = match &body.file_ids {
            FileIds::FileId(file_id) => vec![ctx.model.file_info(file_id, collection_id)?],
            FileIds::AllFileIds => ctx.model.list_files(collection_id)?,
        };
        let mut items: Vec<FileIdsDataItem> = files
            .into_iter()
            .filter(|info| in_time_range(info.last_modified, body.min_timestamp, body.max_timestamp))
            .map(|info| FileIdsDataItem {
                file_id: info.file_id,
                last_modification_time: info.last_modified,
                file_size: info.size,
            })
            .collect();
        items.sort_by(|a, b| {
            a.last_modification_time
                .cmp(&b.last_modification_time)
                .then_with(|| a.file_id.cmp(&b.file_id))
        });

        let max_results = effective_max_results(ctx, body.max_number_of_results);
        let partial_result = items.len() > max_results;
        items.truncate(max_results);
        let delivered = items.len();

        let resulting_file_ids = match &body.result_address {
            Some(address) => {
                let payload = serde_json::to_vec_pretty(&items).map_err(|e| {
                    OperationFailure::internal(format!("cannot serialize file ids: {}", e))
                })?;
                ctx.exchange.upload(&mut payload.as_slice(), address)?;
                ResultingFileIds {
                    result_address: Some(address.clone()),
                    file_ids_data: Vec::new(),
                }
            }
            None => ResultingFileIds {
                result_address: None,
                file_ids_data: items,
            },
        };
        ctx.record_audit(
            request,
            collection_id,
            body.file_ids.single_file(),
            FileAction::GetFileIds,
            &format!("Delivered {} file id(s)", delivered),
        );
        info!(
            "Delivered {} file id(s) for collection {} (partial={})",
            delivered, collection_id, partial_result
        );

        channel.complete(ResponseBody::GetFileIdsFinalResponse(GetFileIdsFinalResponse {
            file_ids: body.file_ids.clone(),
            resulting_file_ids: Some(resulting_file_ids),
            partial_result,
        }))
    }

    fn failure_body(&self, request: &Request) -> ResponseBody {
        let file_ids = match &request.body {
            RequestBody::GetFileIdsRequest(body) => body.file_ids.clone(),
            _ => FileIds::AllFileIds,
        };
        ResponseBody::GetFileIdsFinalResponse(GetFileIdsFinalResponse {
            file_ids,
            resulting_file_ids: None,
            partial_result: false,
        })
    }
}
