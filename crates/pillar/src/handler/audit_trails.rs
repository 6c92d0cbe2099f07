use super::status::validate_contributor;
use super::validation::{effective_max_results, validate_collection};
use super::{OperationFailure, PillarContext, RequestHandler, ResponseChannel};
use crate::audit::AuditQuery;
use common::messages::{GetAuditTrailsFinalResponse, ListingProgress, ResultingAuditTrails};
use common::{FileIds, Request, RequestBody, RequestKind, ResponseBody};
use log::info;

/// GetAuditTrails：按集合、文件、序号和时间筛选审计事件
pub struct GetAuditTrailsHandler;

impl RequestHandler for GetAuditTrailsHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::GetAuditTrails
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::GetAuditTrailsRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        let collection_id = validate_collection(ctx, request)?;
        validate_contributor(ctx, &body.contributor)?;

        channel.send_progress(ResponseBody::GetAuditTrailsProgressResponse(ListingProgress {
            file_ids: body.file_id.clone().map(FileIds::FileId),
            result_address: body.result_address.clone(),
        }))?;

        let query = AuditQuery {
            collection_id: Some(collection_id.to_string()),
            file_id: body.file_id.clone(),
            min_sequence_number: body.min_sequence_number,
            max_sequence_number: body.max_sequence_number,
            min_timestamp: body.min_timestamp,
            max_timestamp: body.max_timestamp,
            max_results: effective_max_results(ctx, body.max_number_of_results),
        };
        let page = ctx.audit.get_audit_events(&query);
        let delivered = page.events.len();

        let resulting = match &body.result_address {
            Some(address) => {
                let payload = serde_json::to_vec_pretty(&page.events).map_err(|e| {
                    OperationFailure::internal(format!("cannot serialize audit trail: {}", e))
                })?;
                ctx.exchange.upload(&mut payload.as_slice(), address)?;
                ResultingAuditTrails {
                    result_address: Some(address.clone()),
                    audit_trail_events: Vec::new(),
                }
            }
            None => ResultingAuditTrails {
                result_address: None,
                audit_trail_events: page.events,
            },
        };
        info!(
            "Delivered {} audit event(s) for collection {} to {}",
            delivered, collection_id, request.header.from
        );

        channel.complete(ResponseBody::GetAuditTrailsFinalResponse(GetAuditTrailsFinalResponse {
            resulting_audit_trails: Some(resulting),
            partial_result: page.more_available,
        }))
    }

    fn failure_body(&self, _request: &Request) -> ResponseBody {
        ResponseBody::GetAuditTrailsFinalResponse(GetAuditTrailsFinalResponse {
            resulting_audit_trails: None,
            partial_result: false,
        })
    }
}
