use super::validation::validate_collection;
use super::{OperationFailure, PillarContext, RequestHandler, ResponseChannel};
use chrono::Utc;
use common::messages::{Empty, GetStatusFinalResponse, ResultingStatus, StatusCode};
use common::{Request, RequestBody, RequestKind, ResponseBody};

/// 请求中的 contributor 必须是本节点
pub(crate) fn validate_contributor(
    ctx: &PillarContext,
    contributor: &str,
) -> Result<(), OperationFailure> {
    if contributor != ctx.pillar_id() {
        return Err(OperationFailure::not_understood(format!(
            "request is addressed to contributor '{}', this is '{}'",
            contributor,
            ctx.pillar_id()
        )));
    }
    Ok(())
}

pub struct GetStatusHandler;

impl RequestHandler for GetStatusHandler {
    fn kind(&self) -> RequestKind {
        RequestKind::GetStatus
    }

    fn handle(
        &self,
        request: &Request,
        ctx: &PillarContext,
        channel: &mut ResponseChannel<'_>,
    ) -> Result<(), OperationFailure> {
        let RequestBody::GetStatusRequest(body) = &request.body else {
            return Err(OperationFailure::unexpected_body(self.kind()));
        };
        validate_contributor(ctx, &body.contributor)?;
        if request.header.collection_id.is_some() {
            validate_collection(ctx, request)?;
        }

        channel.send_progress(ResponseBody::GetStatusProgressResponse(Empty {}))?;

        let now = Utc::now();
        let uptime = now.signed_duration_since(ctx.started_at);
        let status = ResultingStatus {
            status_code: StatusCode::Ok,
            status_text: format!(
                "Pillar '{}' up for {}s, serving {} collection(s)",
                ctx.pillar_id(),
                uptime.num_seconds(),
                ctx.settings.collections.len()
            ),
            status_timestamp: now,
        };
        channel.complete(ResponseBody::GetStatusFinalResponse(GetStatusFinalResponse {
            resulting_status: Some(status),
        }))
    }

    fn failure_body(&self, _request: &Request) -> ResponseBody {
        ResponseBody::GetStatusFinalResponse(GetStatusFinalResponse {
            resulting_status: None,
        })
    }
}
