//! 请求分发
//!
//! 收到的消息依次经过：解析 → 证书使用授权 → 操作授权 → 处理器。
//! 信任检查失败的请求直接得到失败的最终响应，不会进入处理器。

use crate::handler::{
    default_handlers, process_request, reject_request, OperationFailure, PillarContext,
    RequestHandler,
};
use common::{AlarmCode, BusEnvelope, Request, RequestKind};
use log::{debug, error, warn};
use security::SignerIdentity;
use std::collections::HashMap;
use std::sync::Arc;

pub struct PillarMediator {
    ctx: Arc<PillarContext>,
    handlers: HashMap<RequestKind, Arc<dyn RequestHandler>>,
}

impl PillarMediator {
    pub fn new(ctx: Arc<PillarContext>) -> Self {
        Self::with_handlers(ctx, default_handlers())
    }

    /// 用指定的处理器集合构建；同一种请求后注册的覆盖先注册的
    pub fn with_handlers(ctx: Arc<PillarContext>, handlers: Vec<Arc<dyn RequestHandler>>) -> Self {
        let handlers = handlers
            .into_iter()
            .map(|handler| (handler.kind(), handler))
            .collect();
        PillarMediator { ctx, handlers }
    }

    pub fn context(&self) -> &Arc<PillarContext> {
        &self.ctx
    }

    /// 处理一条收到的消息，阻塞直到最终响应发出
    pub fn handle_envelope(&self, envelope: &BusEnvelope) {
        let request: Request = match serde_json::from_str(&envelope.body) {
            Ok(request) => request,
            Err(e) => {
                let text = format!("could not parse incoming message: {}", e);
                warn!("{}", text);
                self.ctx.alarms.raise(AlarmCode::InvalidMessage, None, None, &text);
                return;
            }
        };

        let kind = request.kind();
        let Some(handler) = self.handlers.get(&kind) else {
            warn!(
                "No handler for {:?} (correlationID={}), ignoring",
                kind, request.header.correlation_id
            );
            return;
        };
        debug!(
            "Received {:?} from '{}' (correlationID={})",
            kind, request.header.from, request.header.correlation_id
        );

        match self.authorize(&request, envelope) {
            Ok(identity) => {
                debug!("{:?} authorized for {}", kind, identity);
                process_request(handler.as_ref(), &request, &self.ctx);
            }
            Err(failure) => {
                warn!(
                    "Rejected {:?} from '{}' (correlationID={}): {}",
                    kind, request.header.from, request.header.correlation_id, failure.text
                );
                reject_request(handler.as_ref(), &request, &self.ctx, failure);
            }
        }
    }

    /// 在阻塞线程池中处理消息，不占用异步运行时的工作线程
    pub async fn dispatch(self: Arc<Self>, envelope: BusEnvelope) {
        let result = tokio::task::spawn_blocking(move || self.handle_envelope(&envelope)).await;
        if let Err(e) = result {
            error!("Request worker terminated abnormally: {}", e);
        }
    }

    fn authorize(
        &self,
        request: &Request,
        envelope: &BusEnvelope,
    ) -> Result<SignerIdentity, OperationFailure> {
        let signature = envelope
            .signature
            .as_deref()
            .map(hex::decode)
            .transpose()
            .map_err(|e| OperationFailure::not_understood(format!("signature is not hex: {}", e)))?;
        let message = envelope.body.as_bytes();
        let security = &self.ctx.security;

        security.authorize_certificate_use(&request.header.from, message, signature.as_deref())?;
        let identity = security.authorize_operation(
            request.kind().operation(),
            message,
            signature.as_deref(),
            request.header.collection_id.as_deref(),
        )?;
        Ok(identity)
    }
}
