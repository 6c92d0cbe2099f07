//! TCP 消息服务
//!
//! 每行一个 JSON 帧：
//! ```text
//! {"frame":"subscribe","topic":"client-1"}
//! {"frame":"message","destination":"pillar-1","envelope":{"body":"...","signature":"..."}}
//! ```
//! 发往本节点主题的消息交给 mediator，其余消息转发给订阅了该主题的连接。
//! 节点自己发出的响应和告警也按目的地转发。

use crate::bus::OutboundMessage;
use crate::error::PillarError;
use crate::mediator::PillarMediator;
use crate::pillar::Pillar;
use common::BusEnvelope;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "camelCase")]
pub enum Frame {
    Subscribe {
        topic: String,
    },
    Message {
        destination: String,
        envelope: BusEnvelope,
    },
}

/// 主题 → 订阅连接
#[derive(Clone, Default)]
pub struct Router {
    routes: Arc<Mutex<HashMap<String, Vec<UnboundedSender<String>>>>>,
}

impl Router {
    pub fn subscribe(&self, topic: String, sender: UnboundedSender<String>) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.entry(topic).or_default().push(sender);
    }

    /// 转发给所有订阅者，返回送达的连接数；已关闭的连接顺便移除
    pub fn publish(&self, message: OutboundMessage) -> usize {
        let OutboundMessage {
            destination,
            envelope,
        } = message;
        let frame = Frame::Message {
            destination: destination.clone(),
            envelope,
        };
        let line = match serde_json::to_string(&frame) {
            Ok(line) => line,
            Err(e) => {
                warn!("Cannot encode frame for '{}': {}", destination, e);
                return 0;
            }
        };

        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = routes.get_mut(&destination) else {
            debug!("No subscriber for '{}', dropping message", destination);
            return 0;
        };
        subscribers.retain(|sender| sender.send(line.clone()).is_ok());
        subscribers.len()
    }
}

/// 绑定地址并运行服务，直到监听出错
pub async fn run(
    pillar: Pillar,
    outbound: UnboundedReceiver<OutboundMessage>,
    listen_addr: &str,
) -> Result<(), PillarError> {
    let listener = TcpListener::bind(listen_addr).await?;
    info!(
        "Pillar '{}' listening on {}",
        pillar.id(),
        listener.local_addr()?
    );
    serve(listener, pillar, outbound).await
}

pub async fn serve(
    listener: TcpListener,
    pillar: Pillar,
    mut outbound: UnboundedReceiver<OutboundMessage>,
) -> Result<(), PillarError> {
    let router = Router::default();
    let mediator = pillar.mediator();
    let local_topics: Arc<HashSet<String>> = Arc::new(pillar.topics().into_iter().collect());

    let pump = router.clone();
    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            pump.publish(message);
        }
        debug!("Outbound channel closed");
    });

    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Connection from {}", peer);
        tokio::spawn(handle_connection(
            stream,
            peer,
            router.clone(),
            Arc::clone(&mediator),
            Arc::clone(&local_topics),
        ));
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    mediator: Arc<PillarMediator>,
    local_topics: Arc<HashSet<String>>,
) {
    let (reader, mut writer) = stream.into_split();
    let (sender, mut receiver) = mpsc::unbounded_channel::<String>();

    let writer_task = tokio::spawn(async move {
        while let Some(line) = receiver.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err()
                || writer.write_all(b"\n").await.is_err()
            {
                break;
            }
        }
    });

    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Read from {} failed: {}", peer, e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Frame>(&line) {
            Ok(Frame::Subscribe { topic }) => {
                debug!("{} subscribed to '{}'", peer, topic);
                router.subscribe(topic, sender.clone());
            }
            Ok(Frame::Message {
                destination,
                envelope,
            }) if local_topics.contains(&destination) => {
                tokio::spawn(Arc::clone(&mediator).dispatch(envelope));
            }
            Ok(Frame::Message {
                destination,
                envelope,
            }) => {
                router.publish(OutboundMessage {
                    destination,
                    envelope,
                });
            }
            Err(e) => warn!("Malformed frame from {}: {}", peer, e),
        }
    }

    writer_task.abort();
    info!("Connection from {} closed", peer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ChannelMessageBus;
    use common::messages::{GetStatusRequest, StatusCode};
    use common::{PillarSettings, Request, RequestBody, RequestHeader, Response, ResponseBody, ResponseCode};
    use tempfile::TempDir;

    #[test]
    fn test_router_drops_closed_subscribers() {
        let router = Router::default();
        let (live, mut live_rx) = mpsc::unbounded_channel();
        let (closed, closed_rx) = mpsc::unbounded_channel();
        drop(closed_rx);
        router.subscribe("client".to_string(), live);
        router.subscribe("client".to_string(), closed);

        let delivered = router.publish(OutboundMessage {
            destination: "client".to_string(),
            envelope: BusEnvelope {
                body: "{}".to_string(),
                signature: None,
            },
        });
        assert_eq!(delivered, 1);
        let line = live_rx.try_recv().unwrap();
        let frame: Frame = serde_json::from_str(&line).unwrap();
        assert!(matches!(frame, Frame::Message { destination, .. } if destination == "client"));

        assert_eq!(
            router.publish(OutboundMessage {
                destination: "nobody".to_string(),
                envelope: BusEnvelope {
                    body: "{}".to_string(),
                    signature: None,
                },
            }),
            0
        );
    }

    #[tokio::test]
    async fn test_status_over_tcp() {
        println!("\n=== 测试 TCP 上的状态查询 ===");
        let dir = TempDir::new().unwrap();
        let settings = PillarSettings::new(
            "pillar-1",
            vec!["books".to_string()],
            dir.path().to_path_buf(),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let pillar = Pillar::new(settings, Arc::new(ChannelMessageBus::new(tx))).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, pillar, rx));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let subscribe = serde_json::to_string(&Frame::Subscribe {
            topic: "client-1".to_string(),
        })
        .unwrap();
        writer.write_all(format!("{}\n", subscribe).as_bytes()).await.unwrap();

        let request = Request {
            header: RequestHeader {
                correlation_id: "status-1".to_string(),
                collection_id: None,
                pillar_id: None,
                reply_to: "client-1".to_string(),
                from: "client-1".to_string(),
                destination: Some("pillar-1".to_string()),
                audit_trail_information: None,
            },
            body: RequestBody::GetStatusRequest(GetStatusRequest {
                contributor: "pillar-1".to_string(),
            }),
        };
        let frame = Frame::Message {
            destination: "pillar-1".to_string(),
            envelope: BusEnvelope {
                body: serde_json::to_string(&request).unwrap(),
                signature: None,
            },
        };
        writer
            .write_all(format!("{}\n", serde_json::to_string(&frame).unwrap()).as_bytes())
            .await
            .unwrap();

        let mut lines = BufReader::new(reader).lines();
        let mut codes = Vec::new();
        while codes.len() < 2 {
            let line = lines.next_line().await.unwrap().unwrap();
            let Frame::Message { envelope, .. } = serde_json::from_str(&line).unwrap() else {
                panic!("unexpected frame {}", line);
            };
            let response: Response = serde_json::from_str(&envelope.body).unwrap();
            assert_eq!(response.header.correlation_id, "status-1");
            if let ResponseBody::GetStatusFinalResponse(body) = &response.body {
                assert_eq!(body.resulting_status.as_ref().unwrap().status_code, StatusCode::Ok);
            }
            codes.push(response.response_code());
        }
        assert_eq!(
            codes,
            vec![ResponseCode::OperationAcceptedProgress, ResponseCode::OperationCompleted]
        );
        println!("✓ 进度响应 + 最终响应");
    }
}
