//! Pillar：比特保存系统的存储节点
//!
//! - `storage`: 归档、校验和、存储模型
//! - `handler`: 每种请求的处理器以及协议状态
//! - `mediator`: 信任检查 + 请求分发
//! - `service`: TCP JSON-lines 消息服务

pub mod alarm;
pub mod audit;
pub mod bus;
pub mod error;
pub mod exchange;
pub mod handler;
pub mod locks;
pub mod mediator;
pub mod pillar;
pub mod service;
pub mod storage;

pub use error::PillarError;
pub use handler::{OperationFailure, PillarContext, RequestHandler, ResponseChannel};
pub use mediator::PillarMediator;
pub use pillar::{Pillar, PillarParts};
