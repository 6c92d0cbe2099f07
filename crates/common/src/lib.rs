pub mod messages;
pub mod settings;
pub mod types;

// Re-export commonly used types
pub use messages::{
    AlarmMessage, BusEnvelope, Request, RequestBody, RequestHeader, RequestKind, Response,
    ResponseBody, ResponseHeader,
};
pub use settings::{
    OperationPermission, Permission, PermissionSet, PillarSettings, SecuritySettings,
    SettingsError, TrustMode,
};
pub use types::{
    Alarm, AlarmCode, AllowedOperation, AuditEvent, ChecksumData, ChecksumSpec, FileAction,
    FileIds, FilePart, OperationType, ResponseCode, ResponseInfo,
};
