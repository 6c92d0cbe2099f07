/// 存储协作者
///
/// - `archive`: 文件的读写、暂存与移动
/// - `checksum`: 校验和算法与默认校验和缓存
/// - `model`: 处理器使用的组合接口
pub mod archive;
pub mod checksum;
pub mod error;
pub mod model;

pub use archive::{check_file_id, FileInfo, FileStore, ReferenceArchive};
pub use checksum::{
    checksums_match, compute_digest, verify_algorithm_supported, ChecksumAlgorithm, ChecksumEntry,
    ChecksumStore,
};
pub use error::{ChecksumError, StorageError};
pub use model::StorageModel;
