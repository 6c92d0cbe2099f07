//! 文件归档
//!
//! 目录布局：
//! ```text
//! <storage_dir>/<collection>/fileDir/<file_id>   已归档的文件
//! <storage_dir>/<collection>/tmpDir/<file_id>    下载中的暂存文件
//! ```
//! 新文件先写入 tmpDir，校验通过后再 rename 到 fileDir，
//! 校验失败的文件不会出现在 fileDir 中。

use super::error::StorageError;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

const FILE_DIR: &str = "fileDir";
const TMP_DIR: &str = "tmpDir";

/// 归档文件的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub file_id: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// 底层文件存储接口
pub trait FileStore: Send + Sync {
    fn has_file(&self, file_id: &str, collection_id: &str) -> Result<bool, StorageError>;

    fn file_info(&self, file_id: &str, collection_id: &str) -> Result<FileInfo, StorageError>;

    fn open_file(&self, file_id: &str, collection_id: &str) -> Result<File, StorageError>;

    /// 集合中所有文件，按文件 ID 排序
    fn list_files(&self, collection_id: &str) -> Result<Vec<FileInfo>, StorageError>;

    /// 可用空间（已扣除保留空间）
    fn size_left(&self, collection_id: &str) -> Result<u64, StorageError>;

    /// 把数据流写入暂存区，返回写入字节数
    fn stage_file(
        &self,
        file_id: &str,
        collection_id: &str,
        source: &mut dyn Read,
    ) -> Result<u64, StorageError>;

    fn open_staged(&self, file_id: &str, collection_id: &str) -> Result<File, StorageError>;

    /// 暂存文件移入归档；目标已存在时失败
    fn commit_staged(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError>;

    /// 用暂存文件替换已归档的文件
    fn replace_with_staged(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError>;

    fn discard_staged(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError>;

    fn delete_file(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError>;
}

/// 检查文件 ID 能否作为单个路径分量使用
pub fn check_file_id(file_id: &str) -> Result<(), StorageError> {
    let reject = |reason: &str| StorageError::InvalidFileId {
        file_id: file_id.to_string(),
        reason: reason.to_string(),
    };
    if file_id.is_empty() {
        return Err(reject("empty"));
    }
    if file_id.contains('\0') {
        return Err(reject("contains NUL"));
    }
    if file_id.contains('/') || file_id.contains('\\') {
        return Err(reject("contains a path separator"));
    }
    let mut components = Path::new(file_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(reject("does not resolve to a file inside the collection")),
    }
}

/// 基于本地目录的参考归档实现
pub struct ReferenceArchive {
    root: PathBuf,
    collections: Vec<String>,
    capacity_bytes: u64,
    minimum_size_left: u64,
}

impl ReferenceArchive {
    /// 创建各集合的目录，并清理上次遗留的暂存文件
    pub fn new(
        root: impl Into<PathBuf>,
        collections: Vec<String>,
        capacity_bytes: u64,
        minimum_size_left: u64,
    ) -> Result<Self, StorageError> {
        let archive = ReferenceArchive {
            root: root.into(),
            collections,
            capacity_bytes,
            minimum_size_left,
        };
        for collection in &archive.collections {
            check_file_id(collection).map_err(|_| {
                StorageError::UnknownCollection(format!("invalid collection directory '{}'", collection))
            })?;
            let base = archive.root.join(collection);
            fs::create_dir_all(base.join(FILE_DIR))?;
            let tmp = base.join(TMP_DIR);
            if tmp.exists() {
                for entry in fs::read_dir(&tmp)? {
                    let entry = entry?;
                    warn!("Removing stale staged file {}", entry.path().display());
                    fs::remove_file(entry.path())?;
                }
            }
            fs::create_dir_all(tmp)?;
        }
        info!(
            "Archive at {} serving {} collection(s)",
            archive.root.display(),
            archive.collections.len()
        );
        Ok(archive)
    }

    fn collection_dir(&self, collection_id: &str) -> Result<PathBuf, StorageError> {
        if !self.collections.iter().any(|c| c == collection_id) {
            return Err(StorageError::UnknownCollection(collection_id.to_string()));
        }
        Ok(self.root.join(collection_id))
    }

    fn archived_path(&self, file_id: &str, collection_id: &str) -> Result<PathBuf, StorageError> {
        check_file_id(file_id)?;
        Ok(self.collection_dir(collection_id)?.join(FILE_DIR).join(file_id))
    }

    fn staged_path(&self, file_id: &str, collection_id: &str) -> Result<PathBuf, StorageError> {
        check_file_id(file_id)?;
        Ok(self.collection_dir(collection_id)?.join(TMP_DIR).join(file_id))
    }

    fn used_bytes(&self) -> Result<u64, StorageError> {
        let mut used = 0u64;
        for collection in &self.collections {
            for info in self.list_files(collection)? {
                used = used.saturating_add(info.size);
            }
        }
        Ok(used)
    }
}

fn info_from_metadata(file_id: &str, metadata: &fs::Metadata) -> Result<FileInfo, StorageError> {
    let modified: DateTime<Utc> = metadata.modified()?.into();
    Ok(FileInfo {
        file_id: file_id.to_string(),
        size: metadata.len(),
        last_modified: modified,
    })
}

impl FileStore for ReferenceArchive {
    fn has_file(&self, file_id: &str, collection_id: &str) -> Result<bool, StorageError> {
        Ok(self.archived_path(file_id, collection_id)?.is_file())
    }

    fn file_info(&self, file_id: &str, collection_id: &str) -> Result<FileInfo, StorageError> {
        let path = self.archived_path(file_id, collection_id)?;
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => info_from_metadata(file_id, &metadata),
            Ok(_) => Err(StorageError::not_found(file_id, collection_id)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::not_found(file_id, collection_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn open_file(&self, file_id: &str, collection_id: &str) -> Result<File, StorageError> {
        let path = self.archived_path(file_id, collection_id)?;
        File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::not_found(file_id, collection_id),
            _ => e.into(),
        })
    }

    fn list_files(&self, collection_id: &str) -> Result<Vec<FileInfo>, StorageError> {
        let dir = self.collection_dir(collection_id)?.join(FILE_DIR);
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => files.push(info_from_metadata(&name, &metadata)?),
                Err(name) => warn!("Skipping non UTF-8 file name {:?}", name),
            }
        }
        files.sort_by(|a, b| a.file_id.cmp(&b.file_id));
        Ok(files)
    }

    fn size_left(&self, collection_id: &str) -> Result<u64, StorageError> {
        self.collection_dir(collection_id)?;
        Ok(self
            .capacity_bytes
            .saturating_sub(self.used_bytes()?)
            .saturating_sub(self.minimum_size_left))
    }

    fn stage_file(
        &self,
        file_id: &str,
        collection_id: &str,
        source: &mut dyn Read,
    ) -> Result<u64, StorageError> {
        let path = self.staged_path(file_id, collection_id)?;
        let mut target = File::create(&path)?;
        let written = match io::copy(source, &mut target).and_then(|n| {
            target.flush()?;
            target.sync_all()?;
            Ok(n)
        }) {
            Ok(n) => n,
            Err(e) => {
                drop(target);
                let _ = fs::remove_file(&path);
                return Err(e.into());
            }
        };
        debug!("Staged {} bytes for {}/{}", written, collection_id, file_id);
        Ok(written)
    }

    fn open_staged(&self, file_id: &str, collection_id: &str) -> Result<File, StorageError> {
        Ok(File::open(self.staged_path(file_id, collection_id)?)?)
    }

    fn commit_staged(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        let target = self.archived_path(file_id, collection_id)?;
        if target.exists() {
            return Err(StorageError::already_exists(file_id, collection_id));
        }
        fs::rename(self.staged_path(file_id, collection_id)?, &target)?;
        info!("Archived {}/{}", collection_id, file_id);
        Ok(())
    }

    fn replace_with_staged(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        let target = self.archived_path(file_id, collection_id)?;
        if !target.is_file() {
            return Err(StorageError::not_found(file_id, collection_id));
        }
        fs::rename(self.staged_path(file_id, collection_id)?, &target)?;
        info!("Replaced {}/{}", collection_id, file_id);
        Ok(())
    }

    fn discard_staged(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.staged_path(file_id, collection_id)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_file(&self, file_id: &str, collection_id: &str) -> Result<(), StorageError> {
        let path = self.archived_path(file_id, collection_id)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::not_found(file_id, collection_id),
            _ => e.into(),
        })?;
        info!("Deleted {}/{}", collection_id, file_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn archive(dir: &TempDir, capacity: u64) -> ReferenceArchive {
        ReferenceArchive::new(dir.path(), vec!["books".to_string()], capacity, 0).unwrap()
    }

    #[test]
    fn test_file_id_must_stay_inside_collection() {
        assert!(check_file_id("doc1").is_ok());
        assert!(check_file_id("report.2024.pdf").is_ok());
        for bad in ["", "..", ".", "../etc/passwd", "/etc/passwd", "a/b", "a\\b", "x\0y"] {
            assert!(
                matches!(check_file_id(bad), Err(StorageError::InvalidFileId { .. })),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_stage_commit_delete() {
        let dir = TempDir::new().unwrap();
        let archive = archive(&dir, u64::MAX);

        let written = archive
            .stage_file("doc1", "books", &mut &b"hello world"[..])
            .unwrap();
        assert_eq!(written, 11);
        assert!(!archive.has_file("doc1", "books").unwrap());

        archive.commit_staged("doc1", "books").unwrap();
        assert!(archive.has_file("doc1", "books").unwrap());
        assert_eq!(archive.file_info("doc1", "books").unwrap().size, 11);

        archive.stage_file("doc1", "books", &mut &b"again"[..]).unwrap();
        assert!(matches!(
            archive.commit_staged("doc1", "books"),
            Err(StorageError::AlreadyExists { .. })
        ));
        archive.discard_staged("doc1", "books").unwrap();

        archive.delete_file("doc1", "books").unwrap();
        assert!(matches!(
            archive.delete_file("doc1", "books"),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_size_left_counts_archived_files() {
        let dir = TempDir::new().unwrap();
        let archive = archive(&dir, 100);
        assert_eq!(archive.size_left("books").unwrap(), 100);

        archive.stage_file("doc1", "books", &mut &[0u8; 40][..]).unwrap();
        archive.commit_staged("doc1", "books").unwrap();
        assert_eq!(archive.size_left("books").unwrap(), 60);
        assert!(matches!(
            archive.size_left("films"),
            Err(StorageError::UnknownCollection(_))
        ));
    }

    #[test]
    fn test_stale_staged_files_are_removed() {
        let dir = TempDir::new().unwrap();
        {
            let archive = archive(&dir, u64::MAX);
            archive.stage_file("half", "books", &mut &b"partial"[..]).unwrap();
        }
        let archive = archive(&dir, u64::MAX);
        assert!(archive.open_staged("half", "books").is_err());
    }
}
