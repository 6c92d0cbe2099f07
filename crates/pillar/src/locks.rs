//! 按 (集合, 文件 ID) 加锁
//!
//! 固定数量的互斥锁分片，键哈希到分片；不同文件可能落在同一分片上。
//! 一个请求最多持有一把锁。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard, PoisonError};

const DEFAULT_SHARDS: usize = 64;

pub struct FileLockTable {
    shards: Vec<Mutex<()>>,
}

pub struct FileLockGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl FileLockTable {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    pub fn with_shards(shards: usize) -> Self {
        FileLockTable {
            shards: (0..shards.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    /// 阻塞直到拿到锁，guard 释放时解锁
    pub fn lock(&self, collection_id: &str, file_id: &str) -> FileLockGuard<'_> {
        let mut hasher = DefaultHasher::new();
        (collection_id, file_id).hash(&mut hasher);
        let shard = (hasher.finish() as usize) % self.shards.len();
        FileLockGuard {
            _guard: self.shards[shard]
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        }
    }
}

impl Default for FileLockTable {
    fn default() -> Self {
        Self::new()
    }
}
