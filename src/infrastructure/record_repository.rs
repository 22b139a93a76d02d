//! 记录仓库 - 基础设施层
//!
//! 唯一持有全部 `UploadRecord` 的地方。所有读写都在一次加锁内完成，
//! 锁不会跨越 `.await`，因此并发运行之间不会丢失更新。

use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use crate::models::{FileDescriptor, RecordPatch, UploadRecord, UploadSession, UploadStatus};

#[derive(Debug, Default)]
struct Store {
    records: BTreeMap<u64, UploadRecord>,
    /// 已分配过的最大 id，删除后也不回退
    high_water: u64,
    sessions: Vec<UploadSession>,
}

/// 内存中的记录仓库
#[derive(Debug, Default)]
pub struct RecordRepository {
    store: RwLock<Store>,
}

impl RecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建新记录，状态为 `Queued`
    pub fn create(&self, descriptor: FileDescriptor) -> UploadRecord {
        let mut store = self.store.write();
        let max_existing = store.records.keys().next_back().copied().unwrap_or(0);
        let id = max_existing.max(store.high_water) + 1;
        store.high_water = id;

        let record = UploadRecord {
            id,
            name: descriptor.name,
            size: descriptor.size,
            mime_type: descriptor.mime_type,
            status: UploadStatus::Queued,
            progress: 0,
            error: None,
            resource_locator: None,
            description: None,
            enrichment: Default::default(),
            created_at: Utc::now(),
            source_path: descriptor.source_path,
        };
        store.records.insert(id, record.clone());

        debug!("创建记录 #{}: {}", id, record.name);
        record
    }

    pub fn get_by_id(&self, id: u64) -> Option<UploadRecord> {
        self.store.read().records.get(&id).cloned()
    }

    /// 合并字段；记录不存在时返回 `None`
    pub fn update(&self, id: u64, patch: RecordPatch) -> Option<UploadRecord> {
        let mut store = self.store.write();
        let record = store.records.get_mut(&id)?;
        patch.apply_to(record);
        Some(record.clone())
    }

    /// 删除记录，返回记录是否存在
    pub fn delete(&self, id: u64) -> bool {
        self.store.write().records.remove(&id).is_some()
    }

    /// 批量删除满足条件的记录，返回删除数量
    pub fn delete_where(&self, mut predicate: impl FnMut(&UploadRecord) -> bool) -> usize {
        let mut store = self.store.write();
        let before = store.records.len();
        store.records.retain(|_, record| !predicate(record));
        before - store.records.len()
    }

    /// 全部记录的快照（按 id 排序）
    pub fn list(&self) -> Vec<UploadRecord> {
        self.store.read().records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.store.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========== 上传会话 ==========

    pub fn create_session(
        &self,
        name: impl Into<String>,
        file_ids: Vec<u64>,
        skipped_count: usize,
    ) -> UploadSession {
        let mut store = self.store.write();
        let id = store.sessions.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        let session = UploadSession {
            id,
            name: name.into(),
            file_ids,
            skipped_count,
            created_at: Utc::now(),
        };
        store.sessions.push(session.clone());
        session
    }

    pub fn list_sessions(&self) -> Vec<UploadSession> {
        self.store.read().sessions.clone()
    }
}

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// 格式化文件大小，保留两位小数并去掉末尾的 0
///
/// ```
/// use upload_queue::infrastructure::format_file_size;
/// assert_eq!(format_file_size(0), "0 Bytes");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    format_file_size_precision(bytes, 2)
}

/// 按指定小数位格式化文件大小
pub fn format_file_size_precision(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{:.*}", decimals, value);
    let trimmed = if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.')
    } else {
        formatted.as_str()
    };

    format!("{} {}", trimmed, SIZE_UNITS[unit])
}
