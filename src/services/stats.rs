//! 上传统计 - 业务能力层
//!
//! 每次都从记录快照重新计算，不持有状态

use serde::Serialize;
use std::fmt;

use crate::infrastructure::format_file_size_precision;
use crate::models::{UploadRecord, UploadStatus};

/// 队列统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadStats {
    pub total_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    /// 上传中和分析中的记录
    pub uploading_count: usize,
    pub total_bytes: u64,
    pub completed_bytes: u64,
}

impl UploadStats {
    pub fn from_records(records: &[UploadRecord]) -> Self {
        records.iter().fold(Self::default(), |mut stats, record| {
            stats.total_count += 1;
            stats.total_bytes += record.size;
            match record.status {
                UploadStatus::Completed => {
                    stats.completed_count += 1;
                    stats.completed_bytes += record.size;
                }
                UploadStatus::Failed => stats.failed_count += 1,
                status if status.is_active() => stats.uploading_count += 1,
                _ => {}
            }
            stats
        })
    }
}

impl fmt::Display for UploadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "共 {} 个 | 完成 {} | 失败 {} | 上传中 {} | {} / {}",
            self.total_count,
            self.completed_count,
            self.failed_count,
            self.uploading_count,
            format_file_size_precision(self.completed_bytes, 1),
            format_file_size_precision(self.total_bytes, 1),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::RecordRepository;
    use crate::models::{FileDescriptor, RecordPatch};

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(UploadStats::from_records(&[]), UploadStats::default());
    }

    #[test]
    fn test_counts_by_status() {
        let repo = RecordRepository::new();
        let a = repo.create(FileDescriptor::new("a", 100, "text/plain"));
        let b = repo.create(FileDescriptor::new("b", 200, "text/plain"));
        let c = repo.create(FileDescriptor::new("c", 300, "image/png"));
        repo.create(FileDescriptor::new("d", 400, "text/plain"));

        repo.update(a.id, RecordPatch::progress(100, UploadStatus::Completed));
        repo.update(b.id, RecordPatch::failed(50, "Network connection failed"));
        repo.update(c.id, RecordPatch::progress(100, UploadStatus::Analyzing));

        let stats = UploadStats::from_records(&repo.list());
        assert_eq!(stats.total_count, 4);
        assert_eq!(stats.completed_count, 1);
        assert_eq!(stats.failed_count, 1);
        assert_eq!(stats.uploading_count, 1);
        assert_eq!(stats.total_bytes, 1000);
        assert_eq!(stats.completed_bytes, 100);
    }
}
