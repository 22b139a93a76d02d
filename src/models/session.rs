use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 上传会话：一次被准入的批次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSession {
    pub id: u64,
    /// 批次名称（来自清单文件，没有时为空）
    pub name: String,
    /// 本批次创建的记录
    pub file_ids: Vec<u64>,
    /// 被逐个拒绝的文件数
    pub skipped_count: usize,
    pub created_at: DateTime<Utc>,
}
