//! 失败报告写入服务 - 业务能力层
//!
//! 只负责"把仍然失败的记录写进报告文件"，不关心流程

use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::UploadRecord;

/// 失败报告写入服务
pub struct FailureWriter {
    report_path: String,
}

impl FailureWriter {
    pub fn new() -> Self {
        Self {
            report_path: "failed_uploads.txt".to_string(),
        }
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            report_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.report_path
    }

    /// 追加一条失败记录
    pub fn write(&self, record: &UploadRecord) -> AppResult<()> {
        debug!("写入失败报告: #{} {}", record.id, record.name);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.report_path)
            .map_err(|e| AppError::file_write_failed(&self.report_path, e))?;

        let line = format!(
            "#{} | {} | {}\n",
            record.id,
            record.name,
            record.error.as_deref().unwrap_or("未知错误")
        );

        file.write_all(line.as_bytes())
            .map_err(|e| AppError::file_write_failed(&self.report_path, e))?;

        Ok(())
    }
}

impl Default for FailureWriter {
    fn default() -> Self {
        Self::new()
    }
}
