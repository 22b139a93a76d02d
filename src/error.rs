use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 批次准入错误（整批拒绝）
    Admission(AdmissionError),
    /// 记录不存在
    NotFound { id: u64 },
    /// 记录正在上传中，不允许当前操作
    InFlight { id: u64 },
    /// 文件操作错误
    File(FileError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Admission(e) => write!(f, "准入错误: {}", e),
            AppError::NotFound { id } => write!(f, "记录不存在: #{}", id),
            AppError::InFlight { id } => write!(f, "记录 #{} 正在上传中", id),
            AppError::File(e) => write!(f, "文件错误: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Admission(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::NotFound { .. } | AppError::InFlight { .. } => None,
        }
    }
}

/// 批次准入错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// 超出队列文件数量上限
    TooManyFiles {
        max_files: usize,
        current: usize,
        adding: usize,
    },
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::TooManyFiles {
                max_files,
                current,
                adding,
            } => {
                write!(
                    f,
                    "Cannot upload more than {} files. Current: {}, Adding: {}",
                    max_files, current, adding
                )
            }
        }
    }
}

impl std::error::Error for AdmissionError {}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: std::io::Error,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::WriteFailed { source, .. } => Some(source),
        }
    }
}

/// 配置错误
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 失败概率不在 [0, 1] 区间
    ProbabilityOutOfRange { value: f64 },
    /// 进度步长必须在 1..=100 之间
    InvalidProgressStep { step: u8 },
    /// 检查点不在步长网格上
    CheckpointOffGrid { checkpoint: u8, step: u8 },
    /// 数量上限为 0
    ZeroMaxFiles,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ProbabilityOutOfRange { value } => {
                write!(f, "失败概率 {} 超出范围 [0, 1]", value)
            }
            ConfigError::InvalidProgressStep { step } => {
                write!(f, "进度步长 {} 无效，应在 1..=100 之间", step)
            }
            ConfigError::CheckpointOffGrid { checkpoint, step } => {
                write!(f, "检查点 {} 不是步长 {} 的整数倍", checkpoint, step)
            }
            ConfigError::ZeroMaxFiles => write!(f, "文件数量上限不能为 0"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========

impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        AppError::Admission(err)
    }
}


// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 是否为"记录不存在"这类可忽略的错误
    pub fn is_benign(&self) -> bool {
        matches!(self, AppError::NotFound { .. })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admission_message_matches_queue_counts() {
        let err: AppError = AdmissionError::TooManyFiles {
            max_files: 10,
            current: 9,
            adding: 2,
        }
        .into();

        let msg = err.to_string();
        assert!(msg.contains("Cannot upload more than 10 files"));
        assert!(msg.contains("Current: 9, Adding: 2"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_not_found_is_benign() {
        assert!(AppError::NotFound { id: 3 }.is_benign());
        assert!(!AppError::InFlight { id: 3 }.is_benign());
    }

    #[test]
    fn test_write_failure_keeps_io_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = AppError::file_write_failed("report.txt", io);

        assert_eq!(err.to_string(), "文件错误: 写入文件失败 (report.txt): denied");
        let source = std::error::Error::source(&err).unwrap();
        assert!(std::error::Error::source(source).is_some());
    }
}
