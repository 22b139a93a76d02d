use std::time::Duration;

use crate::error::ConfigError;
use crate::models::{default_accepted_types, QueueLimits};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- 准入限制 ---
    /// 队列中最多文件数
    pub max_files: usize,
    /// 单个文件大小上限（MB）
    pub max_size_mb: u64,
    /// 允许的 MIME 类型，空表示不限制
    pub accepted_types: Vec<String>,
    // --- 模拟上传 ---
    /// 每次进度增量
    pub progress_step: u8,
    /// 每次增量之间的间隔（毫秒）
    pub progress_interval_ms: u64,
    /// 可能失败的进度检查点
    pub failure_checkpoint: u8,
    /// 在检查点失败的概率
    pub failure_probability: f64,
    /// 上传完成后资源地址的前缀
    pub resource_base_url: String,
    // --- 图片描述 ---
    pub enrichment_enabled: bool,
    pub enrichment_timeout_secs: u64,
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 命令行运行 ---
    /// 批次清单存放目录
    pub manifest_folder: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    /// 失败报告文件
    pub failed_report_file: String,
    /// 全部上传结束后自动重试失败记录的轮数
    pub auto_retry_rounds: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_files: 10,
            max_size_mb: 50,
            accepted_types: default_accepted_types(),
            progress_step: 10,
            progress_interval_ms: 200,
            failure_checkpoint: 50,
            failure_probability: 0.1,
            resource_base_url: "https://example.com/files".to_string(),
            enrichment_enabled: true,
            enrichment_timeout_secs: 30,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            manifest_folder: "manifests".to_string(),
            verbose_logging: false,
            output_log_file: "upload_log.txt".to_string(),
            failed_report_file: "failed_uploads.txt".to_string(),
            auto_retry_rounds: 1,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_files: std::env::var("MAX_FILES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_files),
            max_size_mb: std::env::var("MAX_SIZE_MB").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_size_mb),
            accepted_types: std::env::var("ACCEPTED_TYPES").ok().map(|v| parse_type_list(&v)).unwrap_or(default.accepted_types),
            progress_step: std::env::var("PROGRESS_STEP").ok().and_then(|v| v.parse().ok()).unwrap_or(default.progress_step),
            progress_interval_ms: std::env::var("PROGRESS_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.progress_interval_ms),
            failure_checkpoint: std::env::var("FAILURE_CHECKPOINT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.failure_checkpoint),
            failure_probability: std::env::var("FAILURE_PROBABILITY").ok().and_then(|v| v.parse().ok()).unwrap_or(default.failure_probability),
            resource_base_url: std::env::var("RESOURCE_BASE_URL").unwrap_or(default.resource_base_url),
            enrichment_enabled: std::env::var("ENRICHMENT_ENABLED").ok().and_then(|v| v.parse().ok()).unwrap_or(default.enrichment_enabled),
            enrichment_timeout_secs: std::env::var("ENRICHMENT_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.enrichment_timeout_secs),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            manifest_folder: std::env::var("MANIFEST_FOLDER").unwrap_or(default.manifest_folder),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            failed_report_file: std::env::var("FAILED_REPORT_FILE").unwrap_or(default.failed_report_file),
            auto_retry_rounds: std::env::var("AUTO_RETRY_ROUNDS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.auto_retry_rounds),
        }
    }

    /// 检查数值配置是否合法
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_files == 0 {
            return Err(ConfigError::ZeroMaxFiles);
        }
        self.simulation().validate()
    }

    /// 准入限制
    pub fn limits(&self) -> QueueLimits {
        QueueLimits {
            max_files: self.max_files,
            max_size_mb: self.max_size_mb,
            accepted_types: self.accepted_types.clone(),
        }
    }

    /// 模拟上传参数
    pub fn simulation(&self) -> SimulationSettings {
        SimulationSettings {
            progress_step: self.progress_step,
            progress_interval: Duration::from_millis(self.progress_interval_ms),
            failure_checkpoint: self.failure_checkpoint,
            failure_probability: self.failure_probability,
            resource_base_url: self.resource_base_url.clone(),
            enrichment_timeout: Duration::from_secs(self.enrichment_timeout_secs),
        }
    }

    /// 是否需要真实的图片描述服务
    pub fn use_llm_enricher(&self) -> bool {
        self.enrichment_enabled && !self.llm_api_key.trim().is_empty()
    }
}

/// 逗号分隔的类型列表，空字符串表示不限制
fn parse_type_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 单次模拟上传的参数
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationSettings {
    pub progress_step: u8,
    pub progress_interval: Duration,
    pub failure_checkpoint: u8,
    pub failure_probability: f64,
    pub resource_base_url: String,
    pub enrichment_timeout: Duration,
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(ConfigError::ProbabilityOutOfRange {
                value: self.failure_probability,
            });
        }
        if self.progress_step == 0 || self.progress_step > 100 {
            return Err(ConfigError::InvalidProgressStep {
                step: self.progress_step,
            });
        }
        // 检查点必须落在上报的进度值上，且早于 100
        if self.failure_checkpoint >= 100 || self.failure_checkpoint % self.progress_step != 0 {
            return Err(ConfigError::CheckpointOffGrid {
                checkpoint: self.failure_checkpoint,
                step: self.progress_step,
            });
        }
        Ok(())
    }

    /// 依次上报的进度值：0, step, 2·step, …，最后一定是 100
    pub fn progress_points(&self) -> Vec<u8> {
        let step = self.progress_step.max(1) as usize;
        let mut points: Vec<u8> = (0..100u8).step_by(step).collect();
        points.push(100);
        points
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Config::default().simulation()
    }
}
