//! 批量上传处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是命令行程序的入口，负责按清单批量上传和结果汇总。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置、初始化日志文件、创建 `QueueOrchestrator`
//! 2. **批量加载**：扫描并加载所有批次清单（`Vec<BatchManifest>`）
//! 3. **分批处理**：逐个清单提交，每批完成后再开始下一批
//! 4. **自动重试**：对失败记录重试若干轮
//! 5. **失败报告**：仍然失败的记录写入报告文件
//! 6. **全局统计**：汇总所有批次的结果
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个文件的上传细节
//! - **向下委托**：委托 `QueueOrchestrator` 完成准入、并发和进度

use crate::config::Config;
use crate::error::AppError;
use crate::models::{BatchManifest, UploadStatus};
use crate::orchestrator::queue::QueueOrchestrator;
use crate::services::FailureWriter;
use crate::utils::logging;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    queue: Arc<QueueOrchestrator>,
    failure_writer: FailureWriter,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate().context("配置不合法")?;

        // 初始化日志文件
        logging::init_log_file(&config.output_log_file)?;

        logging::log_startup(&config);

        let queue = Arc::new(QueueOrchestrator::from_config(&config));
        let failure_writer = FailureWriter::with_path(&config.failed_report_file);

        Ok(Self {
            config,
            queue,
            failure_writer,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        // 加载所有批次清单
        let manifests = self.load_manifests().await?;

        if manifests.is_empty() {
            warn!("⚠️ 没有找到待上传的TOML清单，程序结束");
            return Ok(());
        }

        logging::log_manifests_loaded(manifests.len());

        if self.config.verbose_logging {
            self.spawn_event_logger();
        }

        let stats = self.process_all_batches(manifests).await?;

        logging::print_final_stats(
            stats.completed,
            stats.failed,
            stats.skipped,
            stats.total,
            &self.config.output_log_file,
        );
        if stats.failed > 0 {
            info!("失败记录已写入: {}", self.failure_writer.path());
        }

        Ok(())
    }

    /// 加载清单
    async fn load_manifests(&self) -> Result<Vec<BatchManifest>> {
        info!("\n📁 正在扫描待上传的批次清单...");
        crate::models::load_all_manifests(&self.config.manifest_folder).await
    }

    /// 处理所有批次
    async fn process_all_batches(&self, manifests: Vec<BatchManifest>) -> Result<ProcessingStats> {
        let total_batches = manifests.len();
        let mut stats = ProcessingStats::default();

        for (idx, manifest) in manifests.into_iter().enumerate() {
            let batch_num = idx + 1;
            logging::log_batch_start(batch_num, total_batches, &manifest.name, manifest.files.len());

            let batch_result = self.process_batch(batch_num, manifest).await?;

            stats.completed += batch_result.completed;
            stats.failed += batch_result.failed;
            stats.skipped += batch_result.skipped;
            stats.total += batch_result.completed + batch_result.failed + batch_result.skipped;
        }

        Ok(stats)
    }

    /// 处理单个批次：提交 → 等待 → 重试 → 记录 → 清空
    async fn process_batch(&self, batch_num: usize, manifest: BatchManifest) -> Result<BatchResult> {
        let mut result = BatchResult::default();
        let batch_size = manifest.files.len();

        let report = match self
            .queue
            .submit_named_batch(&manifest.name, manifest.files, &self.config.limits())
            .await
        {
            Ok(report) => report,
            Err(AppError::Admission(e)) => {
                // 整批被拒绝，不影响后续批次
                error!("❌ 批次 {} 被拒绝: {}", manifest.name, e);
                result.skipped = batch_size;
                return Ok(result);
            }
            Err(e) => return Err(e.into()),
        };
        result.skipped = report.skipped.len();

        self.queue.wait_for_idle().await;
        self.retry_failed().await;

        let stats = self.queue.stats();
        for record in self.queue.list().await {
            logging::append_log_line(
                &self.config.output_log_file,
                &logging::format_record_line(&record),
            )?;

            match record.status {
                UploadStatus::Completed => result.completed += 1,
                UploadStatus::Failed => {
                    result.failed += 1;
                    if let Err(e) = self.failure_writer.write(&record) {
                        warn!("写入失败报告出错: {}", e);
                    }
                }
                _ => {}
            }
        }

        logging::append_log_line(
            &self.config.output_log_file,
            &format!("批次 {} 统计: {}", manifest.name, serde_json::to_string(&stats)?),
        )?;
        logging::log_batch_complete(batch_num, &stats);
        self.queue.clear_all().await;

        Ok(result)
    }

    /// 对失败记录自动重试若干轮
    async fn retry_failed(&self) {
        for round in 1..=self.config.auto_retry_rounds {
            let failed: Vec<u64> = self
                .queue
                .list()
                .await
                .into_iter()
                .filter(|r| r.status == UploadStatus::Failed)
                .map(|r| r.id)
                .collect();

            if failed.is_empty() {
                return;
            }

            info!("🔄 第 {} 轮重试: {} 个失败文件", round, failed.len());
            for id in failed {
                match self.queue.retry(id).await {
                    Ok(()) => {}
                    Err(e) if e.is_benign() => debug!("[文件 #{}] 已不在队列中: {}", id, e),
                    Err(e) => warn!("[文件 #{}] 重试失败: {}", id, e),
                }
            }
            self.queue.wait_for_idle().await;
        }
    }

    /// 输出每一次进度变化
    fn spawn_event_logger(&self) {
        let mut events = self.queue.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.status.is_terminal() => {
                        info!("[文件 #{}] 🏁 {}% {}", event.id, event.progress, event.status)
                    }
                    Ok(event) => {
                        info!("[文件 #{}] {}% {}", event.id, event.progress, event.status)
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("进度事件过多，跳过 {} 条", skipped)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

/// 处理统计
#[derive(Debug, Default)]
struct ProcessingStats {
    completed: usize,
    failed: usize,
    skipped: usize,
    total: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    completed: usize,
    failed: usize,
    skipped: usize,
}
