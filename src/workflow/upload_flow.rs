//! 上传流程 - 流程层
//!
//! 核心职责：定义"一个文件"的完整上传过程（模拟传输）
//!
//! 流程顺序：
//! 1. 进入 uploading，进度归零
//! 2. 按固定步长推进进度，每步之间等待固定间隔
//! 3. 到达检查点时按概率失败 → failed（终止）
//! 4. 到达 100：生成资源地址
//! 5. 图片文件 → analyzing → 调用图片描述 → completed（描述失败也算完成）
//!
//! 记录在运行中被删除时，后续更新返回 `None`，运行直接结束（Abandoned）

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::SimulationSettings;
use crate::infrastructure::{format_file_size, RecordRepository};
use crate::models::{EnrichmentOutcome, RecordPatch, UploadRecord, UploadStatus};
use crate::services::{Enricher, EnrichmentError, EnrichmentRequest};
use crate::workflow::upload_ctx::UploadCtx;

/// 模拟网络失败时写入记录的错误信息
pub const TRANSFER_FAILURE_MESSAGE: &str = "Network connection failed";

/// 单次运行的结果
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// 上传完成（可能带图片描述）
    Completed(UploadRecord),
    /// 在检查点失败
    Failed(UploadRecord),
    /// 记录在运行中被删除
    Abandoned,
}

impl RunOutcome {
    pub fn status(&self) -> Option<UploadStatus> {
        match self {
            RunOutcome::Completed(_) => Some(UploadStatus::Completed),
            RunOutcome::Failed(_) => Some(UploadStatus::Failed),
            RunOutcome::Abandoned => None,
        }
    }
}

/// 上传流程
///
/// - 只通过 `RecordRepository` 修改记录
/// - 不持有记录副本跨越等待点
/// - 不关心并发和去重（由编排层负责）
pub struct UploadFlow {
    repository: Arc<RecordRepository>,
    enricher: Arc<dyn Enricher>,
    settings: SimulationSettings,
}

impl UploadFlow {
    pub fn new(
        repository: Arc<RecordRepository>,
        enricher: Arc<dyn Enricher>,
        settings: SimulationSettings,
    ) -> Self {
        Self {
            repository,
            enricher,
            settings,
        }
    }

    /// 运行一次完整的上传
    ///
    /// `on_progress` 收到 `(progress, status)`；最后一次调用的状态一定是
    /// `Completed` 或 `Failed`（记录被删除时不再调用）
    pub async fn run<F>(&self, id: u64, on_progress: F) -> RunOutcome
    where
        F: Fn(u8, UploadStatus) + Send + Sync,
    {
        let Some(record) = self.repository.update(id, RecordPatch::restart()) else {
            debug!("[文件 #{}] 记录不存在，跳过上传", id);
            return RunOutcome::Abandoned;
        };
        let ctx = UploadCtx::from_record(&record);

        info!("{} ⬆️ 开始上传 ({})", ctx, format_file_size(ctx.size));

        for progress in self.settings.progress_points() {
            tokio::time::sleep(self.settings.progress_interval).await;

            if progress == self.settings.failure_checkpoint && self.should_fail() {
                let patch = RecordPatch::failed(progress, TRANSFER_FAILURE_MESSAGE);
                let Some(record) = self.repository.update(id, patch) else {
                    return abandoned(&ctx);
                };
                warn!("{} ❌ 上传失败: {}", ctx, TRANSFER_FAILURE_MESSAGE);
                on_progress(progress, UploadStatus::Failed);
                return RunOutcome::Failed(record);
            }

            if progress < 100 {
                let patch = RecordPatch::progress(progress, UploadStatus::Uploading);
                if self.repository.update(id, patch).is_none() {
                    return abandoned(&ctx);
                }
                on_progress(progress, UploadStatus::Uploading);
            }
        }

        self.finish(&ctx, &on_progress).await
    }

    /// 进度到达 100 之后的收尾
    async fn finish<F>(&self, ctx: &UploadCtx, on_progress: &F) -> RunOutcome
    where
        F: Fn(u8, UploadStatus) + Send + Sync,
    {
        let status = if ctx.is_image {
            UploadStatus::Analyzing
        } else {
            UploadStatus::Completed
        };

        let patch = RecordPatch {
            status: Some(status),
            progress: Some(100),
            resource_locator: Some(Some(self.resource_locator(&ctx.name))),
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        let Some(record) = self.repository.update(ctx.id, patch) else {
            return abandoned(ctx);
        };
        on_progress(100, status);

        if !ctx.is_image {
            info!("{} ✅ 上传完成", ctx);
            return RunOutcome::Completed(record);
        }

        info!("{} 🔍 正在生成图片描述...", ctx);
        let patch = match self.enrich(ctx).await {
            Ok(description) => {
                info!("{} ✓ 图片描述: {}", ctx, description);
                RecordPatch {
                    status: Some(UploadStatus::Completed),
                    description: Some(Some(description)),
                    enrichment: Some(EnrichmentOutcome::Described),
                    ..Default::default()
                }
            }
            Err(e) => {
                warn!("{} ⚠️ 图片描述失败，忽略: {}", ctx, e);
                RecordPatch {
                    status: Some(UploadStatus::Completed),
                    enrichment: Some(EnrichmentOutcome::Unavailable),
                    ..Default::default()
                }
            }
        };

        let Some(record) = self.repository.update(ctx.id, patch) else {
            return abandoned(ctx);
        };
        on_progress(100, UploadStatus::Completed);
        info!("{} ✅ 上传完成", ctx);
        RunOutcome::Completed(record)
    }

    /// 调用图片描述服务，超时也算失败
    async fn enrich(&self, ctx: &UploadCtx) -> Result<String, EnrichmentError> {
        let image_bytes = match &ctx.source_path {
            Some(path) => match tokio::fs::read(path).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("{} 读取图片失败 {}: {}", ctx, path.display(), e);
                    None
                }
            },
            None => None,
        };

        let request = EnrichmentRequest {
            image_bytes,
            mime_type: ctx.mime_type.clone(),
            file_name: ctx.name.clone(),
        };

        let timeout = self.settings.enrichment_timeout;
        let response = tokio::time::timeout(timeout, self.enricher.describe(request))
            .await
            .map_err(|_| EnrichmentError::Timeout(timeout))??;

        response
            .into_description()
            .ok_or(EnrichmentError::EmptyResponse)
    }

    fn resource_locator(&self, name: &str) -> String {
        format!(
            "{}/{}",
            self.settings.resource_base_url.trim_end_matches('/'),
            name
        )
    }

    fn should_fail(&self) -> bool {
        let p = self.settings.failure_probability;
        if p.is_nan() || p <= 0.0 {
            return false;
        }
        rand::thread_rng().gen_bool(p.min(1.0))
    }
}

fn abandoned(ctx: &UploadCtx) -> RunOutcome {
    info!("{} 记录已被移除，停止上传", ctx);
    RunOutcome::Abandoned
}
