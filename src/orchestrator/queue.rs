//! 上传队列编排器 - 编排层
//!
//! ## 职责
//!
//! 1. **批次准入**：数量上限检查（整批拒绝）+ 逐个文件校验（单个跳过）
//! 2. **并发上传**：每个文件一个 tokio 任务，互不等待
//! 3. **在途跟踪**：正在运行的 id 集合，防止重复运行，限制删除/清空
//! 4. **进度广播**：把每次进度变化推送到 broadcast 通道
//!
//! 在途集合由 `InFlightGuard` 维护：运行开始前放入，任务结束（成功、失败、
//! 记录被删、panic）时在 `Drop` 中移除。

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

use crate::config::{Config, SimulationSettings};
use crate::error::{AdmissionError, AppError, AppResult};
use crate::infrastructure::RecordRepository;
use crate::models::{
    CandidateFile, ProgressEvent, QueueLimits, RecordPatch, UploadRecord, UploadSession,
};
use crate::services::{
    validator, Enricher, LlmEnricher, RejectReason, UnavailableEnricher, UploadStats,
};
use crate::workflow::{RunOutcome, UploadFlow};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// 被跳过的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub name: String,
    pub reason: RejectReason,
}

/// 一次提交的结果
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// 有文件被接受时才会创建会话
    pub session: Option<UploadSession>,
    pub accepted: Vec<UploadRecord>,
    pub skipped: Vec<SkippedFile>,
}

/// 正在运行的 id 集合
#[derive(Debug, Default)]
struct InFlightSet {
    ids: Mutex<HashSet<u64>>,
    idle: Notify,
}

impl InFlightSet {
    fn try_acquire(self: &Arc<Self>, id: u64) -> Option<InFlightGuard> {
        if !self.ids.lock().insert(id) {
            return None;
        }
        Some(InFlightGuard {
            set: Arc::clone(self),
            id,
        })
    }

    /// 创建记录并在同一临界区内标记为在途
    ///
    /// 删除和清空也持有这把锁，所以新记录不会在开始运行前被删掉
    fn admit(
        self: &Arc<Self>,
        create: impl FnOnce() -> UploadRecord,
    ) -> (UploadRecord, InFlightGuard) {
        let mut ids = self.ids.lock();
        let record = create();
        ids.insert(record.id);
        let guard = InFlightGuard {
            set: Arc::clone(self),
            id: record.id,
        };
        (record, guard)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<u64>> {
        self.ids.lock()
    }
}

/// 在途标记，释放时自动移出集合
#[derive(Debug)]
struct InFlightGuard {
    set: Arc<InFlightSet>,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut ids = self.set.ids.lock();
        ids.remove(&self.id);
        let now_idle = ids.is_empty();
        drop(ids);

        if now_idle {
            self.set.idle.notify_waiters();
        }
    }
}

/// 上传队列编排器
pub struct QueueOrchestrator {
    repository: Arc<RecordRepository>,
    flow: Arc<UploadFlow>,
    in_flight: Arc<InFlightSet>,
    events: broadcast::Sender<ProgressEvent>,
    /// 串行化准入：数量检查与创建记录之间不能插入其他批次
    admission: Mutex<()>,
}

impl QueueOrchestrator {
    pub fn new(enricher: Arc<dyn Enricher>, settings: SimulationSettings) -> Self {
        Self::with_event_capacity(enricher, settings, EVENT_CHANNEL_CAPACITY)
    }

    /// 指定进度通道容量
    pub fn with_event_capacity(
        enricher: Arc<dyn Enricher>,
        settings: SimulationSettings,
        capacity: usize,
    ) -> Self {
        let repository = Arc::new(RecordRepository::new());
        let flow = Arc::new(UploadFlow::new(repository.clone(), enricher, settings));
        let (events, _) = broadcast::channel(capacity.max(1));

        Self {
            repository,
            flow,
            in_flight: Arc::new(InFlightSet::default()),
            events,
            admission: Mutex::new(()),
        }
    }

    /// 根据配置选择图片描述服务
    pub fn from_config(config: &Config) -> Self {
        let enricher: Arc<dyn Enricher> = if config.use_llm_enricher() {
            info!("🖼️ 图片描述: 使用模型 {}", config.llm_model_name);
            Arc::new(LlmEnricher::new(config))
        } else {
            info!("🖼️ 图片描述: 未配置，图片将直接完成");
            Arc::new(UnavailableEnricher)
        };
        let settings = config.simulation();
        // 满队列一次运行的全部事件（图片多一条 analyzing）
        let per_run = settings.progress_points().len() + 1;
        let capacity = config
            .max_files
            .saturating_mul(per_run)
            .max(EVENT_CHANNEL_CAPACITY);
        Self::with_event_capacity(enricher, settings, capacity)
    }

    /// 订阅进度事件
    ///
    /// 通道容量有限：订阅方落后超过容量时，`recv` 返回
    /// `RecvError::Lagged(n)` 并丢掉最旧的 n 条，其中可能包含终止事件。
    /// 需要最终状态时以 `get` / `list` 为准。
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// 提交一批文件（无名称）
    pub async fn submit_batch(
        &self,
        candidates: Vec<CandidateFile>,
        limits: &QueueLimits,
    ) -> AppResult<BatchReport> {
        self.submit_named_batch("", candidates, limits).await
    }

    /// 提交一批文件
    ///
    /// - 超出数量上限：整批拒绝，不创建任何记录
    /// - 大小/类型/重复不通过：单个跳过，其余照常
    /// - 通过的文件立即开始并发上传
    pub async fn submit_named_batch(
        &self,
        name: &str,
        candidates: Vec<CandidateFile>,
        limits: &QueueLimits,
    ) -> AppResult<BatchReport> {
        let mut report = BatchReport::default();
        let mut guards = Vec::new();

        {
            let _admission = self.admission.lock();

            let current = self.repository.len();
            if current + candidates.len() > limits.max_files {
                let err = AdmissionError::TooManyFiles {
                    max_files: limits.max_files,
                    current,
                    adding: candidates.len(),
                };
                warn!("❌ {}", err);
                return Err(err.into());
            }

            let mut existing = self.repository.list();
            for candidate in candidates {
                if let Err(reason) = validator::validate(&candidate, limits, &existing) {
                    warn!("⚠️ 跳过文件: {}", reason);
                    report.skipped.push(SkippedFile {
                        name: candidate.name,
                        reason,
                    });
                    continue;
                }

                let (record, guard) = self
                    .in_flight
                    .admit(|| self.repository.create(candidate.descriptor()));
                guards.push(guard);
                existing.push(record.clone());
                report.accepted.push(record);
            }

            if !report.accepted.is_empty() {
                let file_ids = report.accepted.iter().map(|r| r.id).collect();
                let session = self
                    .repository
                    .create_session(name, file_ids, report.skipped.len());
                report.session = Some(session);
            }
        }

        if !report.accepted.is_empty() {
            let count = report.accepted.len();
            info!(
                "📥 已添加 {} 个文件到上传队列{}",
                count,
                if report.skipped.is_empty() {
                    String::new()
                } else {
                    format!("（跳过 {} 个）", report.skipped.len())
                }
            );
        }

        for guard in guards {
            self.spawn_run(guard);
        }

        Ok(report)
    }

    /// 重试一条记录
    ///
    /// 记录必须存在且不在上传中；返回前记录已经重置为 uploading / 0
    pub async fn retry(&self, id: u64) -> AppResult<()> {
        if self.repository.get_by_id(id).is_none() {
            return Err(AppError::NotFound { id });
        }

        let guard = self
            .in_flight
            .try_acquire(id)
            .ok_or(AppError::InFlight { id })?;

        // 记录可能刚好被删除，此时 guard 随之释放
        let record = self
            .repository
            .update(id, RecordPatch::restart())
            .ok_or(AppError::NotFound { id })?;

        info!("[文件 #{} {}] 🔄 重试上传", id, record.name);
        self.spawn_run(guard);
        Ok(())
    }

    /// 删除一条记录；上传中的记录不允许删除
    ///
    /// 返回记录是否存在
    pub async fn remove(&self, id: u64) -> AppResult<bool> {
        let in_flight = self.in_flight.lock();
        if in_flight.contains(&id) {
            warn!("[文件 #{}] 上传中，不能删除", id);
            return Err(AppError::InFlight { id });
        }

        let existed = self.repository.delete(id);
        if existed {
            info!("[文件 #{}] 🗑️ 已从队列移除", id);
        }
        Ok(existed)
    }

    /// 清空所有不在上传中的记录，返回删除数量
    pub async fn clear_all(&self) -> usize {
        if self.repository.is_empty() {
            return 0;
        }
        let in_flight = self.in_flight.lock();
        let removed = self
            .repository
            .delete_where(|record| !in_flight.contains(&record.id));

        if removed > 0 {
            info!("🧹 已清除 {} 个文件", removed);
        }
        removed
    }

    /// 全部记录的快照
    pub async fn list(&self) -> Vec<UploadRecord> {
        self.repository.list()
    }

    pub fn get(&self, id: u64) -> Option<UploadRecord> {
        self.repository.get_by_id(id)
    }

    pub fn sessions(&self) -> Vec<UploadSession> {
        self.repository.list_sessions()
    }

    /// 从当前快照计算统计
    pub fn stats(&self) -> UploadStats {
        UploadStats::from_records(&self.repository.list())
    }

    pub fn is_in_flight(&self, id: u64) -> bool {
        self.in_flight.lock().contains(&id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// 等待所有正在运行的上传结束
    pub async fn wait_for_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            if self.in_flight.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }

    fn spawn_run(&self, guard: InFlightGuard) {
        let flow = self.flow.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let id = guard.id;
            let _guard = guard;
            let outcome = flow
                .run(id, move |progress, status| {
                    // 没有订阅者时发送失败，忽略即可
                    let _ = events.send(ProgressEvent {
                        id,
                        progress,
                        status,
                    });
                })
                .await;

            if let RunOutcome::Failed(record) = outcome {
                debug!("[文件 #{}] 等待重试: {:?}", id, record.error);
            }
        });
    }
}
