use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use upload_queue::error::AdmissionError;
use upload_queue::infrastructure::RecordRepository;
use upload_queue::models::{EnrichmentOutcome, FileDescriptor};
use upload_queue::services::{
    EnrichmentError, EnrichmentRequest, EnrichmentResponse, UnavailableEnricher,
};
use upload_queue::{
    AppError, CandidateFile, Enricher, ProgressEvent, QueueLimits, QueueOrchestrator,
    RejectReason, RunOutcome, SimulationSettings, UploadFlow, UploadStatus,
};

/// 固定返回描述的图片描述服务
struct FixedEnricher {
    requests: Mutex<Vec<String>>,
}

#[async_trait]
impl Enricher for FixedEnricher {
    async fn describe(
        &self,
        request: EnrichmentRequest,
    ) -> Result<EnrichmentResponse, EnrichmentError> {
        self.requests.lock().push(request.file_name);
        Ok(EnrichmentResponse::described("一只橘猫趴在窗台上"))
    }
}

fn fast_settings(failure_probability: f64) -> SimulationSettings {
    SimulationSettings {
        progress_interval: Duration::from_millis(1),
        failure_probability,
        ..Default::default()
    }
}

fn queue(failure_probability: f64) -> QueueOrchestrator {
    QueueOrchestrator::new(Arc::new(UnavailableEnricher), fast_settings(failure_probability))
}

fn limits(max_files: usize) -> QueueLimits {
    QueueLimits {
        max_files,
        ..Default::default()
    }
}

fn pdf(name: &str, size: u64) -> CandidateFile {
    CandidateFile::new(name, size, "application/pdf")
}

async fn collect_until_idle(
    queue: &QueueOrchestrator,
    mut rx: tokio::sync::broadcast::Receiver<ProgressEvent>,
) -> Vec<ProgressEvent> {
    queue.wait_for_idle().await;
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_non_image_upload_completes() {
    let queue = queue(0.0);
    let rx = queue.subscribe();

    let report = queue
        .submit_batch(vec![pdf("report.pdf", 1024)], &limits(10))
        .await
        .unwrap();
    assert_eq!(report.accepted.len(), 1);
    let id = report.accepted[0].id;

    let events = collect_until_idle(&queue, rx).await;
    let progresses: Vec<u8> = events.iter().map(|e| e.progress).collect();
    assert_eq!(progresses, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    assert!(progresses.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(events.last().unwrap().status, UploadStatus::Completed);

    let record = queue.get(id).unwrap();
    assert_eq!(record.status, UploadStatus::Completed);
    assert_eq!(record.progress, 100);
    assert_eq!(
        record.resource_locator.as_deref(),
        Some("https://example.com/files/report.pdf")
    );
    assert_eq!(record.enrichment, EnrichmentOutcome::NotRequested);
    assert!(record.description.is_none());
    assert!(!queue.is_in_flight(id));
}

#[tokio::test]
async fn test_ids_are_max_plus_one_and_not_reused() {
    let queue = queue(0.0);

    let first = queue
        .submit_batch(vec![pdf("a.pdf", 1), pdf("b.pdf", 1)], &limits(10))
        .await
        .unwrap();
    let ids: Vec<u64> = first.accepted.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2]);

    queue.wait_for_idle().await;
    assert!(queue.remove(2).await.unwrap());

    let second = queue
        .submit_batch(vec![pdf("c.pdf", 1)], &limits(10))
        .await
        .unwrap();
    assert_eq!(second.accepted[0].id, 3);
    queue.wait_for_idle().await;
}

#[tokio::test]
async fn test_failure_rate_within_tolerance() {
    let repository = Arc::new(RecordRepository::new());
    let flow = UploadFlow::new(
        repository.clone(),
        Arc::new(UnavailableEnricher),
        SimulationSettings {
            progress_interval: Duration::ZERO,
            ..Default::default()
        },
    );

    let runs = 1000;
    let mut failed = 0;
    for i in 0..runs {
        let id = repository
            .create(FileDescriptor::new(format!("f{}.pdf", i), 1, "application/pdf"))
            .id;
        if let RunOutcome::Failed(record) = flow.run(id, |_, _| {}).await {
            assert_eq!(record.progress, 50);
            assert_eq!(record.error.as_deref(), Some("Network connection failed"));
            failed += 1;
        }
    }

    let rate = failed as f64 / runs as f64;
    assert!((0.05..=0.15).contains(&rate), "failure rate {}", rate);
}

#[tokio::test]
async fn test_retry_resets_failed_record() {
    let failing = queue(1.0);
    let report = failing
        .submit_batch(vec![pdf("flaky.pdf", 10)], &limits(10))
        .await
        .unwrap();
    let id = report.accepted[0].id;
    failing.wait_for_idle().await;

    let record = failing.get(id).unwrap();
    assert_eq!(record.status, UploadStatus::Failed);
    assert_eq!(record.progress, 50);
    assert_eq!(failing.stats().failed_count, 1);

    // 失败后立即重试：返回前已经重置
    failing.retry(id).await.unwrap();
    let record = failing.get(id).unwrap();
    assert_eq!(record.status, UploadStatus::Uploading);
    assert_eq!(record.progress, 0);
    assert!(record.error.is_none());
    failing.wait_for_idle().await;
    assert_eq!(failing.get(id).unwrap().status, UploadStatus::Failed);
}

#[tokio::test]
async fn test_duplicates_skipped_within_and_across_batches() {
    let queue = queue(0.0);

    let first = queue
        .submit_batch(vec![pdf("a.pdf", 5), pdf("a.pdf", 5)], &limits(10))
        .await
        .unwrap();
    assert_eq!(first.accepted.len(), 1);
    assert_eq!(first.skipped.len(), 1);
    assert!(matches!(
        first.skipped[0].reason,
        RejectReason::Duplicate { .. }
    ));

    let second = queue
        .submit_batch(vec![pdf("a.pdf", 5), pdf("a.pdf", 6)], &limits(10))
        .await
        .unwrap();
    // 同名不同大小不算重复
    assert_eq!(second.accepted.len(), 1);
    assert_eq!(second.accepted[0].size, 6);
    assert_eq!(second.skipped.len(), 1);

    queue.wait_for_idle().await;
    assert_eq!(queue.list().await.len(), 2);
}

#[tokio::test]
async fn test_count_limit_rejects_whole_batch() {
    let queue = queue(0.0);

    queue
        .submit_batch(vec![pdf("a.pdf", 1), pdf("b.pdf", 1)], &limits(2))
        .await
        .unwrap();

    let err = queue
        .submit_batch(vec![pdf("c.pdf", 1)], &limits(2))
        .await
        .unwrap_err();
    let AppError::Admission(admission) = err else {
        panic!("expected admission error, got {:?}", err);
    };
    assert!(matches!(
        admission,
        AdmissionError::TooManyFiles {
            max_files: 2,
            current: 2,
            adding: 1
        }
    ));
    assert_eq!(
        admission.to_string(),
        "Cannot upload more than 2 files. Current: 2, Adding: 1"
    );

    queue.wait_for_idle().await;
    assert_eq!(queue.list().await.len(), 2);
    assert_eq!(queue.sessions().len(), 1);
}

#[tokio::test]
async fn test_oversized_and_unsupported_files_are_skipped() {
    let queue = queue(0.0);
    let limits = QueueLimits {
        max_files: 10,
        max_size_mb: 1,
        accepted_types: vec!["image/*".to_string(), "application/pdf".to_string()],
    };

    let report = queue
        .submit_batch(
            vec![
                pdf("big.pdf", 2 * 1024 * 1024),
                CandidateFile::new("run.exe", 10, "application/x-msdownload"),
                pdf("ok.pdf", 1024 * 1024),
            ],
            &limits,
        )
        .await
        .unwrap();

    assert_eq!(report.accepted.len(), 1);
    assert_eq!(report.accepted[0].name, "ok.pdf");
    assert!(matches!(
        report.skipped[0].reason,
        RejectReason::TooLarge { .. }
    ));
    assert!(matches!(
        report.skipped[1].reason,
        RejectReason::UnsupportedType { .. }
    ));
    assert_eq!(report.session.unwrap().skipped_count, 2);
    queue.wait_for_idle().await;
}

#[tokio::test]
async fn test_in_flight_record_cannot_be_removed_or_cleared() {
    let queue = QueueOrchestrator::new(
        Arc::new(UnavailableEnricher),
        SimulationSettings {
            progress_interval: Duration::from_millis(50),
            failure_probability: 0.0,
            ..Default::default()
        },
    );

    let report = queue
        .submit_batch(vec![pdf("slow.pdf", 1)], &limits(10))
        .await
        .unwrap();
    let id = report.accepted[0].id;

    assert!(queue.is_in_flight(id));
    assert!(matches!(
        queue.remove(id).await,
        Err(AppError::InFlight { .. })
    ));
    assert!(matches!(
        queue.retry(id).await,
        Err(AppError::InFlight { .. })
    ));
    assert_eq!(queue.clear_all().await, 0);
    assert!(queue.get(id).is_some());

    queue.wait_for_idle().await;
    tokio_test::assert_ok!(queue.retry(id).await);
    queue.wait_for_idle().await;
    assert_eq!(queue.clear_all().await, 1);
    assert!(queue.list().await.is_empty());
    let removed = tokio_test::assert_ok!(queue.remove(id).await);
    assert!(!removed);
    tokio_test::assert_err!(queue.retry(id).await);
}

#[tokio::test]
async fn test_max_two_files_scenario() {
    let queue = queue(0.0);

    let report = queue
        .submit_batch(vec![pdf("one.pdf", 1), pdf("two.pdf", 1)], &limits(2))
        .await
        .unwrap();
    assert_eq!(report.accepted.len(), 2);
    queue.wait_for_idle().await;

    assert!(queue
        .submit_batch(vec![pdf("three.pdf", 1)], &limits(2))
        .await
        .is_err());

    assert!(queue.remove(1).await.unwrap());
    let report = queue
        .submit_batch(vec![pdf("three.pdf", 1)], &limits(2))
        .await
        .unwrap();
    assert_eq!(report.accepted[0].id, 3);
    queue.wait_for_idle().await;

    let stats = queue.stats();
    assert_eq!(stats.total_count, 2);
    assert_eq!(stats.completed_count, 2);
    assert_eq!(stats.uploading_count, 0);
}

#[tokio::test]
async fn test_image_upload_is_described() {
    let enricher = Arc::new(FixedEnricher {
        requests: Mutex::new(Vec::new()),
    });
    let queue = QueueOrchestrator::new(enricher.clone(), fast_settings(0.0));
    let rx = queue.subscribe();

    let report = queue
        .submit_batch(vec![CandidateFile::new("cat.png", 2048, "image/png")], &limits(10))
        .await
        .unwrap();
    let id = report.accepted[0].id;

    let events = collect_until_idle(&queue, rx).await;
    let tail: Vec<(u8, UploadStatus)> = events
        .iter()
        .rev()
        .take(2)
        .rev()
        .map(|e| (e.progress, e.status))
        .collect();
    assert_eq!(
        tail,
        vec![
            (100, UploadStatus::Analyzing),
            (100, UploadStatus::Completed)
        ]
    );

    let record = queue.get(id).unwrap();
    assert_eq!(record.status, UploadStatus::Completed);
    assert_eq!(record.description.as_deref(), Some("一只橘猫趴在窗台上"));
    assert_eq!(record.enrichment, EnrichmentOutcome::Described);
    assert_eq!(*enricher.requests.lock(), vec!["cat.png".to_string()]);
}

#[tokio::test]
async fn test_image_upload_completes_when_enrichment_fails() {
    let queue = queue(0.0);

    let report = queue
        .submit_batch(vec![CandidateFile::new("dog.jpg", 2048, "image/jpeg")], &limits(10))
        .await
        .unwrap();
    let id = report.accepted[0].id;
    queue.wait_for_idle().await;

    let record = queue.get(id).unwrap();
    assert_eq!(record.status, UploadStatus::Completed);
    assert_eq!(record.progress, 100);
    assert!(record.description.is_none());
    assert_eq!(record.enrichment, EnrichmentOutcome::Unavailable);
}

#[tokio::test]
async fn test_concurrent_uploads_all_complete() {
    let queue = queue(0.0);
    let files = (0..8).map(|i| pdf(&format!("doc{}.pdf", i), 100)).collect();

    let report = queue.submit_batch(files, &limits(10)).await.unwrap();
    assert_eq!(report.accepted.len(), 8);
    assert_eq!(queue.in_flight_count(), 8);

    queue.wait_for_idle().await;
    assert_eq!(queue.in_flight_count(), 0);

    let stats = queue.stats();
    assert_eq!(stats.completed_count, 8);
    assert_eq!(stats.completed_bytes, 800);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clear_all_never_deletes_admitted_records() {
    use std::sync::atomic::{AtomicBool, Ordering};

    for _round in 0..100 {
        let queue = Arc::new(QueueOrchestrator::new(
            Arc::new(UnavailableEnricher),
            SimulationSettings {
                progress_interval: Duration::from_millis(50),
                failure_probability: 0.0,
                ..Default::default()
            },
        ));
        let done = Arc::new(AtomicBool::new(false));

        let clearer = {
            let queue = queue.clone();
            let done = done.clone();
            tokio::spawn(async move {
                while !done.load(Ordering::Acquire) {
                    queue.clear_all().await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let files = (0..200).map(|i| pdf(&format!("f{}.pdf", i), 1)).collect();
        let report = queue.submit_batch(files, &limits(200)).await.unwrap();
        done.store(true, Ordering::Release);
        clearer.await.unwrap();

        assert_eq!(report.accepted.len(), 200);
        for record in &report.accepted {
            assert!(queue.get(record.id).is_some(), "#{} 被提前删除", record.id);
        }
        let session = report.session.unwrap();
        assert!(session.file_ids.iter().all(|id| queue.get(*id).is_some()));
    }
}

#[tokio::test]
async fn test_full_queue_events_fit_in_channel() {
    let config = upload_queue::Config {
        max_files: 200,
        progress_interval_ms: 1,
        failure_probability: 0.0,
        llm_api_key: String::new(),
        ..Default::default()
    };
    let queue = QueueOrchestrator::from_config(&config);
    let mut rx = queue.subscribe();

    let files = (0..200).map(|i| pdf(&format!("doc{}.pdf", i), 1)).collect();
    queue.submit_batch(files, &config.limits()).await.unwrap();
    queue.wait_for_idle().await;

    let mut completed = 0;
    loop {
        match rx.try_recv() {
            Ok(event) if event.status == UploadStatus::Completed => completed += 1,
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::TryRecvError::Empty) => break,
            Err(e) => panic!("订阅方不应落后: {:?}", e),
        }
    }
    assert_eq!(completed, 200);
}
