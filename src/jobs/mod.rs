//! 定时对坐标置信度不足的地点做 AI 增强。

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ai::LocationEnhancer;
use crate::store::GameStore;

pub const DEFAULT_BATCH_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    EnhanceLowConfidenceLocations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: String,
    pub name: String,
    pub kind: JobKind,
    pub status: JobState,
    pub progress: usize,
    pub total: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub interval: Duration,
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub confidence_threshold: f64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: Duration::from_secs(1),
            confidence_threshold: 0.8,
        }
    }
}

pub struct JobService {
    store: Arc<dyn GameStore>,
    enhancer: Arc<LocationEnhancer>,
    settings: JobSettings,
    jobs: RwLock<HashMap<String, JobStatus>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl JobService {
    pub fn new(
        store: Arc<dyn GameStore>,
        enhancer: Arc<LocationEnhancer>,
        settings: JobSettings,
    ) -> Self {
        Self {
            store,
            enhancer,
            settings,
            jobs: RwLock::new(HashMap::new()),
            ticker: Mutex::new(None),
        }
    }

    /// 启动定时任务，重复调用无效
    pub fn start(self: &Arc<Self>) {
        let mut ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if ticker.is_some() {
            tracing::info!("Background jobs already running");
            return;
        }

        tracing::info!(
            "Starting background job service, interval {:?}",
            self.settings.interval
        );
        let service = Arc::clone(self);
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(service.settings.interval);
            // 第一次 tick 立即返回
            interval.tick().await;
            loop {
                interval.tick().await;
                service.process_pending_jobs().await;
            }
        }));
    }

    pub fn stop(&self) {
        let mut ticker = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = ticker.take() {
            handle.abort();
            tracing::info!("Background job service stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.ticker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub async fn create_location_enhancement_job(&self) -> String {
        let id = format!("enhance-locations-{}", Uuid::new_v4());
        let job = JobStatus {
            id: id.clone(),
            name: "Enhance Low Confidence Locations".to_string(),
            kind: JobKind::EnhanceLowConfidenceLocations,
            status: JobState::Pending,
            progress: 0,
            total: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        };
        self.jobs.write().await.insert(id.clone(), job);
        tracing::info!("Created job {}", id);
        id
    }

    pub async fn status(&self, id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(id).cloned()
    }

    pub async fn all(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<JobStatus> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        jobs
    }

    /// 只能取消尚未开始的任务
    pub async fn cancel(&self, id: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.get(id) {
            Some(job) if job.status == JobState::Pending => {
                jobs.remove(id);
                tracing::info!("Cancelled job {}", id);
                true
            }
            _ => false,
        }
    }

    /// 按创建顺序执行所有待处理任务，返回处理的任务数
    pub async fn process_pending_jobs(&self) -> usize {
        let mut processed = 0;
        while let Some(id) = self.claim_next().await {
            self.run(&id).await;
            processed += 1;
        }
        processed
    }

    // Pending -> Running 在同一把写锁内完成，避免重复执行
    async fn claim_next(&self) -> Option<String> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .values_mut()
            .filter(|j| j.status == JobState::Pending)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))?;
        job.status = JobState::Running;
        job.started_at = Some(Utc::now());
        Some(job.id.clone())
    }

    async fn run(&self, id: &str) {
        tracing::info!("Starting job {}", id);
        let result = self.enhance_low_confidence_locations(id).await;

        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            return;
        };
        job.completed_at = Some(Utc::now());
        match result {
            Ok(()) => {
                job.status = JobState::Completed;
                tracing::info!("Job completed: {}", id);
            }
            Err(e) => {
                job.status = JobState::Failed;
                tracing::error!("Job failed: {}: {}", id, e);
                job.error = Some(e);
            }
        }
    }

    async fn update_progress(&self, id: &str, progress: usize, total: usize) {
        if let Some(job) = self.jobs.write().await.get_mut(id) {
            job.progress = progress;
            job.total = total;
        }
    }

    async fn enhance_low_confidence_locations(&self, id: &str) -> Result<(), String> {
        let locations = self
            .store
            .list_locations()
            .await
            .map_err(|e| format!("Failed to enhance locations: {e}"))?;
        let pending: Vec<_> = locations
            .into_iter()
            .filter(|l| l.needs_enhancement(self.settings.confidence_threshold))
            .collect();
        let total = pending.len();
        self.update_progress(id, 0, total).await;
        tracing::info!("Found {} locations to enhance", total);

        let batch_size = self.settings.batch_size.max(1);
        let mut done = 0;
        for (index, batch) in pending.chunks(batch_size).enumerate() {
            if index > 0 && !self.settings.batch_pause.is_zero() {
                tokio::time::sleep(self.settings.batch_pause).await;
            }

            let results = join_all(batch.iter().map(|location| async move {
                let enhancement = self.enhancer.enhance(location).await;
                if enhancement.is_empty() {
                    return Err(format!("no usable enhancement for {}", location.id));
                }
                self.store
                    .save_enhancement(&location.id, &enhancement, Utc::now())
                    .await
                    .map_err(|e| format!("failed to save enhancement for {}: {e}", location.id))?;
                Ok(location.id.clone())
            }))
            .await;

            for result in results {
                match result {
                    Ok(location_id) => tracing::info!("Enhanced location {}", location_id),
                    Err(e) => tracing::warn!("{}", e),
                }
            }

            done += batch.len();
            self.update_progress(id, done, total).await;
        }
        Ok(())
    }
}
