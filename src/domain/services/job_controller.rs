// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::job_status_response::JobStatusResponse;
use crate::application::dto::submit_job_request::SubmitJobRequest;
use crate::domain::models::job::Job;
use crate::domain::models::lead::Lead;
use crate::domain::repositories::job_repository::JobRepository;
use crate::domain::repositories::lead_repository::LeadRepository;
use crate::domain::repositories::RepositoryError;
use crate::domain::services::deduplicator::{CandidateDeduplicator, DeduplicationConfig};
use crate::domain::services::enrichment_service::EnrichmentService;
use crate::domain::services::normalizer::{CandidateNormalizer, NormalizerConfig};
use crate::domain::services::quality_scorer::{QualityScorer, ScoreSignals};
use crate::domain::sources::adapter::DiscoverySource;
use crate::workers::job_worker::{JobWorker, WorkerConfig};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// 任务控制器错误类型
#[derive(Error, Debug)]
pub enum JobError {
    /// 提交请求非法
    #[error("Validation error: {0}")]
    Validation(String),

    /// 任务不存在
    #[error("Job not found")]
    NotFound,

    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 任务控制器
///
/// 对外协作方（API/CLI）可见的唯一组件：提交任务、读取状态、
/// 读取线索、取消任务和离线重算评分。每次提交启动一个后台
/// JobWorker，取消信号通过watch通道广播到该任务的所有在途
/// 候选流水线。
pub struct JobController<J, L>
where
    J: JobRepository + 'static,
    L: LeadRepository + 'static,
{
    job_repo: Arc<J>,
    lead_repo: Arc<L>,
    /// 进程配置的全部数据源，提交时按请求筛选
    sources: Vec<Arc<dyn DiscoverySource>>,
    enrichment: Arc<EnrichmentService<L>>,
    scorer: QualityScorer,
    worker_config: WorkerConfig,
    normalizer_config: NormalizerConfig,
    dedup_config: DeduplicationConfig,
    /// 运行中任务的取消发送端
    cancel_senders: Arc<DashMap<Uuid, watch::Sender<bool>>>,
}

impl<J, L> JobController<J, L>
where
    J: JobRepository + 'static,
    L: LeadRepository + 'static,
{
    /// 创建新的任务控制器
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job_repo: Arc<J>,
        lead_repo: Arc<L>,
        sources: Vec<Arc<dyn DiscoverySource>>,
        enrichment: Arc<EnrichmentService<L>>,
        scorer: QualityScorer,
        worker_config: WorkerConfig,
        normalizer_config: NormalizerConfig,
        dedup_config: DeduplicationConfig,
    ) -> Self {
        Self {
            job_repo,
            lead_repo,
            sources,
            enrichment,
            scorer,
            worker_config,
            normalizer_config,
            dedup_config,
            cancel_senders: Arc::new(DashMap::new()),
        }
    }

    /// 提交任务
    ///
    /// 验证请求并立即返回任务ID，处理在后台异步进行
    ///
    /// # 错误
    ///
    /// * `JobError::Validation` - 字段越界或引用了未配置的数据源
    pub async fn submit_job(&self, request: SubmitJobRequest) -> Result<Uuid, JobError> {
        request
            .validate()
            .map_err(|e| JobError::Validation(e.to_string()))?;

        let mut selected: Vec<Arc<dyn DiscoverySource>> = Vec::new();
        for name in &request.sources {
            match self.sources.iter().find(|s| s.name() == name.as_str()) {
                Some(source) => selected.push(source.clone()),
                None => {
                    return Err(JobError::Validation(format!("unknown source: {}", name)));
                }
            }
        }

        let job = Job::new(request.into_query());
        let job_id = job.id;
        self.job_repo.create(&job).await?;

        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.cancel_senders.insert(job_id, cancel_tx);

        let worker = JobWorker::new(
            self.job_repo.clone(),
            selected,
            CandidateNormalizer::new(self.normalizer_config.clone()),
            CandidateDeduplicator::new(self.dedup_config.clone()),
            self.enrichment.clone(),
            self.worker_config.clone(),
            cancel_rx,
        );
        let cancel_senders = self.cancel_senders.clone();
        tokio::spawn(async move {
            worker.run(job).await;
            cancel_senders.remove(&job_id);
        });

        info!("Job {} submitted", job_id);
        Ok(job_id)
    }

    /// 读取任务状态
    pub async fn job_status(&self, id: Uuid) -> Result<JobStatusResponse, JobError> {
        let job = self
            .job_repo
            .find_by_id(id)
            .await?
            .ok_or(JobError::NotFound)?;
        Ok(JobStatusResponse::from(&job))
    }

    /// 列出某任务产出的线索
    pub async fn list_leads(&self, job_id: Uuid) -> Result<Vec<Lead>, JobError> {
        self.job_repo
            .find_by_id(job_id)
            .await?
            .ok_or(JobError::NotFound)?;
        Ok(self.lead_repo.list_by_job(job_id).await?)
    }

    /// 取消任务
    ///
    /// 取消信号传播到所有在途候选流水线；已完成候选的线索
    /// 保持持久化
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 信号已送达运行中的任务
    /// * `Ok(false)` - 任务已处于终态，无可取消
    pub async fn cancel_job(&self, id: Uuid) -> Result<bool, JobError> {
        if let Some(sender) = self.cancel_senders.get(&id) {
            let delivered = sender.send(true).is_ok();
            info!("Job {} cancellation requested", id);
            return Ok(delivered);
        }
        // 没有运行中的worker：确认任务存在后报告不可取消
        self.job_repo
            .find_by_id(id)
            .await?
            .ok_or(JobError::NotFound)?;
        Ok(false)
    }

    /// 重算某任务全部线索的质量评分
    ///
    /// 评分是存储信号的纯函数，调整权重后无需重新爬取。
    ///
    /// # 返回值
    ///
    /// 重算的线索数量
    pub async fn recompute_scores(&self, job_id: Uuid) -> Result<u32, JobError> {
        let leads = self.list_leads(job_id).await?;
        let mut updated = 0;
        for lead in leads {
            let score = self.scorer.score(&ScoreSignals::from_lead(&lead));
            self.lead_repo
                .update_score(lead.id, score.value, score.label)
                .await?;
            updated += 1;
        }
        Ok(updated)
    }

    /// 等待任务进入终态（CLI与测试用的辅助方法）
    pub async fn wait_for_completion(&self, id: Uuid, poll_interval: Duration) -> Result<Job, JobError> {
        loop {
            let job = self
                .job_repo
                .find_by_id(id)
                .await?
                .ok_or(JobError::NotFound)?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
