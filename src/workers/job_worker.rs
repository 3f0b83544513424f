// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::Candidate;
use crate::domain::models::job::{Job, JobQuery, SourceOutcome};
use crate::domain::repositories::job_repository::JobRepository;
use crate::domain::repositories::lead_repository::LeadRepository;
use crate::domain::services::deduplicator::CandidateDeduplicator;
use crate::domain::services::enrichment_service::{
    CandidateOutcome, CandidateStatus, EnrichmentContext, EnrichmentService,
};
use crate::domain::services::normalizer::CandidateNormalizer;
use crate::domain::sources::adapter::DiscoverySource;
use crate::utils::errors::WorkerError;
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{error, info, warn};

/// 工作器配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 候选流水线并发上限（工作池大小）
    pub pool_size: usize,
    /// 单个数据源调用的超时（秒）
    pub source_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            source_timeout_secs: 20,
        }
    }
}

/// 任务工作器
///
/// 驱动一个任务从Running到终态：并发分发数据源 → 规范化 →
/// 去重 → 候选流水线扇出（受工作池约束）→ 通过mpsc通道聚合结果。
/// 任务计数器只在本工作器的接收循环中变更（单一写入者），
/// 并发完成不会丢失更新。
pub struct JobWorker<J: JobRepository, L: LeadRepository> {
    job_repo: Arc<J>,
    sources: Vec<Arc<dyn DiscoverySource>>,
    normalizer: CandidateNormalizer,
    deduplicator: CandidateDeduplicator,
    enrichment: Arc<EnrichmentService<L>>,
    config: WorkerConfig,
    cancel: watch::Receiver<bool>,
}

impl<J, L> JobWorker<J, L>
where
    J: JobRepository + 'static,
    L: LeadRepository + 'static,
{
    /// 创建新的任务工作器
    ///
    /// # 参数
    ///
    /// * `sources` - 已按任务请求筛选的数据源集合
    pub fn new(
        job_repo: Arc<J>,
        sources: Vec<Arc<dyn DiscoverySource>>,
        normalizer: CandidateNormalizer,
        deduplicator: CandidateDeduplicator,
        enrichment: Arc<EnrichmentService<L>>,
        config: WorkerConfig,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            job_repo,
            sources,
            normalizer,
            deduplicator,
            enrichment,
            config,
            cancel,
        }
    }

    /// 运行任务到终态
    ///
    /// 内部错误不会panic：任务被标记为失败并附上原因
    pub async fn run(self, mut job: Job) {
        let job_id = job.id;
        if let Err(e) = self.execute(&mut job).await {
            error!("Job {} aborted: {}", job_id, e);
            if !job.status.is_terminal() {
                job.add_warning(format!("internal error: {}", e));
                let _ = job.fail();
                if let Err(persist_err) = self.job_repo.update(&job).await {
                    error!("Failed to persist failed job {}: {}", job_id, persist_err);
                }
            }
        }
    }

    async fn execute(&self, job: &mut Job) -> Result<(), WorkerError> {
        job.start()?;
        self.job_repo.update(job).await?;
        info!(
            "Job {} running: niche={:?} location={:?} sources={:?}",
            job.id, job.query.niche, job.query.location, job.query.sources
        );

        // 1. 并发分发数据源，单源失败不中止任务
        let discoveries = self.discover_all(&job.query).await;
        let mut raw: Vec<Candidate> = Vec::new();
        let mut any_source_succeeded = false;
        for (outcome, candidates) in discoveries {
            if outcome.success {
                any_source_succeeded = true;
            } else {
                job.add_warning(format!(
                    "source {} failed: {}",
                    outcome.source,
                    outcome.error.as_deref().unwrap_or("unknown error")
                ));
            }
            job.source_outcomes.push(outcome);
            raw.extend(candidates);
        }

        if !any_source_succeeded {
            info!("Job {}: all sources failed", job.id);
            job.fail()?;
            self.job_repo.update(job).await?;
            return Ok(());
        }

        // 2. 规范化+去重，在任何网络爬取之前同步完成，
        //    让爬虫并发花在真正不同的企业上
        for candidate in &mut raw {
            self.normalizer.normalize(candidate);
        }
        let mut unique = self.deduplicator.dedup(raw);
        unique.truncate(job.query.max_results as usize);
        job.counters.candidates_found = unique.len() as u32;
        self.job_repo.update(job).await?;

        if unique.is_empty() {
            job.finish()?;
            self.job_repo.update(job).await?;
            return Ok(());
        }

        // 3. 候选流水线扇出，工作池限制并发任务数
        let ctx = EnrichmentContext {
            job_id: job.id,
            max_pages_per_site: job.query.max_pages_per_site,
            options: job.query.extract_options,
            cancel: self.cancel.clone(),
        };
        let (tx, mut rx) = mpsc::channel::<CandidateOutcome>(unique.len());
        let pool = Arc::new(Semaphore::new(self.config.pool_size.max(1)));

        for (key, candidate) in unique {
            let tx = tx.clone();
            let enrichment = self.enrichment.clone();
            let ctx = ctx.clone();
            let pool = pool.clone();
            tokio::spawn(async move {
                let _permit = pool
                    .acquire_owned()
                    .await
                    .expect("worker pool semaphore closed");
                let outcome = enrichment.enrich(&ctx, key, candidate).await;
                // 接收端关闭意味着任务已中止，丢弃即可
                let _ = tx.send(outcome).await;
            });
        }
        drop(tx);

        // 4. 单一写入循环：所有计数器变更都发生在这里
        while let Some(outcome) = rx.recv().await {
            match outcome.status {
                CandidateStatus::Cancelled => {}
                _ => {
                    job.counters.processed += 1;
                    if outcome.lead_id.is_some() {
                        job.counters.succeeded += 1;
                    } else {
                        job.counters.failed += 1;
                    }
                }
            }
            if let Some(warning) = outcome.warning {
                job.add_warning(warning);
            }
            if let Err(e) = self.job_repo.update(job).await {
                warn!("Job {}: progress persist failed: {}", job.id, e);
            }
        }

        // 5. 终态
        if *self.cancel.borrow() {
            job.cancel()?;
            info!("Job {} cancelled, {} leads persisted", job.id, job.counters.succeeded);
        } else {
            job.finish()?;
            info!(
                "Job {} finished: status={} succeeded={} failed={} warnings={}",
                job.id,
                job.status,
                job.counters.succeeded,
                job.counters.failed,
                job.warnings.len()
            );
        }
        self.job_repo.update(job).await?;
        Ok(())
    }

    /// 并发调用所有数据源
    ///
    /// 每个数据源独立超时，失败被折叠为SourceOutcome
    async fn discover_all(&self, query: &JobQuery) -> Vec<(SourceOutcome, Vec<Candidate>)> {
        let timeout = Duration::from_secs(self.config.source_timeout_secs);
        let futures = self.sources.iter().map(|source| {
            let source = source.clone();
            let niche = query.niche.clone();
            let location = query.location.clone();
            let limit = query.max_results;

            async move {
                let name = source.name();
                let started = Instant::now();
                let result = tokio::time::timeout(
                    timeout,
                    source.discover(&niche, location.as_deref(), limit),
                )
                .await;
                let duration_ms = started.elapsed().as_millis() as u64;

                match result {
                    Ok(Ok(candidates)) => {
                        info!("Source {} returned {} candidates", name, candidates.len());
                        (
                            SourceOutcome {
                                source: name.to_string(),
                                success: true,
                                candidate_count: candidates.len() as u32,
                                error: None,
                                duration_ms,
                            },
                            candidates,
                        )
                    }
                    Ok(Err(e)) => {
                        warn!("Source {} failed: {}", name, e);
                        (
                            SourceOutcome {
                                source: name.to_string(),
                                success: false,
                                candidate_count: 0,
                                error: Some(e.to_string()),
                                duration_ms,
                            },
                            Vec::new(),
                        )
                    }
                    Err(_) => {
                        warn!("Source {} timed out after {:?}", name, timeout);
                        (
                            SourceOutcome {
                                source: name.to_string(),
                                success: false,
                                candidate_count: 0,
                                error: Some("timed out".to_string()),
                                duration_ms,
                            },
                            Vec::new(),
                        )
                    }
                }
            }
        });

        join_all(futures).await
    }
}
