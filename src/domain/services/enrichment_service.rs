// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::{Candidate, DedupKey};
use crate::domain::models::crawl::CrawlResult;
use crate::domain::models::job::ExtractOptions;
use crate::domain::models::lead::{Lead, QualityLabel};
use crate::domain::services::extraction_service::{ContactExtractor, ExtractedSignals};
use crate::domain::services::llm_service::LlmExtractor;
use crate::domain::services::quality_scorer::{QualityScorer, ScoreSignals};
use crate::engines::site_crawler::{CrawlError, SiteCrawler};
use chrono::{Datelike, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::repositories::lead_repository::LeadRepository;

/// 单次候选富化的上下文
#[derive(Clone)]
pub struct EnrichmentContext {
    /// 所属任务ID
    pub job_id: Uuid,
    /// 每站最多抓取页面数
    pub max_pages_per_site: u32,
    /// 提取选项
    pub options: ExtractOptions,
    /// 任务级取消信号
    pub cancel: watch::Receiver<bool>,
}

/// 候选的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateStatus {
    /// 爬取+提取+评分全部完成
    Succeeded,
    /// 网站不可达，按已知字段产出线索
    CrawlFailed,
    /// 流水线失败，没有产出线索
    Failed,
    /// 任务取消，候选未处理完
    Cancelled,
}

/// 单个候选的处理结果
///
/// 通过mpsc通道汇报给job worker的单一写入循环
#[derive(Debug, Clone)]
pub struct CandidateOutcome {
    /// 去重键
    pub dedup_key: String,
    /// 候选名称（用于警告文案）
    pub candidate_name: String,
    /// 终态
    pub status: CandidateStatus,
    /// 产出的线索ID
    pub lead_id: Option<Uuid>,
    /// 需要附加到任务上的警告
    pub warning: Option<String>,
}

/// 富化编排器
///
/// 对每个去重后的候选顺序执行 爬取 → 提取 → (LLM增强) → 评分 →
/// 持久化。候选之间并发运行，但任何阶段的失败都只影响当前候选：
/// 异常被转换为该候选的Failed终态，不会传播到兄弟候选或任务本身。
/// LLM是可选协作方，未配置或出错时自动回退到纯正则提取。
pub struct EnrichmentService<L: LeadRepository> {
    crawler: Arc<SiteCrawler>,
    scorer: QualityScorer,
    llm: Option<Arc<dyn LlmExtractor>>,
    lead_repo: Arc<L>,
}

impl<L: LeadRepository> EnrichmentService<L> {
    /// 创建新的富化编排器
    ///
    /// # 参数
    ///
    /// * `llm` - 显式注入的LLM提取器，None表示纯正则路径
    pub fn new(
        crawler: Arc<SiteCrawler>,
        scorer: QualityScorer,
        llm: Option<Arc<dyn LlmExtractor>>,
        lead_repo: Arc<L>,
    ) -> Self {
        Self {
            crawler,
            scorer,
            llm,
            lead_repo,
        }
    }

    /// 富化单个候选
    ///
    /// 永不panic、永不返回Err：所有失败都折叠进CandidateOutcome
    pub async fn enrich(
        &self,
        ctx: &EnrichmentContext,
        key: DedupKey,
        candidate: Candidate,
    ) -> CandidateOutcome {
        let dedup_key = key.to_string();
        let name = candidate.name.clone();

        if *ctx.cancel.borrow() {
            return CandidateOutcome {
                dedup_key,
                candidate_name: name,
                status: CandidateStatus::Cancelled,
                lead_id: None,
                warning: None,
            };
        }

        // 1. 爬取（没有网站的候选跳过）
        let (crawl_result, crawl_warning) = match &candidate.website {
            Some(website) => {
                match self
                    .crawler
                    .crawl_site(website, ctx.max_pages_per_site, &ctx.cancel)
                    .await
                {
                    Ok(result) => (Some(result), None),
                    Err(CrawlError::Cancelled) => {
                        return CandidateOutcome {
                            dedup_key,
                            candidate_name: name,
                            status: CandidateStatus::Cancelled,
                            lead_id: None,
                            warning: None,
                        };
                    }
                    Err(e) => {
                        debug!("Crawl failed for {}: {}", name, e);
                        (None, Some(format!("crawl failed for {}: {}", name, e)))
                    }
                }
            }
            None => (None, None),
        };
        let crawl_failed = crawl_warning.is_some();

        // 2. 提取：逐页正则提取后合并
        let mut signals = ExtractedSignals::default();
        if let Some(result) = &crawl_result {
            for page in result.ok_pages() {
                if let Some(html) = &page.html {
                    signals.merge(ContactExtractor::extract(html, &ctx.options));
                }
            }
        }

        // 3. 可选的LLM增强，失败时保留正则结果继续
        if let Some(llm) = &self.llm {
            if let Some(result) = &crawl_result {
                if result.ok_count() > 0 {
                    self.augment_with_llm(llm, result, ctx, &mut signals).await;
                }
            }
        }

        // 4. 组装线索并评分
        let lead = self.build_lead(ctx, &dedup_key, candidate, crawl_result.as_ref(), signals);

        // 5. 持久化
        match self.lead_repo.upsert(&lead).await {
            Ok(saved) => CandidateOutcome {
                dedup_key,
                candidate_name: name,
                status: if crawl_failed {
                    CandidateStatus::CrawlFailed
                } else {
                    CandidateStatus::Succeeded
                },
                lead_id: Some(saved.id),
                warning: crawl_warning,
            },
            Err(e) => {
                warn!("Failed to persist lead for {}: {}", name, e);
                CandidateOutcome {
                    dedup_key,
                    candidate_name: name.clone(),
                    status: CandidateStatus::Failed,
                    lead_id: None,
                    warning: Some(format!("failed to persist lead for {}: {}", name, e)),
                }
            }
        }
    }

    /// LLM增强：把结构化提取结果并入正则信号
    async fn augment_with_llm(
        &self,
        llm: &Arc<dyn LlmExtractor>,
        crawl_result: &CrawlResult,
        ctx: &EnrichmentContext,
        signals: &mut ExtractedSignals,
    ) {
        let mut content = String::new();
        for page in crawl_result.ok_pages() {
            if let Some(html) = &page.html {
                content.push_str(html);
                content.push('\n');
            }
            if !ctx.options.full_content {
                // 默认只喂首页，full_content打开时才拼接全部页面
                break;
            }
        }

        match llm.extract_structured(&content).await {
            Ok((extracted, usage)) => {
                debug!(
                    "LLM extraction via {} used {} tokens",
                    llm.name(),
                    usage.total_tokens
                );
                signals.merge(ExtractedSignals {
                    emails: extracted
                        .emails
                        .into_iter()
                        .map(|e| e.to_lowercase())
                        .filter(|e| e.contains('@'))
                        .collect(),
                    phones: extracted.phones,
                    social_links: extracted.social_links,
                    services: extracted.services,
                    tech_stack: Vec::new(),
                    latest_copyright_year: None,
                });
            }
            Err(e) => {
                // 回退到纯正则结果，这是一条一等路径而非异常
                warn!("LLM extraction failed, using regex signals only: {}", e);
            }
        }
    }

    /// 从候选、爬取结果和信号组装线索
    fn build_lead(
        &self,
        ctx: &EnrichmentContext,
        dedup_key: &str,
        candidate: Candidate,
        crawl_result: Option<&CrawlResult>,
        signals: ExtractedSignals,
    ) -> Lead {
        let mut phones: Vec<String> = Vec::new();
        let mut seen_digits: Vec<String> = Vec::new();
        let mut push_phone = |raw: &str| {
            let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() || seen_digits.contains(&digits) {
                return;
            }
            seen_digits.push(digits);
            phones.push(raw.to_string());
        };
        if let Some(phone) = &candidate.phone {
            push_phone(phone);
        }
        for phone in &signals.phones {
            push_phone(phone);
        }

        let website_reachable = crawl_result.map(|r| r.homepage_reachable).unwrap_or(false);
        let current_year = Utc::now().year();
        let recent_activity = signals
            .latest_copyright_year
            .map(|year| year >= current_year - 1)
            .unwrap_or(false);

        let mut lead = Lead {
            id: Uuid::new_v4(),
            job_id: ctx.job_id,
            dedup_key: dedup_key.to_string(),
            name: candidate.name,
            website: candidate.website,
            emails: signals.emails,
            phones,
            address: candidate.address,
            social_links: signals.social_links,
            tech_stack: signals.tech_stack,
            services: signals.services,
            quality_score: 0,
            quality_label: QualityLabel::Low,
            source: candidate.source,
            website_reachable,
            recent_activity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let score = self.scorer.score(&ScoreSignals::from_lead(&lead));
        lead.quality_score = score.value;
        lead.quality_label = score.label;
        lead
    }
}
