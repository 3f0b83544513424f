// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::support::*;
use anyhow::Result;
use async_trait::async_trait;
use leadrs::application::dto::submit_job_request::SubmitJobRequest;
use leadrs::domain::models::job::{ExtractOptions, Job, JobStatus};
use leadrs::domain::services::job_controller::JobError;
use leadrs::domain::services::llm_service::{
    LlmExtractor, StructuredExtraction, TokenUsage,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(sources: Vec<&str>, max_results: u32, max_pages_per_site: u32) -> SubmitJobRequest {
    SubmitJobRequest {
        niche: "dentist".to_string(),
        location: Some("Lahore".to_string()),
        max_results,
        max_pages_per_site,
        sources: sources.into_iter().map(String::from).collect(),
        extract_options: ExtractOptions::default(),
    }
}

async fn run_to_completion(harness: &TestHarness, job_id: Uuid) -> Job {
    tokio::time::timeout(
        Duration::from_secs(30),
        harness
            .controller
            .wait_for_completion(job_id, Duration::from_millis(50)),
    )
    .await
    .expect("job did not reach a terminal state in time")
    .expect("job lookup failed")
}

struct BrokenLlm;

#[async_trait]
impl LlmExtractor for BrokenLlm {
    async fn extract_structured(
        &self,
        _page_text: &str,
    ) -> Result<(StructuredExtraction, TokenUsage)> {
        Err(anyhow::anyhow!("provider unavailable"))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

/// 两个数据源各返回3个候选且1个域名重叠 → 最终5条线索，
/// 任务completed
#[tokio::test]
async fn test_two_sources_with_domain_overlap_produce_five_leads() {
    let site_a = start_site("<p>a@dental-a.pk</p>").await;
    let site_b = start_site("<p>b@dental-b.pk</p>").await;
    let site_c = start_site("<p>c@dental-c.pk</p>").await;
    let site_d = start_site("<p>d@dental-d.pk</p>").await;
    let site_e = start_site("<p>e@dental-e.pk</p>").await;

    let google = MockServer::start().await;
    mount_google_places(
        &google,
        &[
            ("p1", "Dental A", Some(site_a.uri())),
            ("p2", "Dental B", Some(site_b.uri())),
            ("p3", "Dental C", Some(site_c.uri())),
        ],
    )
    .await;

    let osm = MockServer::start().await;
    mount_openstreetmap(
        &osm,
        &[
            // 与google_places重叠的域名
            (31, "Dental C Clinic", Some(site_c.uri())),
            (32, "Dental D", Some(site_d.uri())),
            (33, "Dental E", Some(site_e.uri())),
        ],
    )
    .await;

    let harness = harness(
        vec![google_source(&google), osm_source(&osm)],
        None,
        5,
        8,
    );
    let job_id = harness
        .controller
        .submit_job(request(vec!["google_places", "openstreetmap"], 20, 1))
        .await
        .unwrap();
    let job = run_to_completion(&harness, job_id).await;

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.candidates_found, 5);
    assert_eq!(job.counters.succeeded, 5);
    assert_eq!(job.counters.failed, 0);

    let leads = harness.controller.list_leads(job_id).await.unwrap();
    assert_eq!(leads.len(), 5);

    // 重叠域名合并后保留高优先级来源
    let merged = leads
        .iter()
        .find(|l| l.website.as_deref() == Some(site_c.uri().trim_end_matches('/')))
        .or_else(|| leads.iter().find(|l| l.name.contains("Dental C")))
        .expect("merged lead missing");
    assert_eq!(merged.source, "google_places");

    // 每条线索的邮箱都来自各自的网站
    assert!(leads.iter().all(|l| !l.emails.is_empty()));
}

/// 单个数据源失败不阻止任务：其余数据源成功时任务
/// 以completed_with_warnings收尾
#[tokio::test]
async fn test_single_source_failure_yields_completed_with_warnings() {
    let site_a = start_site("<p>a@dental-a.pk</p>").await;

    let google = MockServer::start().await;
    mount_google_places(&google, &[("p1", "Dental A", Some(site_a.uri()))]).await;

    // OSM端点宕机
    let osm = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&osm)
        .await;

    let harness = harness(vec![google_source(&google), osm_source(&osm)], None, 5, 8);
    let job_id = harness
        .controller
        .submit_job(request(vec!["google_places", "openstreetmap"], 20, 1))
        .await
        .unwrap();
    let job = run_to_completion(&harness, job_id).await;

    assert_eq!(job.status, JobStatus::CompletedWithWarnings);
    assert!(job.warnings.iter().any(|w| w.contains("openstreetmap")));
    assert_eq!(job.counters.succeeded, 1);

    let outcomes = &job.source_outcomes;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().any(|o| o.source == "google_places" && o.success));
    assert!(outcomes.iter().any(|o| o.source == "openstreetmap" && !o.success));
}

/// 所有数据源都失败 → 任务failed，candidates_found == 0
#[tokio::test]
async fn test_all_sources_fail_job_fails() {
    let google = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/maps/api/place/textsearch/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "REQUEST_DENIED",
            "error_message": "invalid key",
            "results": []
        })))
        .mount(&google)
        .await;

    let osm = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&osm)
        .await;

    let harness = harness(vec![google_source(&google), osm_source(&osm)], None, 5, 8);
    let job_id = harness
        .controller
        .submit_job(request(vec!["google_places", "openstreetmap"], 20, 1))
        .await
        .unwrap();
    let job = run_to_completion(&harness, job_id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.counters.candidates_found, 0);
    assert!(job.source_outcomes.iter().all(|o| !o.success));
    assert!(harness.lead_repo.is_empty());
    assert_eq!(job.warnings.len(), 2);
}

/// 单个候选的抓取超时不阻塞兄弟候选的流水线
#[tokio::test]
async fn test_slow_site_does_not_block_siblings() {
    let fast_site = start_site("<p>fast@dental.pk</p>").await;
    let slow_site = MockServer::start().await;
    // 只有首页慢，robots.txt等其余路径立即404
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<p>slow@dental.pk</p>")
                .set_delay(Duration::from_secs(20)),
        )
        .mount(&slow_site)
        .await;

    let google = MockServer::start().await;
    mount_google_places(
        &google,
        &[
            ("p1", "Fast Dental", Some(fast_site.uri())),
            ("p2", "Slow Dental", Some(slow_site.uri())),
        ],
    )
    .await;

    let started = Instant::now();
    let harness = harness(vec![google_source(&google)], None, 1, 8);
    let job_id = harness
        .controller
        .submit_job(request(vec!["google_places"], 20, 1))
        .await
        .unwrap();
    let job = run_to_completion(&harness, job_id).await;
    let elapsed = started.elapsed();

    // 慢站超时重试一次后按crawl_failed收尾，没有拖住任务
    assert_eq!(job.status, JobStatus::CompletedWithWarnings);
    assert!(elapsed < Duration::from_secs(10), "took {:?}", elapsed);
    assert_eq!(job.counters.processed, 2);
    assert_eq!(job.counters.succeeded, 2);
    assert!(job.warnings.iter().any(|w| w.contains("Slow Dental")));

    let leads = harness.controller.list_leads(job_id).await.unwrap();
    let fast = leads.iter().find(|l| l.name.contains("Fast")).unwrap();
    let slow = leads.iter().find(|l| l.name.contains("Slow")).unwrap();
    assert!(fast.website_reachable);
    assert_eq!(fast.emails, vec!["fast@dental.pk".to_string()]);
    assert!(!slow.website_reachable);
    assert!(slow.emails.is_empty());
}

/// LLM协作方不可用时回退到正则提取：线索仍然有联系信息和评分
#[tokio::test]
async fn test_llm_unavailable_falls_back_to_regex_extraction() {
    let site = start_site(
        r#"<p>office@smiledental.pk</p>
           <a href="tel:+924211122233">Call</a>
           <a href="https://facebook.com/smiledentalpk">fb</a>"#,
    )
    .await;

    let google = MockServer::start().await;
    mount_google_places(&google, &[("p1", "Smile Dental", Some(site.uri()))]).await;

    let harness = harness(
        vec![google_source(&google)],
        Some(Arc::new(BrokenLlm)),
        5,
        8,
    );
    let job_id = harness
        .controller
        .submit_job(request(vec!["google_places"], 20, 1))
        .await
        .unwrap();
    let job = run_to_completion(&harness, job_id).await;

    // LLM失败被吸收，任务照常完成
    assert_eq!(job.status, JobStatus::Completed);

    let leads = harness.controller.list_leads(job_id).await.unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].emails, vec!["office@smiledental.pk".to_string()]);
    assert!(!leads[0].phones.is_empty());
    assert!(leads[0].social_links.contains_key("facebook"));
    assert!(leads[0].quality_score > 0);
}

/// 取消传播到在途流水线；已完成候选的线索保持持久化
#[tokio::test]
async fn test_cancellation_preserves_completed_leads() {
    let page = |label: &str| {
        format!(
            r#"<p>{}@dental.pk</p><a href="/contact">contact</a>"#,
            label
        )
    };
    let mut sites = Vec::new();
    for label in ["one", "two", "three"] {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page(label))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contact"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<p>contact page</p>")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
        sites.push(server);
    }

    let google = MockServer::start().await;
    mount_google_places(
        &google,
        &[
            ("p1", "Dental One", Some(sites[0].uri())),
            ("p2", "Dental Two", Some(sites[1].uri())),
            ("p3", "Dental Three", Some(sites[2].uri())),
        ],
    )
    .await;

    // 工作池=1让候选顺序处理，取消信号落在中途
    let harness = harness(vec![google_source(&google)], None, 5, 1);
    let job_id = harness
        .controller
        .submit_job(request(vec!["google_places"], 20, 2))
        .await
        .unwrap();

    // 等第一条线索持久化后取消
    let deadline = Instant::now() + Duration::from_secs(15);
    while harness.lead_repo.is_empty() {
        assert!(Instant::now() < deadline, "no lead persisted before cancel");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let delivered = harness.controller.cancel_job(job_id).await.unwrap();
    assert!(delivered);

    let job = run_to_completion(&harness, job_id).await;
    assert_eq!(job.status, JobStatus::Cancelled);
    // 已完成的候选留在存储里，未完成的没有被处理
    assert!(job.counters.processed >= 1);
    assert!(job.counters.processed < 3);
    let leads = harness.controller.list_leads(job_id).await.unwrap();
    assert!(!leads.is_empty());
}

/// 引用未配置的数据源在提交时失败
#[tokio::test]
async fn test_unknown_source_rejected_at_submission() {
    let google = MockServer::start().await;
    mount_google_places(&google, &[]).await;

    let harness = harness(vec![google_source(&google)], None, 5, 8);
    let err = harness
        .controller
        .submit_job(request(vec!["google_places", "bogus_source"], 20, 1))
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::Validation(_)));
    assert!(err.to_string().contains("bogus_source"));
}

/// 评分可以在不重新爬取的情况下离线重算
#[tokio::test]
async fn test_recompute_scores_is_idempotent() {
    let site = start_site("<p>office@smiledental.pk</p>").await;
    let google = MockServer::start().await;
    mount_google_places(&google, &[("p1", "Smile Dental", Some(site.uri()))]).await;

    let harness = harness(vec![google_source(&google)], None, 5, 8);
    let job_id = harness
        .controller
        .submit_job(request(vec!["google_places"], 20, 1))
        .await
        .unwrap();
    run_to_completion(&harness, job_id).await;

    let before = harness.controller.list_leads(job_id).await.unwrap();
    let recomputed = harness.controller.recompute_scores(job_id).await.unwrap();
    let after = harness.controller.list_leads(job_id).await.unwrap();

    assert_eq!(recomputed, 1);
    // 相同信号重算得到相同评分和标签
    assert_eq!(before[0].quality_score, after[0].quality_score);
    assert_eq!(before[0].quality_label, after[0].quality_label);
}
