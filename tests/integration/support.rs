// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use leadrs::domain::services::deduplicator::DeduplicationConfig;
use leadrs::domain::services::enrichment_service::EnrichmentService;
use leadrs::domain::services::job_controller::JobController;
use leadrs::domain::services::llm_service::LlmExtractor;
use leadrs::domain::services::normalizer::NormalizerConfig;
use leadrs::domain::services::quality_scorer::QualityScorer;
use leadrs::domain::sources::adapter::DiscoverySource;
use leadrs::engines::politeness::{PolitenessConfig, PolitenessLimiter};
use leadrs::engines::reqwest_engine::ReqwestEngine;
use leadrs::engines::site_crawler::{CrawlerConfig, SiteCrawler};
use leadrs::infrastructure::repositories::memory_job_repo::InMemoryJobRepository;
use leadrs::infrastructure::repositories::memory_lead_repo::InMemoryLeadRepository;
use leadrs::infrastructure::sources::google_places::GooglePlacesSource;
use leadrs::infrastructure::sources::openstreetmap::OpenStreetMapSource;
use leadrs::utils::robots::RobotsChecker;
use leadrs::workers::job_worker::WorkerConfig;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 测试控制器组合
pub struct TestHarness {
    pub controller: JobController<InMemoryJobRepository, InMemoryLeadRepository>,
    pub job_repo: Arc<InMemoryJobRepository>,
    pub lead_repo: Arc<InMemoryLeadRepository>,
}

/// 组装一个指向测试数据源的完整控制器
///
/// politeness间隔与速率限制关闭，测试跑得快且行为确定
pub fn harness(
    sources: Vec<Arc<dyn DiscoverySource>>,
    llm: Option<Arc<dyn LlmExtractor>>,
    page_timeout_secs: u64,
    pool_size: usize,
) -> TestHarness {
    let client = reqwest::Client::new();
    let politeness = Arc::new(PolitenessLimiter::new(PolitenessConfig {
        max_global_concurrency: 16,
        max_per_domain: 2,
        per_domain_delay_ms: 0,
        requests_per_second: 0,
    }));
    let crawler_config = CrawlerConfig {
        page_timeout_secs,
        candidate_budget_secs: 30,
        user_agent: "leadrs".to_string(),
    };
    let crawler = Arc::new(SiteCrawler::new(
        Arc::new(ReqwestEngine::with_client(client.clone())),
        Arc::new(RobotsChecker::new(client)),
        politeness,
        crawler_config,
    ));

    let job_repo = Arc::new(InMemoryJobRepository::new());
    let lead_repo = Arc::new(InMemoryLeadRepository::new());
    let enrichment = Arc::new(EnrichmentService::new(
        crawler,
        QualityScorer::default(),
        llm,
        lead_repo.clone(),
    ));

    let worker_config = WorkerConfig {
        pool_size,
        source_timeout_secs: 10,
    };
    let controller = JobController::new(
        job_repo.clone(),
        lead_repo.clone(),
        sources,
        enrichment,
        QualityScorer::default(),
        worker_config,
        NormalizerConfig::default(),
        DeduplicationConfig::default(),
    );

    TestHarness {
        controller,
        job_repo,
        lead_repo,
    }
}

/// 启动一个提供固定首页的企业网站
pub async fn start_site(html: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html.to_string()))
        .mount(&server)
        .await;
    // robots.txt缺失（404）按允许全部处理
    server
}

/// 在wiremock上挂载Google Places的Text Search + Details
///
/// # 参数
///
/// * `businesses` - (place_id, 名称, 网站URL)
pub async fn mount_google_places(server: &MockServer, businesses: &[(&str, &str, Option<String>)]) {
    let results: Vec<_> = businesses
        .iter()
        .map(|(place_id, name, _)| {
            json!({"place_id": place_id, "name": name, "formatted_address": format!("{} Street, Lahore", name)})
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/maps/api/place/textsearch/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "results": results
        })))
        .mount(server)
        .await;

    for (place_id, _, website) in businesses {
        let result = match website {
            Some(url) => json!({"status": "OK", "result": {"website": url}}),
            None => json!({"status": "OK", "result": {}}),
        };
        Mock::given(method("GET"))
            .and(path("/maps/api/place/details/json"))
            .and(query_param("place_id", *place_id))
            .respond_with(ResponseTemplate::new(200).set_body_json(result))
            .mount(server)
            .await;
    }
}

/// 在wiremock上挂载Nominatim搜索结果
///
/// # 参数
///
/// * `entries` - (place_id, 名称, 网站URL)
pub async fn mount_openstreetmap(server: &MockServer, entries: &[(u64, &str, Option<String>)]) {
    let body: Vec<_> = entries
        .iter()
        .map(|(place_id, name, website)| {
            let mut extratags = json!({});
            if let Some(url) = website {
                extratags = json!({"website": url});
            }
            json!({
                "place_id": place_id,
                "display_name": format!("{}, Lahore, Pakistan", name),
                "name": name,
                "extratags": extratags
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// 指向wiremock的Google Places适配器
pub fn google_source(server: &MockServer) -> Arc<dyn DiscoverySource> {
    Arc::new(GooglePlacesSource::with_base_url(
        reqwest::Client::new(),
        "test-key".to_string(),
        server.uri(),
    ))
}

/// 指向wiremock的OpenStreetMap适配器
pub fn osm_source(server: &MockServer) -> Arc<dyn DiscoverySource> {
    Arc::new(OpenStreetMapSource::with_base_url(
        reqwest::Client::new(),
        server.uri(),
    ))
}
