// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use leadrs::application::dto::submit_job_request::SubmitJobRequest;
use leadrs::config::settings::Settings;
use leadrs::domain::models::job::ExtractOptions;
use leadrs::domain::services::enrichment_service::EnrichmentService;
use leadrs::domain::services::job_controller::JobController;
use leadrs::domain::services::llm_service;
use leadrs::domain::services::quality_scorer::QualityScorer;
use leadrs::engines::politeness::PolitenessLimiter;
use leadrs::engines::reqwest_engine::{ReqwestEngine, DEFAULT_USER_AGENT};
use leadrs::engines::site_crawler::SiteCrawler;
use leadrs::infrastructure::repositories::memory_job_repo::InMemoryJobRepository;
use leadrs::infrastructure::repositories::memory_lead_repo::InMemoryLeadRepository;
use leadrs::infrastructure::sources::factory;
use leadrs::utils::robots::RobotsChecker;
use leadrs::utils::telemetry;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

struct CliArgs {
    niche: String,
    location: Option<String>,
    max_results: u32,
    max_pages_per_site: u32,
    sources: Option<Vec<String>>,
}

fn print_usage() {
    eprintln!("Usage: leadrs <niche> [location] [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --sources a,b,c     Discovery sources to query (default: all configured)");
    eprintln!("  --max-results N     Maximum candidates to process, 1-100 (default: 20)");
    eprintln!("  --pages N           Pages to crawl per site, 1-10 (default: 3)");
}

fn parse_args(args: Vec<String>) -> Result<CliArgs, String> {
    let mut niche = None;
    let mut location = None;
    let mut max_results = 20;
    let mut max_pages_per_site = 3;
    let mut sources = None;

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--sources" => {
                let value = iter.next().ok_or("--sources requires a value")?;
                sources = Some(value.split(',').map(|s| s.trim().to_string()).collect());
            }
            "--max-results" => {
                let value = iter.next().ok_or("--max-results requires a value")?;
                max_results = value
                    .parse()
                    .map_err(|_| format!("invalid --max-results: {}", value))?;
            }
            "--pages" => {
                let value = iter.next().ok_or("--pages requires a value")?;
                max_pages_per_site = value
                    .parse()
                    .map_err(|_| format!("invalid --pages: {}", value))?;
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown option: {}", other));
            }
            positional => {
                if niche.is_none() {
                    niche = Some(positional.to_string());
                } else if location.is_none() {
                    location = Some(positional.to_string());
                } else {
                    return Err(format!("unexpected argument: {}", positional));
                }
            }
        }
    }

    Ok(CliArgs {
        niche: niche.ok_or("niche is required")?,
        location,
        max_results,
        max_pages_per_site,
        sources,
    })
}

/// 主函数
///
/// CLI协作方参考实现：提交一个发现任务，轮询到终态并打印线索
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();

    let args = match parse_args(std::env::args().skip(1).collect()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    // 3. Build shared HTTP client and discovery sources
    let client = reqwest::Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .build()?;
    let sources = factory::build_sources(&settings.sources, client.clone());

    // 4. Build the crawl stack
    let politeness = Arc::new(PolitenessLimiter::new(settings.politeness.clone()));
    let robots = Arc::new(RobotsChecker::new(client.clone()));
    let engine = Arc::new(ReqwestEngine::with_client(client.clone()));
    let crawler = Arc::new(SiteCrawler::new(
        engine,
        robots,
        politeness,
        settings.crawler.clone(),
    ));

    // 5. Repositories and optional LLM collaborator
    let job_repo = Arc::new(InMemoryJobRepository::new());
    let lead_repo = Arc::new(InMemoryLeadRepository::new());
    let llm = llm_service::build_extractor(&settings.llm, client.clone());
    if llm.is_none() {
        info!("No LLM provider configured, using regex extraction only");
    }

    // 6. Wire the controller
    let enrichment = Arc::new(EnrichmentService::new(
        crawler,
        QualityScorer::default(),
        llm,
        lead_repo.clone(),
    ));
    let controller = JobController::new(
        job_repo,
        lead_repo,
        sources.clone(),
        enrichment,
        QualityScorer::default(),
        settings.worker.clone(),
        settings.normalizer.clone(),
        settings.dedup.clone(),
    );

    // 7. Submit and poll to completion
    let requested_sources = args
        .sources
        .unwrap_or_else(|| sources.iter().map(|s| s.name().to_string()).collect());
    let request = SubmitJobRequest {
        niche: args.niche,
        location: args.location,
        max_results: args.max_results,
        max_pages_per_site: args.max_pages_per_site,
        sources: requested_sources,
        extract_options: ExtractOptions::default(),
    };

    let job_id = match controller.submit_job(request).await {
        Ok(id) => id,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    };
    println!("job {} submitted", job_id);

    let mut last_processed = 0;
    let job = loop {
        let status = controller.job_status(job_id).await?;
        if status.processed != last_processed {
            println!(
                "progress: {}/{} candidates processed",
                status.processed, status.candidates_found
            );
            last_processed = status.processed;
        }
        if status.status != "queued" && status.status != "running" {
            break controller
                .wait_for_completion(job_id, Duration::from_millis(50))
                .await?;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    };

    // 8. Print results
    println!();
    println!("job {} {}", job.id, job.status);
    for outcome in &job.source_outcomes {
        println!(
            "  source {}: {} ({} candidates, {}ms)",
            outcome.source,
            if outcome.success { "ok" } else { "failed" },
            outcome.candidate_count,
            outcome.duration_ms
        );
    }
    if !job.warnings.is_empty() {
        println!("warnings:");
        for warning in &job.warnings {
            println!("  - {}", warning);
        }
    }

    let leads = controller.list_leads(job_id).await?;
    println!();
    println!(
        "{:<32} {:>5} {:<8} {:<30} {:<18}",
        "NAME", "SCORE", "LABEL", "EMAIL", "PHONE"
    );
    for lead in &leads {
        println!(
            "{:<32} {:>5} {:<8} {:<30} {:<18}",
            lead.name,
            lead.quality_score,
            lead.quality_label.to_string(),
            lead.emails.first().map(String::as_str).unwrap_or("-"),
            lead.phones.first().map(String::as_str).unwrap_or("-"),
        );
    }
    println!();
    println!("{} leads", leads.len());

    if job.status == leadrs::domain::models::job::JobStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
