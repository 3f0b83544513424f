// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl::{CrawlResult, FetchedPage, PageStatus};
use crate::engines::politeness::PolitenessLimiter;
use crate::engines::traits::{FetchEngine, FetchRequest};
use crate::utils::retry_policy::RetryPolicy;
use crate::utils::robots::RobotsCheckerTrait;
use crate::utils::url_utils;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

/// 联系页优先路径关键词，按优先级排列
const PREFERRED_PATHS: [&str; 8] = [
    "contact", "kontakt", "about", "impressum", "team", "staff", "services", "location",
];

/// 不值得抓取的资源后缀
const SKIP_EXTENSIONS: [&str; 8] = [
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".zip", ".mp4",
];

/// 爬虫配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// 单页抓取超时（秒）
    pub page_timeout_secs: u64,
    /// 单候选软预算（秒），防止慢站拖垮整个任务
    pub candidate_budget_secs: u64,
    /// robots.txt检查使用的User-Agent
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            page_timeout_secs: 10,
            candidate_budget_secs: 60,
            user_agent: "leadrs".to_string(),
        }
    }
}

/// 爬取错误类型
#[derive(Debug, Error)]
pub enum CrawlError {
    /// 网站URL无法解析
    #[error("Invalid website URL: {0}")]
    InvalidUrl(String),
    /// 首页在重试后仍不可达，候选进入crawl_failed
    #[error("Homepage unreachable: {0}")]
    HomepageUnreachable(String),
    /// 任务被取消
    #[error("Cancelled")]
    Cancelled,
}

/// 站点爬虫
///
/// 对单个候选网站执行有界爬取：先抓首页，再沿同域链接抓取
/// 最多 `max_pages - 1` 个附加页面（优先联系页/关于页）。
/// 每次抓取都要先通过robots.txt检查并获取politeness许可；
/// 单页失败不中止候选，首页不可达才算爬取失败。
pub struct SiteCrawler {
    engine: Arc<dyn FetchEngine>,
    robots: Arc<dyn RobotsCheckerTrait>,
    politeness: Arc<PolitenessLimiter>,
    retry_policy: RetryPolicy,
    config: CrawlerConfig,
}

impl SiteCrawler {
    /// 创建新的站点爬虫实例
    pub fn new(
        engine: Arc<dyn FetchEngine>,
        robots: Arc<dyn RobotsCheckerTrait>,
        politeness: Arc<PolitenessLimiter>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            engine,
            robots,
            politeness,
            retry_policy: RetryPolicy::fetch_once(),
            config,
        }
    }

    /// 爬取候选网站
    ///
    /// # 参数
    ///
    /// * `website` - 候选网站URL
    /// * `max_pages` - 最多抓取的页面数（含首页）
    /// * `cancel` - 任务级取消信号，页面之间检查
    ///
    /// # 返回值
    ///
    /// * `Ok(CrawlResult)` - 含逐页状态的爬取结果
    /// * `Err(CrawlError)` - URL非法、首页不可达或任务被取消
    pub async fn crawl_site(
        &self,
        website: &str,
        max_pages: u32,
        cancel: &watch::Receiver<bool>,
    ) -> Result<CrawlResult, CrawlError> {
        let homepage = url_utils::parse_lenient(website)
            .map_err(|e| CrawlError::InvalidUrl(format!("{}: {}", website, e)))?;
        let domain = url_utils::domain_key(&homepage)
            .ok_or_else(|| CrawlError::InvalidUrl(format!("no host in {}", website)))?;

        let deadline = Instant::now() + Duration::from_secs(self.config.candidate_budget_secs);
        let mut result = CrawlResult::default();

        if *cancel.borrow() {
            return Err(CrawlError::Cancelled);
        }

        // 首页
        let homepage_page = self.fetch_page(homepage.as_str(), &domain).await;
        let homepage_ok = homepage_page.status == PageStatus::Ok;
        let homepage_html = homepage_page.html.clone();
        result.homepage_reachable = homepage_ok;
        let homepage_status = homepage_page.status;
        result.pages.push(homepage_page);

        if !homepage_ok {
            if homepage_status == PageStatus::SkippedByRobots {
                // 策略性跳过不算失败，按已知信息继续富化
                return Ok(result);
            }
            return Err(CrawlError::HomepageUnreachable(format!(
                "{} ({})",
                homepage, homepage_status
            )));
        }

        // 同域附加页面，联系页/关于页优先
        let extra = max_pages.saturating_sub(1) as usize;
        if extra == 0 {
            return Ok(result);
        }

        let links = match homepage_html {
            Some(html) => discover_links(&html, &homepage),
            None => Vec::new(),
        };

        for link in links.into_iter().take(extra) {
            if *cancel.borrow() {
                return Err(CrawlError::Cancelled);
            }
            if Instant::now() >= deadline {
                warn!("Candidate budget exhausted for {}, stopping crawl", domain);
                break;
            }
            let page = self.fetch_page(&link, &domain).await;
            result.pages.push(page);
        }

        Ok(result)
    }

    /// 抓取单个页面
    ///
    /// robots检查 → politeness许可 → 带超时抓取 → 超时/5xx退避重试一次。
    /// 任何失败都只影响该页面，返回带状态的页面记录。
    async fn fetch_page(&self, url: &str, domain: &str) -> FetchedPage {
        // Robots检查失败按允许处理，checker内部已记录日志
        let allowed = self
            .robots
            .is_allowed(url, &self.config.user_agent)
            .await
            .unwrap_or(true);
        if !allowed {
            debug!("robots.txt disallows {}", url);
            return FetchedPage::failed(url, PageStatus::SkippedByRobots);
        }

        let timeout = Duration::from_secs(self.config.page_timeout_secs);
        let mut attempt = 0;
        let mut last_status = PageStatus::Error;

        loop {
            attempt += 1;

            let response = {
                let _permit = self.politeness.acquire(domain).await;
                let request = FetchRequest::new(url, timeout);
                self.engine.fetch(&request).await
                // permit在此释放，退避等待不占用槽位
            };

            match response {
                Ok(resp) if resp.is_success() => {
                    return FetchedPage {
                        url: url.to_string(),
                        status: PageStatus::Ok,
                        html: Some(resp.content),
                        response_time_ms: resp.response_time_ms,
                    };
                }
                Ok(resp) if resp.is_server_error() => {
                    debug!("HTTP {} from {} (attempt {})", resp.status_code, url, attempt);
                    last_status = PageStatus::Error;
                }
                Ok(resp) => {
                    // 4xx不重试
                    debug!("HTTP {} from {}, giving up", resp.status_code, url);
                    return FetchedPage::failed(url, PageStatus::Blocked);
                }
                Err(e) if e.is_timeout() => {
                    debug!("Timeout fetching {} (attempt {})", url, attempt);
                    last_status = PageStatus::Timeout;
                }
                Err(e) => {
                    debug!("Fetch error for {}: {} (attempt {})", url, e, attempt);
                    last_status = PageStatus::Error;
                    if !e.is_retryable() {
                        return FetchedPage::failed(url, last_status);
                    }
                }
            }

            if !self.retry_policy.should_retry(attempt) {
                return FetchedPage::failed(url, last_status);
            }
            tokio::time::sleep(self.retry_policy.calculate_backoff(attempt)).await;
        }
    }
}

/// 从首页HTML中发现同域链接并按联系页启发式排序
///
/// 返回去重后的绝对URL，优先路径在前，其余按文档顺序
pub fn discover_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut seen = HashSet::new();
    let mut ranked: Vec<(usize, usize, String)> = Vec::new();

    for (order, element) in document.select(&selector).enumerate() {
        let href = match element.value().attr("href") {
            Some(h) => h,
            None => continue,
        };
        if href.starts_with('#') || href.starts_with("mailto:") || href.starts_with("javascript:")
            || href.starts_with("tel:")
        {
            continue;
        }

        let mut resolved = match url_utils::resolve_url(base, href) {
            Ok(u) => u,
            Err(_) => continue,
        };
        if resolved.scheme() != "http" && resolved.scheme() != "https" {
            continue;
        }
        if !url_utils::same_domain(&resolved, base) {
            continue;
        }
        resolved.set_fragment(None);

        let lower_path = resolved.path().to_lowercase();
        if SKIP_EXTENSIONS.iter().any(|ext| lower_path.ends_with(ext)) {
            continue;
        }
        // 首页自身不重复抓取
        if resolved.path() == base.path() || resolved.path() == "/" {
            continue;
        }

        let url_string = resolved.to_string();
        if !seen.insert(url_string.clone()) {
            continue;
        }

        let rank = PREFERRED_PATHS
            .iter()
            .position(|keyword| lower_path.contains(keyword))
            .unwrap_or(PREFERRED_PATHS.len());
        ranked.push((rank, order, url_string));
    }

    ranked.sort();
    ranked.into_iter().map(|(_, _, url)| url).collect()
}
