// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::time::{Duration, Instant};
use url::Url;

use crate::utils::retry_policy::RetryPolicy;

/// Robots.txt检查器接口
#[async_trait]
pub trait RobotsCheckerTrait: Send + Sync {
    /// 检查URL是否被允许访问
    async fn is_allowed(&self, url_str: &str, user_agent: &str) -> Result<bool>;
}

/// 缓存的Robots.txt内容
#[derive(Clone)]
struct CachedRobots {
    /// 内容
    content: String,

    /// 过期时间
    expires_at: Instant,
}

/// Robots.txt检查器
///
/// 每个域名的robots.txt只获取一次（带TTL的内存缓存），
/// 仅执行Disallow规则；Crawl-delay指令会被解析并记录日志，
/// 实际节流由politeness限流器负责
pub struct RobotsChecker {
    /// HTTP客户端
    client: Client,

    /// 内存缓存，键为robots.txt的完整URL
    cache: DashMap<String, CachedRobots>,

    /// 缓存有效期
    cache_ttl: Duration,

    /// 重试策略
    retry_policy: RetryPolicy,
}

#[async_trait]
impl RobotsCheckerTrait for RobotsChecker {
    async fn is_allowed(&self, url_str: &str, user_agent: &str) -> Result<bool> {
        let content = self.get_robots_content(url_str).await?;
        if content.is_empty() {
            return Ok(true);
        }
        let mut matcher = DefaultMatcher::default();
        Ok(matcher.one_agent_allowed_by_robots(&content, user_agent, url_str))
    }
}

impl Default for RobotsChecker {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl RobotsChecker {
    /// 创建新的Robots检查器实例
    pub fn new(client: Client) -> Self {
        Self {
            client,
            cache: DashMap::new(),
            cache_ttl: Duration::from_secs(3600),
            retry_policy: RetryPolicy {
                max_attempts: 2,
                initial_backoff: Duration::from_secs(1),
                max_backoff: Duration::from_secs(5),
                ..Default::default()
            },
        }
    }

    /// 获取Robots.txt内容（带缓存）
    async fn get_robots_content(&self, url_str: &str) -> Result<String> {
        let url = Url::parse(url_str)?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("URL has no host: {}", url_str))?;
        let scheme = url.scheme();

        let robots_url = match url.port() {
            Some(port) => format!("{}://{}:{}/robots.txt", scheme, host, port),
            None => format!("{}://{}/robots.txt", scheme, host),
        };

        // 1. Check memory cache
        if let Some(cached) = self.cache.get(&robots_url) {
            if cached.expires_at > Instant::now() {
                return Ok(cached.content.clone());
            }
        }

        // 2. Fetch robots.txt with retry
        let content = self.fetch_robots(&robots_url).await;

        if let Some(delay) = parse_crawl_delay(&content) {
            // Disallow-only compliance: pacing stays with the politeness limiter
            tracing::debug!(
                "robots.txt for {} requests crawl-delay of {:?} (not enforced)",
                host,
                delay
            );
        }

        // 3. Update memory cache
        self.cache.insert(
            robots_url,
            CachedRobots {
                content: content.clone(),
                expires_at: Instant::now() + self.cache_ttl,
            },
        );

        Ok(content)
    }

    async fn fetch_robots(&self, robots_url: &str) -> String {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let response = self
                .client
                .get(robots_url)
                .timeout(Duration::from_secs(5))
                .send()
                .await;

            match response {
                Ok(resp) => {
                    if resp.status().is_success() {
                        return resp.text().await.unwrap_or_default();
                    }
                    if !resp.status().is_server_error() {
                        // 404 and other client errors mean no usable robots.txt:
                        // treat as allow-all
                        return String::new();
                    }
                    if !self.retry_policy.should_retry(attempt) {
                        tracing::warn!(
                            "Failed to fetch {} after {} attempts: HTTP {}",
                            robots_url,
                            attempt,
                            resp.status()
                        );
                        return String::new();
                    }
                }
                Err(e) => {
                    if !self.retry_policy.should_retry(attempt) {
                        tracing::warn!("Failed to fetch {}: {}", robots_url, e);
                        return String::new();
                    }
                }
            }

            tokio::time::sleep(self.retry_policy.calculate_backoff(attempt)).await;
        }
    }
}

/// 解析Crawl-delay指令
///
/// 简化实现：取文件中出现的第一个Crawl-delay值，
/// 不区分User-agent块
fn parse_crawl_delay(content: &str) -> Option<Duration> {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let lower = line.to_lowercase();
        if let Some(value) = lower.strip_prefix("crawl-delay:") {
            if let Ok(d) = value.trim().parse::<f64>() {
                if d.is_finite() && d >= 0.0 {
                    return Some(Duration::from_secs_f64(d));
                }
            }
        }
    }
    None
}
