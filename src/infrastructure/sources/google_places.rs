// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::Candidate;
use crate::domain::sources::adapter::{DiscoverySource, SourceError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Google Places默认API地址
const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";

/// 合并优先级：第一方目录
const PRIORITY: u8 = 0;

/// Text Search最多翻页数（API上限60条结果）
const MAX_PAGES: u32 = 3;

/// Google Places配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GooglePlacesSettings {
    /// API密钥，未配置时该数据源不可用
    pub api_key: Option<String>,
    /// API基础URL，测试时指向wiremock
    pub base_url: Option<String>,
}

/// Google Places数据源适配器
///
/// Text Search找出候选，再逐个调用Place Details补全电话和网站。
/// Details调用失败只损失该候选的补全字段，不影响整次发现。
pub struct GooglePlacesSource {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<TextSearchResult>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextSearchResult {
    place_id: String,
    name: String,
    #[serde(default)]
    formatted_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    #[serde(default)]
    result: Option<PlaceDetails>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PlaceDetails {
    formatted_address: Option<String>,
    international_phone_number: Option<String>,
    website: Option<String>,
}

impl GooglePlacesSource {
    /// 创建新的适配器实例
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// 使用自定义基础URL创建（测试用）
    pub fn with_base_url(client: reqwest::Client, api_key: String, base_url: String) -> Self {
        Self {
            client,
            api_key,
            base_url,
        }
    }

    /// 把Google的状态字段映射为数据源错误
    fn map_status(status: &str, error_message: Option<&str>) -> Option<SourceError> {
        match status {
            "OK" | "ZERO_RESULTS" => None,
            "OVER_QUERY_LIMIT" => Some(SourceError::QuotaExceeded),
            "REQUEST_DENIED" => Some(SourceError::Auth(
                error_message.unwrap_or("request denied").to_string(),
            )),
            other => Some(SourceError::InvalidResponse(format!(
                "unexpected status {}: {}",
                other,
                error_message.unwrap_or("")
            ))),
        }
    }

    /// 调用Place Details补全联系字段
    async fn fetch_details(&self, place_id: &str) -> Option<PlaceDetails> {
        let url = format!("{}/maps/api/place/details/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("place_id", place_id),
                (
                    "fields",
                    "formatted_address,international_phone_number,website",
                ),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await;

        match response {
            Ok(resp) => match resp.json::<DetailsResponse>().await {
                Ok(details) if details.status == "OK" => details.result,
                Ok(details) => {
                    debug!("Place details for {} returned {}", place_id, details.status);
                    None
                }
                Err(e) => {
                    debug!("Failed to parse place details for {}: {}", place_id, e);
                    None
                }
            },
            Err(e) => {
                warn!("Place details request failed for {}: {}", place_id, e);
                None
            }
        }
    }
}

#[async_trait]
impl DiscoverySource for GooglePlacesSource {
    async fn discover(
        &self,
        niche: &str,
        location: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Candidate>, SourceError> {
        let query = match location {
            Some(location) => format!("{} in {}", niche, location),
            None => niche.to_string(),
        };

        let url = format!("{}/maps/api/place/textsearch/json", self.base_url);
        let mut results = Vec::new();
        let mut page_token: Option<String> = None;

        // Text Search每页最多20条，按next_page_token翻页
        for page in 0..MAX_PAGES {
            if page > 0 {
                // 新签发的token要短暂延迟后才生效
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }

            let mut params = vec![
                ("query", query.clone()),
                ("key", self.api_key.clone()),
            ];
            if let Some(token) = &page_token {
                params.push(("pagetoken", token.clone()));
            }

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        SourceError::Timeout
                    } else {
                        SourceError::NetworkError(e.to_string())
                    }
                })?;

            let body: TextSearchResponse = response
                .json()
                .await
                .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

            if let Some(error) = Self::map_status(&body.status, body.error_message.as_deref()) {
                return Err(error);
            }

            results.extend(body.results);
            page_token = body.next_page_token;
            if results.len() >= limit as usize || page_token.is_none() {
                break;
            }
        }

        let mut candidates = Vec::new();
        for result in results.into_iter().take(limit as usize) {
            let mut candidate = Candidate::new(result.name, "google_places", PRIORITY);
            candidate.source_id = Some(result.place_id.clone());
            candidate.address = result.formatted_address;

            if let Some(details) = self.fetch_details(&result.place_id).await {
                candidate.phone = details.international_phone_number;
                candidate.website = details.website;
                if candidate.address.is_none() {
                    candidate.address = details.formatted_address;
                }
            }
            candidates.push(candidate);
        }

        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "google_places"
    }

    fn priority(&self) -> u8 {
        PRIORITY
    }
}
