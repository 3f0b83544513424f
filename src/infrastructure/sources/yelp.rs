// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::Candidate;
use crate::domain::sources::adapter::{DiscoverySource, SourceError};
use async_trait::async_trait;
use serde::Deserialize;

/// Yelp Fusion默认API地址
const DEFAULT_BASE_URL: &str = "https://api.yelp.com";

/// 合并优先级：第一方目录，次于Google Places
const PRIORITY: u8 = 1;

/// Yelp单次查询结果上限
const MAX_PAGE_SIZE: u32 = 50;

/// Yelp配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YelpSettings {
    /// Fusion API密钥，未配置时该数据源不可用
    pub api_key: Option<String>,
    /// API基础URL，测试时指向wiremock
    pub base_url: Option<String>,
}

/// Yelp Fusion数据源适配器
///
/// Business Search返回名称、电话和地址；Yelp不提供企业官网，
/// 网站字段留空由其他数据源或爬取补全
pub struct YelpSource {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    businesses: Vec<Business>,
}

#[derive(Debug, Deserialize)]
struct Business {
    id: String,
    name: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    location: Option<Location>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct Location {
    display_address: Vec<String>,
}

impl YelpSource {
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
}

#[async_trait]
impl DiscoverySource for YelpSource {
    async fn discover(
        &self,
        niche: &str,
        location: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Candidate>, SourceError> {
        // Yelp要求location参数
        let location = location.unwrap_or("");
        let url = format!("{}/v3/businesses/search", self.base_url);
        let mut candidates: Vec<Candidate> = Vec::new();

        // offset分页直到拿满limit或结果耗尽
        while candidates.len() < limit as usize {
            let page_size = (limit as usize - candidates.len()).min(MAX_PAGE_SIZE as usize);
            let limit_param = page_size.to_string();
            let offset_param = candidates.len().to_string();

            let response = self
                .client
                .get(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .query(&[
                    ("term", niche),
                    ("location", location),
                    ("limit", limit_param.as_str()),
                    ("offset", offset_param.as_str()),
                ])
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        SourceError::Timeout
                    } else {
                        SourceError::NetworkError(e.to_string())
                    }
                })?;

            match response.status().as_u16() {
                200 => {}
                401 | 403 => {
                    return Err(SourceError::Auth(format!(
                        "yelp returned {}",
                        response.status()
                    )))
                }
                429 => return Err(SourceError::QuotaExceeded),
                status => {
                    return Err(SourceError::InvalidResponse(format!(
                        "unexpected HTTP status {}",
                        status
                    )))
                }
            }

            let body: SearchResponse = response
                .json()
                .await
                .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

            let received = body.businesses.len();
            candidates.extend(body.businesses.into_iter().map(|business| {
                let mut candidate = Candidate::new(business.name, "yelp", PRIORITY);
                candidate.source_id = Some(business.id);
                candidate.phone = business.phone.filter(|p| !p.is_empty());
                candidate.address = business
                    .location
                    .map(|l| l.display_address.join(", "))
                    .filter(|a| !a.is_empty());
                candidate
            }));

            if received < page_size {
                break;
            }
        }

        candidates.truncate(limit as usize);
        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "yelp"
    }

    fn priority(&self) -> u8 {
        PRIORITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> YelpSource {
        YelpSource::with_base_url(reqwest::Client::new(), "test-token".to_string(), server.uri())
    }

    #[tokio::test]
    async fn test_discover_parses_businesses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/businesses/search"))
            .and(header("Authorization", "Bearer test-token"))
            .and(query_param("term", "dentist"))
            .and(query_param("location", "Lahore"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "businesses": [
                    {
                        "id": "y1",
                        "name": "Smile Dental",
                        "phone": "+924211122233",
                        "location": {"display_address": ["12 Mall Road", "Lahore"]}
                    },
                    {"id": "y2", "name": "Star Dental", "phone": ""}
                ]
            })))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let candidates = source.discover("dentist", Some("Lahore"), 10).await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].phone, Some("+924211122233".to_string()));
        assert_eq!(candidates[0].address, Some("12 Mall Road, Lahore".to_string()));
        assert!(candidates[0].website.is_none());
        // 空电话归一为None
        assert!(candidates[1].phone.is_none());
    }

    #[tokio::test]
    async fn test_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": "TOKEN_INVALID"}
            })))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let err = source.discover("dentist", Some("Lahore"), 5).await.unwrap_err();
        assert!(matches!(err, SourceError::Auth(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_quota() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let source = source_for(&server);
        let err = source.discover("dentist", Some("Lahore"), 5).await.unwrap_err();
        assert!(matches!(err, SourceError::QuotaExceeded));
    }
}
