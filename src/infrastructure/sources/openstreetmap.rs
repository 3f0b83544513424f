// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::Candidate;
use crate::domain::sources::adapter::{DiscoverySource, SourceError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Nominatim默认API地址
const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// 合并优先级：通用搜索，低于第一方目录
const PRIORITY: u8 = 2;

/// OpenStreetMap配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenStreetMapSettings {
    /// API基础URL，测试时指向wiremock
    pub base_url: Option<String>,
}

/// OpenStreetMap (Nominatim) 数据源适配器
///
/// 免认证的兜底数据源。联系字段来自OSM的extratags，
/// 覆盖率低但聊胜于无
pub struct OpenStreetMapSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    place_id: u64,
    display_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    extratags: Option<HashMap<String, String>>,
}

impl OpenStreetMapSource {
    /// 创建新的适配器实例
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// 使用自定义基础URL创建（测试用）
    pub fn with_base_url(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    fn tag<'a>(tags: &'a Option<HashMap<String, String>>, keys: &[&str]) -> Option<&'a String> {
        let tags = tags.as_ref()?;
        keys.iter().find_map(|key| tags.get(*key))
    }
}

#[async_trait]
impl DiscoverySource for OpenStreetMapSource {
    async fn discover(
        &self,
        niche: &str,
        location: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Candidate>, SourceError> {
        let query = match location {
            Some(location) => format!("{} {}", niche, location),
            None => niche.to_string(),
        };
        let limit_param = limit.min(50).to_string();

        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query.as_str()),
                ("format", "jsonv2"),
                ("limit", limit_param.as_str()),
                ("extratags", "1"),
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

        if response.status().as_u16() == 429 {
            return Err(SourceError::QuotaExceeded);
        }
        if !response.status().is_success() {
            return Err(SourceError::InvalidResponse(format!(
                "unexpected HTTP status {}",
                response.status()
            )));
        }

        let entries: Vec<SearchEntry> = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        let candidates = entries
            .into_iter()
            .take(limit as usize)
            .map(|entry| {
                let name = entry
                    .name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| {
                        entry
                            .display_name
                            .split(',')
                            .next()
                            .unwrap_or(&entry.display_name)
                            .trim()
                            .to_string()
                    });

                let mut candidate = Candidate::new(name, "openstreetmap", PRIORITY);
                candidate.source_id = Some(entry.place_id.to_string());
                candidate.address = Some(entry.display_name.clone()).filter(|a| !a.is_empty());
                candidate.phone = Self::tag(&entry.extratags, &["contact:phone", "phone"]).cloned();
                candidate.website =
                    Self::tag(&entry.extratags, &["contact:website", "website"]).cloned();
                candidate
            })
            .collect();

        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "openstreetmap"
    }

    fn priority(&self) -> u8 {
        PRIORITY
    }
}
