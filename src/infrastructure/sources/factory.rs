// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::sources::adapter::DiscoverySource;
use crate::infrastructure::sources::google_places::{GooglePlacesSettings, GooglePlacesSource};
use crate::infrastructure::sources::openstreetmap::{OpenStreetMapSettings, OpenStreetMapSource};
use crate::infrastructure::sources::yelp::{YelpSettings, YelpSource};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// 数据源配置集合
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SourcesSettings {
    pub google_places: GooglePlacesSettings,
    pub yelp: YelpSettings,
    pub openstreetmap: OpenStreetMapSettings,
}

/// 按配置构建可用的数据源集合
///
/// 需要认证的数据源只在配置了密钥时注册；
/// OpenStreetMap免认证，始终可用。
/// 任务提交时引用未注册的数据源会得到验证错误。
pub fn build_sources(
    settings: &SourcesSettings,
    client: reqwest::Client,
) -> Vec<Arc<dyn DiscoverySource>> {
    let mut sources: Vec<Arc<dyn DiscoverySource>> = Vec::new();

    if let Some(api_key) = &settings.google_places.api_key {
        let source = match &settings.google_places.base_url {
            Some(base_url) => GooglePlacesSource::with_base_url(
                client.clone(),
                api_key.clone(),
                base_url.clone(),
            ),
            None => GooglePlacesSource::new(client.clone(), api_key.clone()),
        };
        sources.push(Arc::new(source));
    }

    if let Some(api_key) = &settings.yelp.api_key {
        let source = match &settings.yelp.base_url {
            Some(base_url) => {
                YelpSource::with_base_url(client.clone(), api_key.clone(), base_url.clone())
            }
            None => YelpSource::new(client.clone(), api_key.clone()),
        };
        sources.push(Arc::new(source));
    }

    let osm = match &settings.openstreetmap.base_url {
        Some(base_url) => OpenStreetMapSource::with_base_url(client, base_url.clone()),
        None => OpenStreetMapSource::new(client),
    };
    sources.push(Arc::new(osm));

    info!(
        "Configured discovery sources: {:?}",
        sources.iter().map(|s| s.name()).collect::<Vec<_>>()
    );
    sources
}
