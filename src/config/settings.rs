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

use crate::domain::services::deduplicator::DeduplicationConfig;
use crate::domain::services::llm_service::LlmSettings;
use crate::domain::services::normalizer::NormalizerConfig;
use crate::engines::politeness::PolitenessConfig;
use crate::engines::site_crawler::CrawlerConfig;
use crate::infrastructure::sources::factory::SourcesSettings;
use crate::workers::job_worker::WorkerConfig;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含爬虫、politeness限流、去重、数据源和LLM等所有配置项。
/// 每个分区都有合理默认值，配置文件和环境变量按需覆盖。
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 爬虫配置
    pub crawler: CrawlerConfig,
    /// Politeness限流配置
    pub politeness: PolitenessConfig,
    /// 去重配置
    pub dedup: DeduplicationConfig,
    /// 规范化配置
    pub normalizer: NormalizerConfig,
    /// 工作器配置
    pub worker: WorkerConfig,
    /// 数据源配置
    pub sources: SourcesSettings,
    /// LLM配置
    pub llm: LlmSettings,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 加载顺序（后者覆盖前者）：
    /// 内置默认值 → `config/default` → `config/{APP_ENVIRONMENT}` →
    /// `LEADRS__`前缀的环境变量（`__`分隔层级）
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("LEADRS").separator("__"));

        builder.build()?.try_deserialize()
    }
}
