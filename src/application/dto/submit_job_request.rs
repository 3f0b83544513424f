// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{ExtractOptions, JobQuery};
use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_max_results() -> u32 {
    20
}

fn default_max_pages_per_site() -> u32 {
    3
}

/// 任务提交请求
///
/// API/CLI协作方提交任务的外部契约，提交后立即返回任务ID，
/// 处理是异步的
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitJobRequest {
    /// 行业/类目关键词
    #[validate(length(min = 1, max = 120, message = "niche must be 1-120 characters"))]
    pub niche: String,

    /// 地区限定
    pub location: Option<String>,

    /// 最多处理的候选数量
    #[validate(range(min = 1, max = 100, message = "max_results must be 1-100"))]
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// 每个网站最多抓取的页面数
    #[validate(range(min = 1, max = 10, message = "max_pages_per_site must be 1-10"))]
    #[serde(default = "default_max_pages_per_site")]
    pub max_pages_per_site: u32,

    /// 要查询的数据源名称，未知名称在提交时报错
    #[validate(length(min = 1, message = "at least one source is required"))]
    pub sources: Vec<String>,

    /// 信号提取选项
    #[serde(default)]
    pub extract_options: ExtractOptions,
}

impl SubmitJobRequest {
    /// 转换为领域查询对象
    pub fn into_query(self) -> JobQuery {
        JobQuery {
            niche: self.niche,
            location: self.location.filter(|l| !l.trim().is_empty()),
            max_results: self.max_results,
            max_pages_per_site: self.max_pages_per_site,
            sources: self.sources,
            extract_options: self.extract_options,
        }
    }
}
