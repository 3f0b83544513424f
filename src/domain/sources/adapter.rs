// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::Candidate;
use async_trait::async_trait;
use thiserror::Error;

/// 数据源错误类型
///
/// 单个数据源的失败不会中止任务，会被记录为SourceOutcome；
/// 只有所有数据源都失败时任务才会失败
#[derive(Debug, Error, Clone)]
pub enum SourceError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Quota exceeded")]
    QuotaExceeded,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Timeout")]
    Timeout,
}

/// 企业发现数据源特质
///
/// 每个外部目录/搜索服务实现一个适配器，
/// 负责自己的认证和分页
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// 按（行业、地区）查询候选企业
    ///
    /// # 参数
    ///
    /// * `niche` - 行业/类目关键词
    /// * `location` - 可选的地区限定
    /// * `limit` - 最多返回的候选数量
    async fn discover(
        &self,
        niche: &str,
        location: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Candidate>, SourceError>;

    /// 数据源名称
    fn name(&self) -> &'static str;

    /// 合并优先级，数值越小优先级越高
    ///
    /// 第一方目录优先于通用搜索
    fn priority(&self) -> u8;
}
