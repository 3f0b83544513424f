// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::lead::{Lead, QualityLabel};
use crate::domain::repositories::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 线索仓库特质
///
/// 线索的身份是去重键：同一去重键在后续任务中只更新富化字段
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// 插入或按去重键更新线索
    ///
    /// 已存在时保留原有的id、created_at和dedup_key，
    /// 其余富化字段以新值覆盖
    async fn upsert(&self, lead: &Lead) -> Result<Lead, RepositoryError>;

    /// 按去重键查找
    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Option<Lead>, RepositoryError>;

    /// 列出某任务产出的全部线索
    async fn list_by_job(&self, job_id: Uuid) -> Result<Vec<Lead>, RepositoryError>;

    /// 更新单条线索的质量评分
    ///
    /// 供评分权重变更后的离线重算使用，不触碰其他字段
    async fn update_score(
        &self,
        id: Uuid,
        score: u8,
        label: QualityLabel,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
impl<T: LeadRepository + ?Sized> LeadRepository for std::sync::Arc<T> {
    async fn upsert(&self, lead: &Lead) -> Result<Lead, RepositoryError> {
        (**self).upsert(lead).await
    }

    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Option<Lead>, RepositoryError> {
        (**self).find_by_dedup_key(dedup_key).await
    }

    async fn list_by_job(&self, job_id: Uuid) -> Result<Vec<Lead>, RepositoryError> {
        (**self).list_by_job(job_id).await
    }

    async fn update_score(
        &self,
        id: Uuid,
        score: u8,
        label: QualityLabel,
    ) -> Result<(), RepositoryError> {
        (**self).update_score(id, score, label).await
    }
}
