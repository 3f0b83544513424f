// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::Job;
use crate::domain::repositories::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 任务仓库特质
///
/// 关系型存储由外部协作方提供，这里只定义简单CRUD抽象
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 创建任务
    async fn create(&self, job: &Job) -> Result<(), RepositoryError>;

    /// 更新任务（状态、计数器、警告）
    async fn update(&self, job: &Job) -> Result<(), RepositoryError>;

    /// 按ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, RepositoryError>;
}

#[async_trait]
impl<T: JobRepository + ?Sized> JobRepository for std::sync::Arc<T> {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        (**self).create(job).await
    }

    async fn update(&self, job: &Job) -> Result<(), RepositoryError> {
        (**self).update(job).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, RepositoryError> {
        (**self).find_by_id(id).await
    }
}
