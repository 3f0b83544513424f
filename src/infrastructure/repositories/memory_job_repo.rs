// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::Job;
use crate::domain::repositories::job_repository::JobRepository;
use crate::domain::repositories::RepositoryError;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// 内存任务仓库
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: DashMap<Uuid, Job>,
}

impl InMemoryJobRepository {
    /// 创建新的内存任务仓库
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        if self.jobs.contains_key(&job.id) {
            return Err(RepositoryError::InvalidParameter(format!(
                "job {} already exists",
                job.id
            )));
        }
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn update(&self, job: &Job) -> Result<(), RepositoryError> {
        if !self.jobs.contains_key(&job.id) {
            return Err(RepositoryError::NotFound);
        }
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, RepositoryError> {
        Ok(self.jobs.get(&id).map(|j| j.clone()))
    }
}
