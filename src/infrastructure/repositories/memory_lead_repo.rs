// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::lead::{Lead, QualityLabel};
use crate::domain::repositories::lead_repository::LeadRepository;
use crate::domain::repositories::RepositoryError;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

/// 内存线索仓库
///
/// 以去重键为主键：upsert时保留既有线索的身份字段，
/// 只覆盖富化字段
#[derive(Default)]
pub struct InMemoryLeadRepository {
    /// 去重键 → 线索
    leads: DashMap<String, Lead>,
}

impl InMemoryLeadRepository {
    /// 创建新的内存线索仓库
    pub fn new() -> Self {
        Self::default()
    }

    /// 仓库中的线索总数
    pub fn len(&self) -> usize {
        self.leads.len()
    }

    /// 仓库是否为空
    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }
}

#[async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn upsert(&self, lead: &Lead) -> Result<Lead, RepositoryError> {
        if lead.dedup_key.is_empty() {
            return Err(RepositoryError::InvalidParameter(
                "lead dedup_key must not be empty".to_string(),
            ));
        }

        let stored = match self.leads.get(&lead.dedup_key) {
            Some(existing) => {
                // 身份不变，富化字段更新
                let mut updated = lead.clone();
                updated.id = existing.id;
                updated.dedup_key = existing.dedup_key.clone();
                updated.created_at = existing.created_at;
                updated.updated_at = Utc::now();
                updated
            }
            None => lead.clone(),
        };

        self.leads.insert(stored.dedup_key.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Option<Lead>, RepositoryError> {
        Ok(self.leads.get(dedup_key).map(|l| l.clone()))
    }

    async fn list_by_job(&self, job_id: Uuid) -> Result<Vec<Lead>, RepositoryError> {
        let mut leads: Vec<Lead> = self
            .leads
            .iter()
            .filter(|entry| entry.job_id == job_id)
            .map(|entry| entry.clone())
            .collect();
        leads.sort_by(|a, b| b.quality_score.cmp(&a.quality_score).then(a.name.cmp(&b.name)));
        Ok(leads)
    }

    async fn update_score(
        &self,
        id: Uuid,
        score: u8,
        label: QualityLabel,
    ) -> Result<(), RepositoryError> {
        for mut entry in self.leads.iter_mut() {
            if entry.id == id {
                entry.quality_score = score;
                entry.quality_label = label;
                entry.updated_at = Utc::now();
                return Ok(());
            }
        }
        Err(RepositoryError::NotFound)
    }
}
