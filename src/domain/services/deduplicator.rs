// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::{Candidate, DedupKey};
use crate::domain::services::normalizer::comparison_form;
use crate::utils::url_utils;
use serde::Deserialize;
use std::collections::HashMap;
use strsim::jaro_winkler;

/// 去重配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeduplicationConfig {
    /// 名称相似度阈值 (Jaro-Winkler, 0.0-1.0)
    ///
    /// 可调常量：模糊合并的边界行为由阈值测试覆盖
    pub name_similarity_threshold: f64,
    /// 地址相似度阈值 (Jaro-Winkler, 0.0-1.0)
    pub address_similarity_threshold: f64,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            name_similarity_threshold: 0.90,
            address_similarity_threshold: 0.85,
        }
    }
}

/// 单个合并簇
struct Cluster {
    key: DedupKey,
    merged: Candidate,
    comparison_name: String,
    comparison_address: Option<String>,
}

/// 候选去重器
///
/// 在爬取开始之前同步运行一次，把跨数据源/跨页面的同一企业
/// 合并为单个候选，让爬虫并发花在真正不同的企业上。
/// 键派生优先级：网站域名 > 规范化电话 > 名称+地址模糊匹配。
/// 输入在聚类前先做确定性排序，结果与候选到达顺序无关。
pub struct CandidateDeduplicator {
    config: DeduplicationConfig,
}

impl CandidateDeduplicator {
    /// 创建新的去重器
    pub fn new(config: DeduplicationConfig) -> Self {
        Self { config }
    }

    /// 使用默认配置创建去重器
    pub fn with_default_config() -> Self {
        Self::new(DeduplicationConfig::default())
    }

    /// 去重并合并候选
    ///
    /// # 参数
    ///
    /// * `candidates` - 已规范化的候选列表（任意顺序）
    ///
    /// # 返回值
    ///
    /// (去重键, 合并后候选) 列表，每个键恰好出现一次
    pub fn dedup(&self, mut candidates: Vec<Candidate>) -> Vec<(DedupKey, Candidate)> {
        // 确定性排序：优先级高的在前，同优先级按来源和名称排序。
        // 保证合并结果与到达顺序无关，且簇代表总是最高优先级来源。
        candidates.sort_by(|a, b| {
            (a.priority, &a.source, &a.source_id, &a.name)
                .cmp(&(b.priority, &b.source, &b.source_id, &b.name))
        });

        let mut clusters: Vec<Cluster> = Vec::new();
        let mut domain_index: HashMap<String, usize> = HashMap::new();
        let mut phone_index: HashMap<String, usize> = HashMap::new();

        for candidate in candidates {
            let domain = candidate
                .website
                .as_deref()
                .and_then(url_utils::registrable_domain);
            let phone = candidate.phone.clone();

            let existing = self.find_cluster(
                &clusters,
                &domain_index,
                &phone_index,
                domain.as_deref(),
                phone.as_deref(),
                &candidate,
            );

            match existing {
                Some(index) => {
                    merge_into(&mut clusters[index].merged, candidate);
                    // 合并可能带来新的身份信息，补登索引
                    if let Some(d) = clusters[index]
                        .merged
                        .website
                        .as_deref()
                        .and_then(url_utils::registrable_domain)
                    {
                        domain_index.entry(d).or_insert(index);
                    }
                    if let Some(p) = clusters[index].merged.phone.clone() {
                        phone_index.entry(p).or_insert(index);
                    }
                }
                None => {
                    let key = derive_key(domain.as_deref(), phone.as_deref(), &candidate);
                    let index = clusters.len();
                    if let Some(d) = domain.clone() {
                        domain_index.insert(d, index);
                    }
                    if let Some(p) = phone.clone() {
                        phone_index.insert(p, index);
                    }
                    clusters.push(Cluster {
                        key,
                        comparison_name: comparison_form(&candidate.name),
                        comparison_address: candidate.address.as_deref().map(comparison_form),
                        merged: candidate,
                    });
                }
            }
        }

        clusters.into_iter().map(|c| (c.key, c.merged)).collect()
    }

    fn find_cluster(
        &self,
        clusters: &[Cluster],
        domain_index: &HashMap<String, usize>,
        phone_index: &HashMap<String, usize>,
        domain: Option<&str>,
        phone: Option<&str>,
        candidate: &Candidate,
    ) -> Option<usize> {
        if let Some(d) = domain {
            if let Some(&index) = domain_index.get(d) {
                return Some(index);
            }
        }
        if let Some(p) = phone {
            if let Some(&index) = phone_index.get(p) {
                return Some(index);
            }
        }

        // 模糊兜底只用于既没有域名也没有电话的候选：
        // 带有不同电话/域名的同名企业是不同的门店，不能合并
        if domain.is_some() || phone.is_some() {
            return None;
        }

        let name = comparison_form(&candidate.name);
        let address = candidate.address.as_deref().map(comparison_form);
        clusters
            .iter()
            .position(|cluster| self.is_fuzzy_match(cluster, &name, address.as_deref()))
    }

    fn is_fuzzy_match(&self, cluster: &Cluster, name: &str, address: Option<&str>) -> bool {
        if name.is_empty() || cluster.comparison_name.is_empty() {
            return false;
        }
        if jaro_winkler(&cluster.comparison_name, name) < self.config.name_similarity_threshold {
            return false;
        }
        match (cluster.comparison_address.as_deref(), address) {
            (Some(a), Some(b)) => {
                jaro_winkler(a, b) >= self.config.address_similarity_threshold
            }
            // 任一方没有地址时仅凭名称相似度合并
            _ => true,
        }
    }
}

/// 派生去重键
fn derive_key(domain: Option<&str>, phone: Option<&str>, candidate: &Candidate) -> DedupKey {
    if let Some(d) = domain {
        return DedupKey::Domain(d.to_string());
    }
    if let Some(p) = phone {
        return DedupKey::Phone(p.to_string());
    }
    let name = comparison_form(&candidate.name);
    let address = candidate
        .address
        .as_deref()
        .map(comparison_form)
        .unwrap_or_default();
    DedupKey::NameAddress(format!("{}|{}", name, address).replace(' ', "-"))
}

/// 合并候选到簇代表
///
/// 非空字段获胜；双方都非空时保留簇代表（更高优先级来源）的值
fn merge_into(merged: &mut Candidate, other: Candidate) {
    if merged.address.is_none() {
        merged.address = other.address;
    }
    if merged.phone.is_none() {
        merged.phone = other.phone;
    }
    if merged.website.is_none() {
        merged.website = other.website;
    }
    if merged.source_id.is_none() && merged.source == other.source {
        merged.source_id = other.source_id;
    }
}
