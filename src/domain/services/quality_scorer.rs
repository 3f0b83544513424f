// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::lead::{Lead, QualityLabel};
use crate::domain::services::extraction_service::is_suspect_email;
use serde::Deserialize;

/// 评分权重
///
/// 满分恰好100：邮箱25 + 电话20 + 网站可达15 + 地址15 +
/// 社交10 + 近期活动15。惩罚项为负值。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// 有邮箱
    pub email: i32,
    /// 有电话
    pub phone: i32,
    /// 网站可达
    pub website_reachable: i32,
    /// 有地址
    pub address: i32,
    /// 有社交媒体
    pub social: i32,
    /// 近期活动（版权年份等新鲜度信号）
    pub freshness: i32,
    /// 没有网站的惩罚
    pub missing_website_penalty: i32,
    /// 邮箱全部可疑（noreply类）的惩罚
    pub suspect_email_penalty: i32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            email: 25,
            phone: 20,
            website_reachable: 15,
            address: 15,
            social: 10,
            freshness: 15,
            missing_website_penalty: -15,
            suspect_email_penalty: -10,
        }
    }
}

/// 评分输入信号
///
/// 完全可以从已持久化的线索重建（见 `from_lead`），
/// 调整权重后无需重新爬取即可重算评分
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreSignals {
    pub has_email: bool,
    pub has_phone: bool,
    pub has_website: bool,
    pub website_reachable: bool,
    pub has_address: bool,
    pub has_social: bool,
    pub recent_activity: bool,
    /// 邮箱存在但全部是可疑地址
    pub suspect_email: bool,
}

impl ScoreSignals {
    /// 从持久化线索重建评分信号
    pub fn from_lead(lead: &Lead) -> Self {
        let has_email = lead.has_email();
        Self {
            has_email,
            has_phone: lead.has_phone(),
            has_website: lead.website.is_some(),
            website_reachable: lead.website_reachable,
            has_address: lead.address.is_some(),
            has_social: lead.has_social(),
            recent_activity: lead.recent_activity,
            suspect_email: has_email && lead.emails.iter().all(|e| is_suspect_email(e)),
        }
    }
}

/// 计算出的质量评分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityScore {
    /// 0-100
    pub value: u8,
    /// 分桶标签
    pub label: QualityLabel,
}

/// 质量评分器
///
/// 对布尔信号做确定性加权求和并截断到[0,100]。
/// 纯函数：相同信号永远得到相同的评分和标签。
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    weights: ScoreWeights,
}

impl QualityScorer {
    /// 使用自定义权重创建评分器
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// 计算评分
    pub fn score(&self, signals: &ScoreSignals) -> QualityScore {
        let w = &self.weights;
        let mut total: i32 = 0;

        if signals.has_email {
            total += w.email;
        }
        if signals.has_phone {
            total += w.phone;
        }
        if signals.website_reachable {
            total += w.website_reachable;
        }
        if signals.has_address {
            total += w.address;
        }
        if signals.has_social {
            total += w.social;
        }
        if signals.recent_activity {
            total += w.freshness;
        }
        if !signals.has_website {
            total += w.missing_website_penalty;
        }
        if signals.suspect_email {
            total += w.suspect_email_penalty;
        }

        let value = total.clamp(0, 100) as u8;
        QualityScore {
            value,
            label: label_for(value),
        }
    }
}

/// 按固定阈值分桶
fn label_for(score: u8) -> QualityLabel {
    if score >= 80 {
        QualityLabel::High
    } else if score >= 50 {
        QualityLabel::Medium
    } else {
        QualityLabel::Low
    }
}
