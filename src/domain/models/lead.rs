// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 线索实体
///
/// 系统的主要产出：去重并富化后的企业记录。
/// 身份由去重键决定，后续任务只更新富化字段，从不改变身份。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    /// 线索唯一标识符
    pub id: Uuid,
    /// 最近一次富化该线索的任务ID
    pub job_id: Uuid,
    /// 去重键（身份，不可变）
    pub dedup_key: String,
    /// 企业名称
    pub name: String,
    /// 网站URL
    pub website: Option<String>,
    /// 邮箱地址列表
    pub emails: Vec<String>,
    /// 电话号码列表
    pub phones: Vec<String>,
    /// 地址
    pub address: Option<String>,
    /// 社交媒体链接，平台名 → URL
    pub social_links: HashMap<String, String>,
    /// 检测到的技术栈
    pub tech_stack: Vec<String>,
    /// 提供的服务（LLM提取，可为空）
    pub services: Vec<String>,
    /// 质量评分 (0-100)
    pub quality_score: u8,
    /// 质量标签
    pub quality_label: QualityLabel,
    /// 首次发现该线索的数据源
    pub source: String,
    /// 网站是否可达（首页抓取成功）
    pub website_reachable: bool,
    /// 网站是否有近期活动迹象（版权年份等）
    pub recent_activity: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 最后更新时间
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// 是否有邮箱
    pub fn has_email(&self) -> bool {
        !self.emails.is_empty()
    }

    /// 是否有电话
    pub fn has_phone(&self) -> bool {
        !self.phones.is_empty()
    }

    /// 是否有社交媒体
    pub fn has_social(&self) -> bool {
        !self.social_links.is_empty()
    }
}

/// 质量标签枚举
///
/// 按固定阈值对质量评分分桶：≥80 High，50-79 Medium，<50 Low
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityLabel {
    /// 低质量
    #[default]
    Low,
    /// 中等质量
    Medium,
    /// 高质量
    High,
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QualityLabel::Low => write!(f, "low"),
            QualityLabel::Medium => write!(f, "medium"),
            QualityLabel::High => write!(f, "high"),
        }
    }
}

impl FromStr for QualityLabel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(QualityLabel::Low),
            "medium" => Ok(QualityLabel::Medium),
            "high" => Ok(QualityLabel::High),
            _ => Err(()),
        }
    }
}
