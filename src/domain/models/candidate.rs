// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 候选企业记录
///
/// 由单个数据源适配器返回的未经验证的企业信息，
/// 仅在一次任务运行期间存在于内存中，从不直接持久化。
/// 经过规范化和去重后合并为线索（Lead）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// 企业名称（原始形式）
    pub name: String,
    /// 地址
    pub address: Option<String>,
    /// 电话号码
    pub phone: Option<String>,
    /// 网站URL
    pub website: Option<String>,
    /// 来源数据源名称
    pub source: String,
    /// 数据源内部ID
    pub source_id: Option<String>,
    /// 来源优先级，数值越小优先级越高
    ///
    /// 合并冲突时高优先级来源的字段获胜
    /// （第一方目录 < 通用搜索）
    pub priority: u8,
}

impl Candidate {
    /// 创建新的候选记录
    pub fn new(name: impl Into<String>, source: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            address: None,
            phone: None,
            website: None,
            source: source.into(),
            source_id: None,
            priority,
        }
    }

    /// 统计非空字段数量，用于"最完整字段获胜"合并策略
    pub fn completeness(&self) -> usize {
        [
            self.address.is_some(),
            self.phone.is_some(),
            self.website.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

/// 去重键
///
/// 候选记录的派生身份，共享同一去重键的候选会合并为一条线索。
/// 派生优先级：网站域名 > 规范化电话 > 名称+地址模糊匹配
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DedupKey {
    /// 规范化的网站域名
    Domain(String),
    /// 规范化的电话号码
    Phone(String),
    /// 折叠后的名称+地址组合
    NameAddress(String),
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DedupKey::Domain(d) => write!(f, "domain:{}", d),
            DedupKey::Phone(p) => write!(f, "phone:{}", p),
            DedupKey::NameAddress(n) => write!(f, "name:{}", n),
        }
    }
}
