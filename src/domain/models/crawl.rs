// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 单个页面的抓取状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// 抓取成功
    Ok,
    /// 超时（重试后仍然超时）
    Timeout,
    /// 被目标站点拒绝（4xx）
    Blocked,
    /// 其他错误（网络错误、5xx重试耗尽）
    Error,
    /// 被robots.txt禁止，未发起请求
    SkippedByRobots,
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PageStatus::Ok => write!(f, "ok"),
            PageStatus::Timeout => write!(f, "timeout"),
            PageStatus::Blocked => write!(f, "blocked"),
            PageStatus::Error => write!(f, "error"),
            PageStatus::SkippedByRobots => write!(f, "skipped_by_robots"),
        }
    }
}

/// 已抓取的页面
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// 页面URL
    pub url: String,
    /// 抓取状态
    pub status: PageStatus,
    /// HTML快照，仅在抓取成功时存在
    pub html: Option<String>,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
}

impl FetchedPage {
    /// 创建一个失败页面记录
    pub fn failed(url: impl Into<String>, status: PageStatus) -> Self {
        Self {
            url: url.into(),
            status,
            html: None,
            response_time_ms: 0,
        }
    }
}

/// 单个候选网站的爬取结果
///
/// 由爬虫在一次候选富化期间持有，提取完成后即丢弃，
/// 只有派生字段会持久化到线索上
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    /// 按抓取顺序排列的页面记录
    pub pages: Vec<FetchedPage>,
    /// 首页是否可达
    pub homepage_reachable: bool,
}

impl CrawlResult {
    /// 成功抓取的页面
    pub fn ok_pages(&self) -> impl Iterator<Item = &FetchedPage> {
        self.pages.iter().filter(|p| p.status == PageStatus::Ok)
    }

    /// 抓取成功的页面数量
    pub fn ok_count(&self) -> usize {
        self.ok_pages().count()
    }

    /// 失败页面数量（不含robots跳过）
    pub fn failed_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| {
                matches!(
                    p.status,
                    PageStatus::Timeout | PageStatus::Blocked | PageStatus::Error
                )
            })
            .count()
    }
}
