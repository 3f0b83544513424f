// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 发现任务实体
///
/// 表示一次完整的"发现+富化"运行：按（行业、地区）查询
/// 多个数据源、爬取候选企业网站并产出线索。任务由Job Controller
/// 创建，计数器只由单一写入者变更，进入终态后不再修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 查询参数
    pub query: JobQuery,
    /// 任务状态
    pub status: JobStatus,
    /// 各项计数器
    pub counters: JobCounters,
    /// 警告列表，记录被吸收的部分失败
    pub warnings: Vec<String>,
    /// 每个数据源调用的结果
    pub source_outcomes: Vec<SourceOutcome>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 开始执行时间
    pub started_at: Option<DateTime<Utc>>,
    /// 完成时间
    pub completed_at: Option<DateTime<Utc>>,
}

/// 任务查询参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobQuery {
    /// 行业/类目关键词，如 "dentist"
    pub niche: String,
    /// 地区限定，如 "Lahore"
    pub location: Option<String>,
    /// 最多处理的候选数量
    pub max_results: u32,
    /// 每个网站最多抓取的页面数
    pub max_pages_per_site: u32,
    /// 要查询的数据源名称
    pub sources: Vec<String>,
    /// 信号提取选项
    pub extract_options: ExtractOptions,
}

/// 信号提取选项
///
/// 显式的布尔字段结构体，字段名拼错会在编译期失败，
/// 不会像松散的配置字典那样静默关闭提取步骤
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// 提取邮箱地址（默认开启）
    pub emails: bool,
    /// 提取电话号码（默认开启）
    pub phones: bool,
    /// 提取社交媒体链接（默认开启）
    pub social: bool,
    /// 保留完整页面文本供LLM使用（默认关闭）
    pub full_content: bool,
    /// 拒绝角色类邮箱如 info@/noreply@（默认关闭）
    pub reject_role_emails: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            emails: true,
            phones: true,
            social: true,
            full_content: false,
            reject_role_emails: false,
        }
    }
}

/// 任务计数器
///
/// 只由job worker的单一写入循环修改
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct JobCounters {
    /// 去重后的候选数量
    pub candidates_found: u32,
    /// 已处理完毕的候选数量
    pub processed: u32,
    /// 成功产出线索的候选数量
    pub succeeded: u32,
    /// 未能产出线索的候选数量
    pub failed: u32,
}

/// 数据源调用结果
///
/// 适配器调用返回后即不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceOutcome {
    /// 数据源名称
    pub source: String,
    /// 是否成功
    pub success: bool,
    /// 返回的原始候选数量
    pub candidate_count: u32,
    /// 失败时的错误描述
    pub error: Option<String>,
    /// 调用耗时（毫秒）
    pub duration_ms: u64,
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Queued → Running → Completed/CompletedWithWarnings/Failed
/// Queued/Running → Cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// 已入队，任务已创建但尚未开始执行
    #[default]
    Queued,
    /// 运行中，数据源查询或候选富化正在进行
    Running,
    /// 已完成，所有候选处理成功且无警告
    Completed,
    /// 带警告完成，部分数据源或候选失败但至少产出了一条线索
    CompletedWithWarnings,
    /// 已失败，没有产出任何线索
    Failed,
    /// 已取消
    Cancelled,
}

impl JobStatus {
    /// 判断是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed
                | JobStatus::CompletedWithWarnings
                | JobStatus::Failed
                | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::CompletedWithWarnings => write!(f, "completed_with_warnings"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "completed_with_warnings" => Ok(JobStatus::CompletedWithWarnings),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition")]
    InvalidStateTransition,

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl Job {
    /// 创建一个新的任务
    pub fn new(query: JobQuery) -> Self {
        Self {
            id: Uuid::new_v4(),
            query,
            status: JobStatus::Queued,
            counters: JobCounters::default(),
            warnings: Vec::new(),
            source_outcomes: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// 启动任务
    ///
    /// 将任务状态从Queued变更为Running
    pub fn start(&mut self) -> Result<(), DomainError> {
        match self.status {
            JobStatus::Queued => {
                self.status = JobStatus::Running;
                self.started_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 完成任务
    ///
    /// 根据计数器和警告选择 Completed 或 CompletedWithWarnings；
    /// 一条线索都没有产出时任务失败
    pub fn finish(&mut self) -> Result<(), DomainError> {
        if self.status != JobStatus::Running {
            return Err(DomainError::InvalidStateTransition);
        }

        self.status = if self.counters.succeeded == 0 {
            JobStatus::Failed
        } else if self.counters.failed > 0 || !self.warnings.is_empty() {
            JobStatus::CompletedWithWarnings
        } else {
            JobStatus::Completed
        };
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// 标记任务失败
    pub fn fail(&mut self) -> Result<(), DomainError> {
        match self.status {
            JobStatus::Queued | JobStatus::Running => {
                self.status = JobStatus::Failed;
                self.completed_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 取消任务
    ///
    /// 已完成候选的线索保持持久化
    pub fn cancel(&mut self) -> Result<(), DomainError> {
        match self.status {
            JobStatus::Queued | JobStatus::Running => {
                self.status = JobStatus::Cancelled;
                self.completed_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 记录一条警告
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_query() -> JobQuery {
        JobQuery {
            niche: "dentist".to_string(),
            location: Some("Lahore".to_string()),
            max_results: 10,
            max_pages_per_site: 3,
            sources: vec!["google_places".to_string()],
            extract_options: ExtractOptions::default(),
        }
    }

    #[test]
    fn test_lifecycle_clean_completion() {
        let mut job = Job::new(test_query());
        assert_eq!(job.status, JobStatus::Queued);

        job.start().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());

        job.counters.succeeded = 5;
        job.finish().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.status.is_terminal());
    }

    #[test]
    fn test_finish_with_partial_failures() {
        let mut job = Job::new(test_query());
        job.start().unwrap();
        job.counters.succeeded = 3;
        job.counters.failed = 2;
        job.finish().unwrap();
        assert_eq!(job.status, JobStatus::CompletedWithWarnings);
    }

    #[test]
    fn test_finish_with_source_warning_only() {
        let mut job = Job::new(test_query());
        job.start().unwrap();
        job.counters.succeeded = 3;
        job.add_warning("source yelp failed: quota exceeded");
        job.finish().unwrap();
        assert_eq!(job.status, JobStatus::CompletedWithWarnings);
    }

    #[test]
    fn test_finish_without_leads_fails() {
        let mut job = Job::new(test_query());
        job.start().unwrap();
        job.counters.failed = 4;
        job.finish().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut job = Job::new(test_query());
        assert!(job.finish().is_err()); // queued → finish 非法

        job.start().unwrap();
        assert!(job.start().is_err()); // running → start 非法

        job.counters.succeeded = 1;
        job.finish().unwrap();
        assert!(job.cancel().is_err()); // 终态不可取消
        assert!(job.fail().is_err());
    }

    #[test]
    fn test_cancel_from_running() {
        let mut job = Job::new(test_query());
        job.start().unwrap();
        job.cancel().unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::CompletedWithWarnings,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<JobStatus>().unwrap(), status);
        }
    }
}
