// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::Job;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 任务状态响应
///
/// 协作方轮询任务进度时读取的投影，
/// 部分失败通过warnings显式暴露而不是静默隐藏
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// 任务ID
    pub id: Uuid,
    /// 任务状态
    pub status: String,
    /// 去重后的候选数量
    pub candidates_found: u32,
    /// 已处理完毕的候选数量
    pub processed: u32,
    /// 成功产出线索的候选数量
    pub succeeded: u32,
    /// 未能产出线索的候选数量
    pub failed: u32,
    /// 警告列表
    pub warnings: Vec<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            status: job.status.to_string(),
            candidates_found: job.counters.candidates_found,
            processed: job.counters.processed,
            succeeded: job.counters.succeeded,
            failed: job.counters.failed,
            warnings: job.warnings.clone(),
        }
    }
}
