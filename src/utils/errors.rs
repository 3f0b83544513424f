// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// Worker错误类型
///
/// 任务执行层（job worker）可能出现的错误
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("仓库错误: {0}")]
    RepositoryError(String),

    #[error("领域错误: {0}")]
    DomainError(String),

    #[error("服务错误: {0}")]
    ServiceError(String),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl From<crate::domain::repositories::RepositoryError> for WorkerError {
    fn from(e: crate::domain::repositories::RepositoryError) -> Self {
        WorkerError::RepositoryError(e.to_string())
    }
}

impl From<crate::domain::models::job::DomainError> for WorkerError {
    fn from(e: crate::domain::models::job::DomainError) -> Self {
        WorkerError::DomainError(e.to_string())
    }
}
