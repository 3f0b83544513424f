// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含规范化、去重、提取、评分、富化编排和任务控制等核心业务逻辑
pub mod deduplicator;
pub mod enrichment_service;
pub mod extraction_service;
pub mod job_controller;
pub mod llm_service;
pub mod normalizer;
pub mod quality_scorer;
