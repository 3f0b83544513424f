// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 包含任务、候选、线索和爬取结果等核心业务实体
pub mod candidate;
pub mod crawl;
pub mod job;
pub mod lead;
