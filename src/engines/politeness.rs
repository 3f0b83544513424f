// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Politeness限流配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolitenessConfig {
    /// 全局并发上限（整个进程同时在途的页面抓取数）
    pub max_global_concurrency: usize,
    /// 单域名并发上限
    pub max_per_domain: usize,
    /// 同域名两次请求之间的最小间隔（毫秒）
    pub per_domain_delay_ms: u64,
    /// 全局每秒请求数上限，0表示不限制
    pub requests_per_second: u32,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            max_global_concurrency: 16,
            max_per_domain: 2,
            per_domain_delay_ms: 500,
            requests_per_second: 10,
        }
    }
}

/// 单个域名的并发门
struct DomainGate {
    /// 域名级信号量
    semaphore: Arc<Semaphore>,
    /// 下一个允许发起请求的时间点
    next_slot: parking_lot::Mutex<Option<Instant>>,
}

/// Politeness限流器
///
/// 页面抓取前必须先获取许可：全局信号量限制总在途请求数，
/// 域名信号量防止对单一站点的并发轰炸（多门店企业共享域名时
/// 同一域名可能出现在多个候选中），同域名请求之间强制最小间隔。
/// 许可是RAII对象，抓取结束（无论成败）随drop释放。
pub struct PolitenessLimiter {
    /// 全局信号量
    global: Arc<Semaphore>,
    /// 域名 → 并发门
    gates: DashMap<String, Arc<DomainGate>>,
    /// 全局请求速率限制
    rate: Option<DefaultDirectRateLimiter>,
    /// 配置
    config: PolitenessConfig,
}

/// 抓取许可
///
/// 同时持有全局与域名槽位，drop时一并释放
pub struct PolitenessPermit {
    _global: OwnedSemaphorePermit,
    _domain: OwnedSemaphorePermit,
}

impl PolitenessLimiter {
    /// 创建新的限流器实例
    pub fn new(config: PolitenessConfig) -> Self {
        let rate = NonZeroU32::new(config.requests_per_second)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

        Self {
            global: Arc::new(Semaphore::new(config.max_global_concurrency.max(1))),
            gates: DashMap::new(),
            rate,
            config,
        }
    }

    /// 获取指定域名的抓取许可
    ///
    /// 挂起直到全局槽位、域名槽位均可用且域名间隔已满足。
    /// 获取顺序固定为全局→域名，避免交叉等待。
    pub async fn acquire(&self, domain: &str) -> PolitenessPermit {
        let global = self
            .global
            .clone()
            .acquire_owned()
            .await
            .expect("global semaphore closed");

        let gate = self.get_or_create(domain);
        let domain_permit = gate
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("domain semaphore closed");

        // 预约本域名的下一个时间槽，锁内只做时间计算
        let min_delay = Duration::from_millis(self.config.per_domain_delay_ms);
        let wait = {
            let mut next_slot = gate.next_slot.lock();
            let now = Instant::now();
            let at = match *next_slot {
                Some(t) if t > now => t,
                _ => now,
            };
            *next_slot = Some(at + min_delay);
            at.saturating_duration_since(now)
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        if let Some(rate) = &self.rate {
            rate.until_ready().await;
        }

        PolitenessPermit {
            _global: global,
            _domain: domain_permit,
        }
    }

    /// 当前空闲的全局槽位数
    pub fn available_global_slots(&self) -> usize {
        self.global.available_permits()
    }

    fn get_or_create(&self, domain: &str) -> Arc<DomainGate> {
        self.gates
            .entry(domain.to_lowercase())
            .or_insert_with(|| {
                Arc::new(DomainGate {
                    semaphore: Arc::new(Semaphore::new(self.config.max_per_domain.max(1))),
                    next_slot: parking_lot::Mutex::new(None),
                })
            })
            .clone()
    }
}
