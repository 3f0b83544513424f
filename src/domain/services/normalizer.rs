// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::candidate::Candidate;
use crate::utils::url_utils;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NON_ALNUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9 ]+").unwrap());

/// 规范化配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// 电话号码缺少国家码时推断使用的默认国家码（不含+）
    pub default_country_code: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            default_country_code: "1".to_string(),
        }
    }
}

/// 候选规范化器
///
/// 在去重之前把各数据源返回的原始字段统一为规范形式：
/// 电话去格式并补全国家码、URL去跟踪参数、名称统一大小写
pub struct CandidateNormalizer {
    config: NormalizerConfig,
}

impl CandidateNormalizer {
    /// 创建新的规范化器实例
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// 规范化单个候选（就地修改）
    pub fn normalize(&self, candidate: &mut Candidate) {
        candidate.name = normalize_name(&candidate.name);
        candidate.phone = candidate
            .phone
            .as_deref()
            .and_then(|p| self.normalize_phone(p));
        candidate.website = candidate
            .website
            .as_deref()
            .and_then(url_utils::canonicalize);
        candidate.address = candidate
            .address
            .as_deref()
            .map(normalize_address)
            .filter(|a| !a.is_empty());
    }

    /// 规范化电话号码
    ///
    /// 去掉所有格式字符，缺少国家码时按配置推断：
    /// `00`前缀视为国际冠码，单个`0`前缀替换为默认国家码
    ///
    /// # 返回值
    ///
    /// 位数不合理（<7或>15位）的输入返回None
    pub fn normalize_phone(&self, raw: &str) -> Option<String> {
        let has_plus = raw.trim_start().starts_with('+');
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

        let normalized = if has_plus {
            digits
        } else if let Some(rest) = digits.strip_prefix("00") {
            rest.to_string()
        } else if let Some(rest) = digits.strip_prefix('0') {
            format!("{}{}", self.config.default_country_code, rest)
        } else if digits.len() >= 11 {
            // 已带国家码的裸号码
            digits
        } else {
            format!("{}{}", self.config.default_country_code, digits)
        };

        if normalized.len() < 7 || normalized.len() > 15 {
            return None;
        }
        Some(format!("+{}", normalized))
    }
}

/// 规范化企业名称
///
/// 折叠空白并转为标题大小写
pub fn normalize_name(raw: &str) -> String {
    let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
    collapsed
        .split(' ')
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// 规范化地址：折叠空白、去首尾空格
pub fn normalize_address(raw: &str) -> String {
    WHITESPACE_RE.replace_all(raw.trim(), " ").to_string()
}

/// 生成用于模糊比较的折叠形式
///
/// ASCII折叠、小写、去标点，供Jaro-Winkler相似度比较使用
pub fn comparison_form(raw: &str) -> String {
    let folded = deunicode::deunicode(raw).to_lowercase();
    let cleaned = NON_ALNUM_RE.replace_all(&folded, " ");
    WHITESPACE_RE.replace_all(cleaned.trim(), " ").to_string()
}
