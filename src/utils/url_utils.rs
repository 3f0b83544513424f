// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 跟踪参数前缀与名称
///
/// 这些查询参数仅用于流量归因，对页面内容没有影响，
/// 在URL规范化时会被移除
const TRACKING_PARAM_PREFIXES: [&str; 1] = ["utm_"];
const TRACKING_PARAM_NAMES: [&str; 5] = ["fbclid", "gclid", "msclkid", "mc_cid", "ref"];

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 解析URL并补全缺失的scheme
///
/// 目录API返回的网站字段经常缺少 `http(s)://` 前缀
pub fn parse_lenient(raw: &str) -> Result<Url, ParseError> {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) => Ok(url),
        Err(ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{}", trimmed)),
        Err(e) => Err(e),
    }
}

/// 提取URL的域名键
///
/// 去掉 `www.` 前缀并转为小写；非默认端口保留在键里
/// （本地部署的站点靠端口区分）
pub fn domain_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    if host.is_empty() {
        return None;
    }
    let host = host.trim_start_matches("www.");
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host.to_string()),
    }
}

/// 提取URL的可注册域名，用作去重键
///
/// # 返回值
///
/// 无法解析或没有host的URL返回None
pub fn registrable_domain(raw: &str) -> Option<String> {
    domain_key(&parse_lenient(raw).ok()?)
}

/// 判断查询参数是否为跟踪参数
fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_lowercase();
    TRACKING_PARAM_PREFIXES.iter().any(|p| lower.starts_with(p))
        || TRACKING_PARAM_NAMES.iter().any(|n| lower == *n)
}

/// 规范化URL
///
/// 小写host、移除跟踪参数和片段标识符、去掉末尾斜杠
pub fn canonicalize(raw: &str) -> Option<String> {
    let mut url = parse_lenient(raw).ok()?;
    url.host_str()?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.set_fragment(None);
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    urlencoding::encode(k).into_owned()
                } else {
                    format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
                }
            })
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&query));
    }

    let mut out = url.to_string().to_lowercase();
    while out.ends_with('/') {
        out.pop();
    }
    Some(out)
}

/// 判断两个URL是否属于同一域名
pub fn same_domain(a: &Url, b: &Url) -> bool {
    match (a.host_str(), b.host_str()) {
        (Some(ha), Some(hb)) => {
            ha.trim_start_matches("www.").eq_ignore_ascii_case(hb.trim_start_matches("www."))
        }
        _ => false,
    }
}
