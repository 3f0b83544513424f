// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::ExtractOptions;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9._%+-]*@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?\(?\d{1,4}\)?(?:[-.\s/]?\d{2,4}){2,4}").unwrap());

static COPYRIGHT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:©|&copy;|\bcopyright\b)[^0-9]{0,20}((?:19|20)\d{2})").unwrap());

/// 已知社交平台域名 → 平台名
const SOCIAL_PLATFORMS: [(&str, &str); 9] = [
    ("facebook.com", "facebook"),
    ("instagram.com", "instagram"),
    ("linkedin.com", "linkedin"),
    ("twitter.com", "twitter"),
    // 斜杠前缀避免误伤box.com之类以x.com结尾的域名
    ("/x.com", "twitter"),
    ("youtube.com", "youtube"),
    ("tiktok.com", "tiktok"),
    ("pinterest.com", "pinterest"),
    ("wa.me", "whatsapp"),
];

/// 技术栈指纹：页面标记 → 技术名
const TECH_SIGNATURES: [(&str, &str); 16] = [
    ("wp-content", "WordPress"),
    ("wp-json", "WordPress"),
    ("cdn.shopify.com", "Shopify"),
    ("static.wixstatic.com", "Wix"),
    ("squarespace.com", "Squarespace"),
    ("woocommerce", "WooCommerce"),
    ("googletagmanager.com", "Google Tag Manager"),
    ("google-analytics.com", "Google Analytics"),
    ("gtag(", "Google Analytics"),
    ("connect.facebook.net", "Facebook Pixel"),
    ("js.stripe.com", "Stripe"),
    ("data-reactroot", "React"),
    ("__next_data__", "Next.js"),
    ("jquery", "jQuery"),
    ("bootstrap.min.css", "Bootstrap"),
    ("/cdn-cgi/", "Cloudflare"),
];

/// 角色类邮箱前缀（可选拒绝）
const ROLE_PREFIXES: [&str; 10] = [
    "info", "contact", "admin", "office", "hello", "support", "sales", "team", "mail", "enquiries",
];

/// 大概率无法送达的邮箱前缀，评分时作为可疑信号
const SUSPECT_PREFIXES: [&str; 5] = ["noreply", "no-reply", "donotreply", "postmaster", "mailer-daemon"];

/// 明显不是真实邮箱的内容
const EMAIL_ARTIFACTS: [&str; 6] = ["example.", "@2x.", ".png", ".jpg", ".gif", ".webp"];

/// 从页面中提取出的信号
///
/// 同一候选的多个页面各自提取后用 `merge` 合并
#[derive(Debug, Clone, Default)]
pub struct ExtractedSignals {
    /// 邮箱地址（排序去重）
    pub emails: Vec<String>,
    /// 电话号码（排序去重）
    pub phones: Vec<String>,
    /// 社交媒体链接，平台名 → URL
    pub social_links: HashMap<String, String>,
    /// 技术栈指纹（排序去重）
    pub tech_stack: Vec<String>,
    /// 提供的服务（仅LLM路径填充）
    pub services: Vec<String>,
    /// 页面上出现的最新版权年份
    pub latest_copyright_year: Option<i32>,
}

impl ExtractedSignals {
    /// 合并另一页面的信号
    pub fn merge(&mut self, other: ExtractedSignals) {
        merge_sorted(&mut self.emails, other.emails);
        merge_sorted(&mut self.phones, other.phones);
        merge_sorted(&mut self.tech_stack, other.tech_stack);
        merge_sorted(&mut self.services, other.services);
        for (platform, url) in other.social_links {
            self.social_links.entry(platform).or_insert(url);
        }
        self.latest_copyright_year = match (self.latest_copyright_year, other.latest_copyright_year)
        {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

fn merge_sorted(target: &mut Vec<String>, extra: Vec<String>) {
    for item in extra {
        if !target.contains(&item) {
            target.push(item);
        }
    }
    target.sort();
}

/// 联系信息与信号提取器
///
/// 对抓取到的页面内容做纯函数式提取：相同输入总是得到相同输出，
/// 不访问网络、不持有状态。畸形HTML按"没有信号"处理，从不报错。
pub struct ContactExtractor;

impl ContactExtractor {
    /// 提取单个页面的全部信号
    pub fn extract(html: &str, options: &ExtractOptions) -> ExtractedSignals {
        let document = Html::parse_document(html);
        let lower = html.to_lowercase();

        let mut signals = ExtractedSignals {
            emails: if options.emails {
                Self::extract_emails(html, &document, options.reject_role_emails)
            } else {
                Vec::new()
            },
            phones: if options.phones {
                Self::extract_phones(&document)
            } else {
                Vec::new()
            },
            social_links: if options.social {
                Self::extract_social_links(&document)
            } else {
                HashMap::new()
            },
            tech_stack: Self::extract_tech_stack(&lower, &document),
            services: Vec::new(),
            latest_copyright_year: Self::extract_copyright_year(html),
        };

        signals.emails.sort();
        signals.emails.dedup();
        signals.phones.sort();
        signals.phones.dedup();
        signals.tech_stack.sort();
        signals.tech_stack.dedup();
        signals
    }

    /// 提取邮箱：正文正则匹配 + mailto链接
    fn extract_emails(html: &str, document: &Html, reject_role: bool) -> Vec<String> {
        let mut emails: Vec<String> = Vec::new();

        for m in EMAIL_RE.find_iter(html) {
            let email = m.as_str().to_lowercase();
            if Self::is_valid_email(&email, reject_role) && !emails.contains(&email) {
                emails.push(email);
            }
        }

        if let Ok(selector) = Selector::parse(r#"a[href^="mailto:"]"#) {
            for element in document.select(&selector) {
                if let Some(href) = element.value().attr("href") {
                    let email = href
                        .trim_start_matches("mailto:")
                        .split('?')
                        .next()
                        .unwrap_or("")
                        .trim()
                        .to_lowercase();
                    if Self::is_valid_email(&email, reject_role) && !emails.contains(&email) {
                        emails.push(email);
                    }
                }
            }
        }

        emails
    }

    fn is_valid_email(email: &str, reject_role: bool) -> bool {
        if email.len() > 254 || !email.contains('@') {
            return false;
        }
        if EMAIL_ARTIFACTS.iter().any(|a| email.contains(a)) {
            return false;
        }
        let local = email.split('@').next().unwrap_or("");
        if SUSPECT_PREFIXES.iter().any(|p| local.starts_with(p)) {
            return false;
        }
        if reject_role && ROLE_PREFIXES.iter().any(|p| local == *p) {
            return false;
        }
        true
    }

    /// 提取电话：tel:链接优先，其次正文模式匹配
    fn extract_phones(document: &Html) -> Vec<String> {
        let mut phones: Vec<String> = Vec::new();
        let mut seen_digits: Vec<String> = Vec::new();

        let mut push = |raw: &str| {
            let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
            // 位数过滤同时排除年份、价格等误匹配
            if digits.len() < 7 || digits.len() > 15 {
                return;
            }
            if seen_digits.contains(&digits) {
                return;
            }
            seen_digits.push(digits);
            phones.push(raw.trim().to_string());
        };

        if let Ok(selector) = Selector::parse(r#"a[href^="tel:"]"#) {
            for element in document.select(&selector) {
                if let Some(href) = element.value().attr("href") {
                    push(href.trim_start_matches("tel:"));
                }
            }
        }

        let text = document.root_element().text().collect::<Vec<_>>().join(" ");
        for m in PHONE_RE.find_iter(&text) {
            push(m.as_str());
        }

        phones
    }

    /// 提取社交媒体链接：已知平台域名匹配
    fn extract_social_links(document: &Html) -> HashMap<String, String> {
        let mut links = HashMap::new();
        let selector = match Selector::parse("a[href]") {
            Ok(s) => s,
            Err(_) => return links,
        };

        for element in document.select(&selector) {
            let href = match element.value().attr("href") {
                Some(h) => h,
                None => continue,
            };
            let lower = href.to_lowercase();
            for (domain, platform) in SOCIAL_PLATFORMS {
                if lower.contains(domain) {
                    // 平台主页和分享链接都算；每个平台保留首个链接
                    if !lower.contains("/share") && !lower.contains("sharer") {
                        links
                            .entry(platform.to_string())
                            .or_insert_with(|| href.to_string());
                    }
                    break;
                }
            }
        }

        links
    }

    /// 提取技术栈指纹：字符串标记 + meta generator
    fn extract_tech_stack(lower_html: &str, document: &Html) -> Vec<String> {
        let mut stack: Vec<String> = Vec::new();

        for (marker, tech) in TECH_SIGNATURES {
            if lower_html.contains(marker) && !stack.iter().any(|t| t == tech) {
                stack.push(tech.to_string());
            }
        }

        if let Ok(selector) = Selector::parse(r#"meta[name="generator"]"#) {
            for element in document.select(&selector) {
                if let Some(content) = element.value().attr("content") {
                    let generator = content.trim();
                    if !generator.is_empty() && !stack.iter().any(|t| t == generator) {
                        // 形如 "WordPress 6.4" 的版本化条目与指纹并存
                        stack.push(generator.to_string());
                    }
                }
            }
        }

        stack
    }

    /// 提取页面上的最新版权年份，作为近期活动信号
    fn extract_copyright_year(html: &str) -> Option<i32> {
        COPYRIGHT_RE
            .captures_iter(html)
            .filter_map(|cap| cap.get(1)?.as_str().parse::<i32>().ok())
            .max()
    }
}

/// 判断邮箱是否为大概率无法送达的可疑地址
pub fn is_suspect_email(email: &str) -> bool {
    let local = email.split('@').next().unwrap_or("").to_lowercase();
    SUSPECT_PREFIXES.iter().any(|p| local.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAGE: &str = r#"
        <html>
        <head>
            <meta name="generator" content="WordPress 6.4">
            <script src="https://www.googletagmanager.com/gtm.js"></script>
        </head>
        <body>
            <p>Reach us at Office@SmileDental.pk or call +92 (42) 111-222-333.</p>
            <a href="mailto:dr.khan@smiledental.pk?subject=hi">Email Dr. Khan</a>
            <a href="tel:+924235761234">Call now</a>
            <a href="https://www.facebook.com/smiledentalpk">Facebook</a>
            <a href="https://instagram.com/smiledentalpk">Instagram</a>
            <img src="/wp-content/uploads/logo@2x.png">
            <footer>© 2024 Smile Dental Clinic</footer>
        </body>
        </html>
    "#;

    #[test]
    fn test_extract_emails_and_phones() {
        let signals = ContactExtractor::extract(SAMPLE_PAGE, &ExtractOptions::default());

        assert_eq!(
            signals.emails,
            vec![
                "dr.khan@smiledental.pk".to_string(),
                "office@smiledental.pk".to_string()
            ]
        );
        assert_eq!(signals.phones.len(), 2);
        // logo@2x.png 不是邮箱
        assert!(signals.emails.iter().all(|e| !e.contains("logo")));
    }

    #[test]
    fn test_extract_social_and_tech() {
        let signals = ContactExtractor::extract(SAMPLE_PAGE, &ExtractOptions::default());

        assert_eq!(
            signals.social_links.get("facebook"),
            Some(&"https://www.facebook.com/smiledentalpk".to_string())
        );
        assert!(signals.social_links.contains_key("instagram"));
        assert!(signals.tech_stack.iter().any(|t| t == "WordPress"));
        assert!(signals.tech_stack.iter().any(|t| t == "Google Tag Manager"));
        assert!(signals.tech_stack.iter().any(|t| t == "WordPress 6.4"));
    }

    #[test]
    fn test_copyright_year() {
        let signals = ContactExtractor::extract(SAMPLE_PAGE, &ExtractOptions::default());
        assert_eq!(signals.latest_copyright_year, Some(2024));

        let multi = "© 2019 old footer ... Copyright 2023 new section";
        let signals = ContactExtractor::extract(multi, &ExtractOptions::default());
        assert_eq!(signals.latest_copyright_year, Some(2023));
    }

    #[test]
    fn test_options_disable_extraction_steps() {
        let options = ExtractOptions {
            emails: false,
            phones: false,
            social: false,
            ..Default::default()
        };
        let signals = ContactExtractor::extract(SAMPLE_PAGE, &options);

        assert!(signals.emails.is_empty());
        assert!(signals.phones.is_empty());
        assert!(signals.social_links.is_empty());
        // 技术栈提取不受联系信息选项影响
        assert!(!signals.tech_stack.is_empty());
    }

    #[test]
    fn test_role_email_rejection_is_optional() {
        let html = r#"<p>info@example.org? no: info@smiledental.pk and dr.khan@smiledental.pk</p>"#;

        let default_signals = ContactExtractor::extract(html, &ExtractOptions::default());
        assert!(default_signals
            .emails
            .contains(&"info@smiledental.pk".to_string()));

        let strict = ExtractOptions {
            reject_role_emails: true,
            ..Default::default()
        };
        let strict_signals = ContactExtractor::extract(html, &strict);
        assert_eq!(strict_signals.emails, vec!["dr.khan@smiledental.pk".to_string()]);
    }

    #[test]
    fn test_noreply_always_rejected() {
        let html = "<p>noreply@smiledental.pk dr.khan@smiledental.pk</p>";
        let signals = ContactExtractor::extract(html, &ExtractOptions::default());
        assert_eq!(signals.emails, vec!["dr.khan@smiledental.pk".to_string()]);
    }

    #[test]
    fn test_malformed_html_yields_no_signals() {
        let signals = ContactExtractor::extract("<<<>>>{{%% not html at all", &ExtractOptions::default());
        assert!(signals.emails.is_empty());
        assert!(signals.phones.is_empty());
        assert!(signals.social_links.is_empty());
    }

    #[test]
    fn test_deterministic_extraction() {
        let a = ContactExtractor::extract(SAMPLE_PAGE, &ExtractOptions::default());
        let b = ContactExtractor::extract(SAMPLE_PAGE, &ExtractOptions::default());
        assert_eq!(a.emails, b.emails);
        assert_eq!(a.phones, b.phones);
        assert_eq!(a.tech_stack, b.tech_stack);
        assert_eq!(a.social_links, b.social_links);
    }

    #[test]
    fn test_merge_signals() {
        let mut a = ContactExtractor::extract(
            r#"<p>office@smiledental.pk</p><footer>© 2022</footer>"#,
            &ExtractOptions::default(),
        );
        let b = ContactExtractor::extract(
            r#"<p>dr.khan@smiledental.pk office@smiledental.pk</p><footer>© 2024</footer>"#,
            &ExtractOptions::default(),
        );

        a.merge(b);
        assert_eq!(a.emails.len(), 2);
        assert_eq!(a.latest_copyright_year, Some(2024));
    }

    #[test]
    fn test_year_not_extracted_as_phone() {
        let html = "<p>Established in 2003. Call 042-3576-1234 today.</p>";
        let signals = ContactExtractor::extract(html, &ExtractOptions::default());
        assert_eq!(signals.phones.len(), 1);
        assert!(signals.phones[0].contains("042"));
    }
}
