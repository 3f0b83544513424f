// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// LLM结构化提取结果
///
/// 所有字段可缺省：模型没有找到的字段按空处理，
/// 与正则提取结果做并集合并
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredExtraction {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub services: Vec<String>,
    pub social_links: HashMap<String, String>,
}

/// LLM提取器特质
///
/// LLM是外部协作方：编排器通过这个窄接口调用它，
/// 未配置或调用失败时回退到纯正则提取路径
#[async_trait]
pub trait LlmExtractor: Send + Sync {
    /// 从页面文本中提取结构化联系信息
    async fn extract_structured(
        &self,
        page_text: &str,
    ) -> Result<(StructuredExtraction, TokenUsage)>;

    /// 提取器名称
    fn name(&self) -> &'static str;
}

/// LLM配置
///
/// 提供方在构造时显式注入，不做环境变量自动探测：
/// 未配置api_key时编排器直接走正则路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// API密钥，None表示未启用LLM
    pub api_key: Option<String>,
    /// 模型名称
    pub model: String,
    /// OpenAI兼容API的基础URL
    pub api_base_url: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// 按配置构建LLM提取器
///
/// # 返回值
///
/// 未配置api_key时返回None，编排器据此走纯正则路径
pub fn build_extractor(
    settings: &LlmSettings,
    client: reqwest::Client,
) -> Option<Arc<dyn LlmExtractor>> {
    let api_key = settings.api_key.clone()?;
    Some(Arc::new(OpenAiCompatibleExtractor {
        api_key,
        model: settings.model.clone(),
        api_base_url: settings.api_base_url.clone(),
        client,
    }))
}

/// OpenAI兼容的LLM提取器
///
/// 调用chat completions接口做数据提取，温度固定为0
pub struct OpenAiCompatibleExtractor {
    api_key: String,
    model: String,
    api_base_url: String,
    client: reqwest::Client,
}

/// 输入文本截断上限，避免超出token限制
const MAX_INPUT_CHARS: usize = 10000;

#[async_trait]
impl LlmExtractor for OpenAiCompatibleExtractor {
    /// 使用LLM从文本中提取结构化数据
    ///
    /// # 参数
    /// * `page_text` - 输入文本（HTML内容或纯文本）
    ///
    /// # 返回值
    /// * `Result<(StructuredExtraction, TokenUsage)>` - 提取的数据和令牌使用情况
    ///
    /// # 错误
    /// * 当LLM服务调用失败或返回非法JSON时返回错误；
    ///   调用方必须把错误当作"回退到正则提取"处理
    async fn extract_structured(
        &self,
        page_text: &str,
    ) -> Result<(StructuredExtraction, TokenUsage)> {
        let truncated = truncate_on_char_boundary(page_text, MAX_INPUT_CHARS);

        let prompt = format!(
            "Extract business contact data from the following web page content. \
            Return ONLY a valid JSON object with these keys: \
            \"emails\" (array of strings), \"phones\" (array of strings), \
            \"services\" (array of short service descriptions offered by the business), \
            \"social_links\" (object mapping platform name to URL). \
            No markdown formatting. Content: {}",
            truncated
        );

        let request_body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a helpful data extraction assistant. You output only valid JSON."
                },
                {
                    "role": "user",
                    "content": prompt
                }
            ],
            "temperature": 0.0
        });

        let url = format!("{}/chat/completions", self.api_base_url);
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await
            .context("Failed to send request to LLM API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "LLM API returned error: {} - {}",
                status,
                error_text
            ));
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse LLM API response")?;

        let usage = if let Some(usage_val) = body.get("usage") {
            TokenUsage {
                prompt_tokens: usage_val["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: usage_val["completion_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: usage_val["total_tokens"].as_u64().unwrap_or(0) as u32,
            }
        } else {
            TokenUsage::default()
        };

        if let Some(content) = body["choices"][0]["message"]["content"].as_str() {
            // Clean up potential markdown code blocks
            let clean_content = content
                .trim()
                .trim_start_matches("```json")
                .trim_start_matches("```")
                .trim_end_matches("```");

            let data = serde_json::from_str::<StructuredExtraction>(clean_content)
                .context("Failed to parse extracted JSON content")?;
            Ok((data, usage))
        } else {
            Err(anyhow::anyhow!("Invalid response format from LLM API"))
        }
    }

    fn name(&self) -> &'static str {
        "openai_compatible"
    }
}

fn truncate_on_char_boundary(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
