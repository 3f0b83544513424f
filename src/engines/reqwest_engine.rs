// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::engines::traits::{FetchEngine, FetchError, FetchRequest, FetchResponse};
use async_trait::async_trait;
use std::time::Instant;

/// 默认的爬虫User-Agent
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; leadrs/1.0; +http://leadrs.dev)";

/// 抓取引擎
///
/// 基于reqwest实现的HTTP抓取引擎，
/// 所有页面抓取共享同一个连接池
pub struct ReqwestEngine {
    client: reqwest::Client,
}

impl ReqwestEngine {
    /// 创建新的引擎实例
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(4)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }

    /// 使用已有的客户端创建引擎
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FetchEngine for ReqwestEngine {
    /// 执行HTTP抓取
    ///
    /// # 参数
    ///
    /// * `request` - 抓取请求
    ///
    /// # 返回值
    ///
    /// * `Ok(FetchResponse)` - 抓取响应（含非2xx状态码）
    /// * `Err(FetchError)` - 传输层错误
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let start = Instant::now();
        let response = self
            .client
            .get(&request.url)
            .timeout(request.timeout)
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        // 响应体读取也受同一个超时约束
        let remaining = request.timeout.saturating_sub(start.elapsed());
        let content = match tokio::time::timeout(remaining, response.text()).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => return Err(FetchError::RequestFailed(e)),
            Err(_) => return Err(FetchError::Timeout),
        };

        Ok(FetchResponse {
            status_code,
            content,
            content_type,
            final_url,
            response_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// 获取引擎名称
    fn name(&self) -> &'static str {
        "reqwest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
            .mount(&server)
            .await;

        let engine = ReqwestEngine::new();
        let request = FetchRequest::new(server.uri(), Duration::from_secs(5));
        let response = engine.fetch(&request).await.unwrap();

        assert!(response.is_success());
        assert_eq!(response.content, "<html>hello</html>");
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_ok_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let engine = ReqwestEngine::new();
        let request = FetchRequest::new(server.uri(), Duration::from_secs(5));
        let response = engine.fetch(&request).await.unwrap();

        assert!(!response.is_success());
        assert!(response.is_server_error());
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let engine = ReqwestEngine::new();
        let request = FetchRequest::new(server.uri(), Duration::from_millis(200));
        let err = engine.fetch(&request).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(err.is_retryable());
    }
}
