// src/client.rs

use crate::{config::AppConfig, constants, cookies::SessionCookies, error::*};
use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{
    Response,
    header::{self, HeaderMap, HeaderValue},
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::sync::Arc;

/// 一次页面请求的结果: 最终地址、HTML 正文以及服务器新设置的 Cookie
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub body: String,
    pub set_cookies: SessionCookies,
}

/// 扫描器获取页面的抽象，测试中可以替换为任意实现
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str, cookies: &SessionCookies) -> AppResult<FetchedPage>;
}

#[derive(Clone)]
pub struct RobustClient {
    pub client: ClientWithMiddleware,
    config: Arc<AppConfig>,
}

impl RobustClient {
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(config.max_retries);

        let mut default_headers = HeaderMap::new();
        default_headers.insert(header::ACCEPT, HeaderValue::from_static(constants::HTML_ACCEPT));
        default_headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static(constants::ACCEPT_LANGUAGE),
        );

        // 不启用 reqwest 自带的 cookie store，会话由调用方显式传递
        let client = ClientBuilder::new(
            reqwest::Client::builder()
                .user_agent(config.user_agent.clone())
                .default_headers(default_headers)
                .connect_timeout(config.connect_timeout)
                .timeout(config.timeout)
                .build()?,
        )
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

        Ok(Self { client, config })
    }

    /// 携带会话 Cookie 发起 GET 请求，非 2xx 状态码视为错误
    pub async fn get(&self, url: &str, cookies: &SessionCookies) -> AppResult<Response> {
        let mut request = self.client.get(url);
        if !cookies.is_empty() {
            request = request.header(header::COOKIE, cookies.to_header_value());
        }
        let res = request.send().await?;
        let status = res.status();
        if !status.is_success() {
            debug!("请求 {} 返回状态码 {}", url, status);
            return Err(AppError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }
        Ok(res)
    }

    /// 以下载超时发起请求，用于文件流
    pub async fn get_stream(&self, url: &str, cookies: &SessionCookies) -> AppResult<Response> {
        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, "*/*")
            .timeout(self.config.download_timeout);
        if !cookies.is_empty() {
            request = request.header(header::COOKIE, cookies.to_header_value());
        }
        let res = request.send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }
        Ok(res)
    }
}

#[async_trait]
impl PageFetcher for RobustClient {
    async fn fetch_page(&self, url: &str, cookies: &SessionCookies) -> AppResult<FetchedPage> {
        let res = self.get(url, cookies).await?;
        let set_cookies = SessionCookies::from_set_cookie_headers(res.headers());
        if !set_cookies.is_empty() {
            trace!("{} 返回了 {} 个新 Cookie", url, set_cookies.len());
        }
        let final_url = res.url().to_string();
        let body = res.text().await?;
        Ok(FetchedPage {
            url: final_url,
            body,
            set_cookies,
        })
    }
}
