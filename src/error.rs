// src/error.rs

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("未提供会话 Cookie (SID)，无法访问账户")]
    SessionMissing,
    #[error("未指定用户名，请使用 --user 参数")]
    UserMissing,
    #[error("网络请求失败: {0}")]
    Network(#[from] reqwest::Error),
    #[error("网络中间件错误: {0}")]
    NetworkMiddleware(#[from] reqwest_middleware::Error),
    #[error("服务器返回错误 {status}: {url}")]
    HttpStatus { url: String, status: StatusCode },
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("临时文件持久化失败: {0}")]
    TempFilePersist(#[from] tempfile::PersistError),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL 解析错误: {0}")]
    Url(#[from] url::ParseError),
    #[error("安全错误: {0}")]
    Security(String),
    #[error("用户中断")]
    UserInterrupt,
    #[error("{0}")] // 只打印内部信息，不加任何前缀
    UserInputError(String),
    #[error("未知错误: {0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// 是否属于页面或文件获取失败 (网络错误、非成功状态码、超时)。
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            AppError::Network(_) | AppError::NetworkMiddleware(_) | AppError::HttpStatus { .. }
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
