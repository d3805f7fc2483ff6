use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;
use std::time::Duration;
use thiserror::Error;

/// 逻辑请求，不包含目标节点
///
/// `path` 是相对路径，由传输层拼接到所选节点的基础地址之后。
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RouteRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// 拼接基础地址与请求路径
    pub fn url_for(&self, base_uri: &str) -> String {
        if self.path.is_empty() {
            return base_uri.to_string();
        }
        format!(
            "{}/{}",
            base_uri.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

/// 成功的响应
#[derive(Debug, Clone)]
pub struct RouteResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// 实际服务该请求的完整地址
    pub url: String,
}

impl RouteResponse {
    pub fn new(status: u16, body: impl Into<Bytes>, url: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            url: url.into(),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// 传输层错误
///
/// 前四种参与重试与切换，`RetryOther` 让路由层改用指定节点，
/// `ApplicationError` 原样返回给调用方。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Failed to connect to {uri}: {message}")]
    ConnectionFailure { uri: String, message: String },
    #[error("Request to {uri} timed out")]
    Timeout { uri: String },
    #[error("Failed to resolve host for {uri}: {message}")]
    DnsFailure { uri: String, message: String },
    #[error("{uri} is unavailable (status {status}), retry elsewhere")]
    ExplicitOverload {
        uri: String,
        status: u16,
        retry_after: Option<Duration>,
    },
    #[error("{uri} asked to retry the request against '{location}'")]
    RetryOther { uri: String, location: String },
    #[error("{uri} returned an application error: {message}")]
    ApplicationError {
        uri: String,
        status: Option<u16>,
        message: String,
    },
}

/// 失败分类，决定重试语义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 连接失败、超时、DNS 失败，计入连续失败次数
    Ordinary,
    /// 节点明确表示过载或正在关闭，立即切换
    FastFailover,
    /// 节点要求改用另一个指定节点（308），不计入失败
    Relocation,
    /// 应用层错误，不重试
    NonRetryable,
}

impl TransportError {
    pub fn class(&self) -> FailureClass {
        match self {
            TransportError::ConnectionFailure { .. }
            | TransportError::Timeout { .. }
            | TransportError::DnsFailure { .. } => FailureClass::Ordinary,
            TransportError::ExplicitOverload { .. } => FailureClass::FastFailover,
            TransportError::RetryOther { .. } => FailureClass::Relocation,
            TransportError::ApplicationError { .. } => FailureClass::NonRetryable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() != FailureClass::NonRetryable
    }

    /// 出错请求的地址
    pub fn uri(&self) -> &str {
        match self {
            TransportError::ConnectionFailure { uri, .. }
            | TransportError::Timeout { uri }
            | TransportError::DnsFailure { uri, .. }
            | TransportError::ExplicitOverload { uri, .. }
            | TransportError::RetryOther { uri, .. }
            | TransportError::ApplicationError { uri, .. } => uri,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::ExplicitOverload { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// 308 重定向的目标地址
    pub fn redirect_location(&self) -> Option<&str> {
        match self {
            TransportError::RetryOther { location, .. } => Some(location),
            _ => None,
        }
    }
}
