use super::traits::Transport;
use super::types::{RouteRequest, RouteResponse, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{redirect, Client, Url};
use std::error::Error as StdError;
use std::time::Duration;

/// 应用错误消息中保留的响应体最大长度
const MAX_ERROR_BODY_LEN: usize = 512;

/// 基于 reqwest 的 HTTP 传输实现
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// 创建新的HTTP传输，设置连接超时与读取超时
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> anyhow::Result<Self> {
        Self::with_user_agent(connect_timeout, read_timeout, None)
    }

    /// 创建 HTTP 传输并指定 User-Agent
    ///
    /// 不自动跟随重定向，308 交给路由层决定切换到哪个节点。
    pub fn with_user_agent(
        connect_timeout: Duration,
        read_timeout: Duration,
        user_agent: Option<&str>,
    ) -> anyhow::Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .redirect(redirect::Policy::none());

        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_string());
        }

        let client = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: &RouteRequest,
        target_uri: &str,
    ) -> Result<RouteResponse, TransportError> {
        let url = request.url_for(target_uri);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&url, &e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();

        if response.status().is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| classify_reqwest_error(&url, &e))?;
            return Ok(RouteResponse {
                status,
                headers,
                body,
                url,
            });
        }

        if status == 308 {
            return Err(classify_redirect(&url, parse_location(&url, &headers)));
        }

        let retry_after = parse_retry_after(&headers);
        tracing::debug!("{} returned status {}", url, status);
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(&url, status, retry_after, &body))
    }
}

/// 将非 2xx 状态码归类
///
/// 503 表示节点正在关闭或不是 leader，429 表示节点过载，两者都应立即换节点。
pub fn classify_status(
    url: &str,
    status: u16,
    retry_after: Option<Duration>,
    body: &str,
) -> TransportError {
    match status {
        429 | 503 => TransportError::ExplicitOverload {
            uri: url.to_string(),
            status,
            retry_after,
        },
        _ => {
            let mut message = format!("status {}", status);
            let body = body.trim();
            if !body.is_empty() {
                let truncated: String = body.chars().take(MAX_ERROR_BODY_LEN).collect();
                message.push_str(": ");
                message.push_str(&truncated);
            }
            TransportError::ApplicationError {
                uri: url.to_string(),
                status: Some(status),
                message,
            }
        }
    }
}

/// 将 308 响应归类
///
/// 带 `Location` 时由路由层重定向到对应节点，缺少 `Location` 属于服务端协议错误。
pub fn classify_redirect(url: &str, location: Option<String>) -> TransportError {
    match location {
        Some(location) => TransportError::RetryOther {
            uri: url.to_string(),
            location,
        },
        None => TransportError::ApplicationError {
            uri: url.to_string(),
            status: Some(308),
            message: "status 308 without Location header, cannot perform redirect".to_string(),
        },
    }
}

/// 将 reqwest 错误归类为传输错误
pub fn classify_reqwest_error(url: &str, error: &reqwest::Error) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout {
            uri: url.to_string(),
        };
    }

    if error.is_connect() {
        let message = error_chain_message(error);
        if is_dns_failure(&message) {
            return TransportError::DnsFailure {
                uri: url.to_string(),
                message,
            };
        }
        return TransportError::ConnectionFailure {
            uri: url.to_string(),
            message,
        };
    }

    // 连接建立后被重置或读取响应体失败，同样视为网络错误
    if error.is_request() || error.is_body() {
        return TransportError::ConnectionFailure {
            uri: url.to_string(),
            message: error_chain_message(error),
        };
    }

    TransportError::ApplicationError {
        uri: url.to_string(),
        status: error.status().map(|s| s.as_u16()),
        message: error_chain_message(error),
    }
}

/// 解析 Retry-After 头（只支持秒数形式）
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// 解析 Location 头，相对地址按请求地址补全
pub fn parse_location(url: &str, headers: &HeaderMap) -> Option<String> {
    let location = headers.get(LOCATION)?.to_str().ok()?.trim();
    if location.is_empty() {
        return None;
    }
    let resolved = match Url::parse(url) {
        Ok(base) => base.join(location).ok()?,
        Err(_) => Url::parse(location).ok()?,
    };
    Some(resolved.to_string())
}

fn error_chain_message(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn is_dns_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::FailureClass;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_classify_unavailable_as_fast_failover() {
        let error = classify_status("http://a/x", 503, Some(Duration::from_secs(2)), "not leader");
        assert_eq!(error.class(), FailureClass::FastFailover);
        assert_eq!(error.retry_after(), Some(Duration::from_secs(2)));

        let throttled = classify_status("http://a/x", 429, None, "");
        assert_eq!(throttled.class(), FailureClass::FastFailover);
    }

    #[test]
    fn test_classify_other_statuses_as_application_errors() {
        for status in [400, 401, 404, 500, 502] {
            let error = classify_status("http://a/x", status, None, "boom");
            assert_eq!(error.class(), FailureClass::NonRetryable, "status {}", status);
            match error {
                TransportError::ApplicationError { status: s, message, .. } => {
                    assert_eq!(s, Some(status));
                    assert!(message.contains("boom"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn test_application_error_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_LEN * 2);
        match classify_status("http://a/x", 500, None, &body) {
            TransportError::ApplicationError { message, .. } => {
                assert!(message.len() < MAX_ERROR_BODY_LEN + 32);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(5)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_dns_failure_detection() {
        assert!(is_dns_failure(
            "error sending request: dns error: failed to lookup address information"
        ));
        assert!(!is_dns_failure("tcp connect error: Connection refused (os error 111)"));
    }

    #[test]
    fn test_classify_redirect() {
        let error = classify_redirect("http://a/x", Some("http://b/x".to_string()));
        assert_eq!(error.class(), FailureClass::Relocation);
        assert_eq!(error.redirect_location(), Some("http://b/x"));

        let missing = classify_redirect("http://a/x", None);
        assert_eq!(missing.class(), FailureClass::NonRetryable);
    }

    #[test]
    fn test_parse_location_resolves_relative_targets() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_location("http://a:8080/api/x", &headers), None);

        headers.insert(LOCATION, HeaderValue::from_static("http://b:9090/api/x"));
        assert_eq!(
            parse_location("http://a:8080/api/x", &headers).as_deref(),
            Some("http://b:9090/api/x")
        );

        headers.insert(LOCATION, HeaderValue::from_static("/other/x"));
        assert_eq!(
            parse_location("http://a:8080/api/x", &headers).as_deref(),
            Some("http://a:8080/other/x")
        );
    }
}
