use anyhow::Result;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub services: HashMap<String, ServiceConfig>,
    #[serde(default)]
    pub settings: GlobalSettings,
}

/// 全局设置，作为各服务未显式配置时的兜底值
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GlobalSettings {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// 单个服务的路由配置
///
/// 一个服务对应一组可互换的副本地址，客户端按照 `node_selection_strategy`
/// 在它们之间选择并在失败时切换。
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    pub uris: Vec<String>,
    #[serde(default)]
    pub node_selection_strategy: NodeSelectionStrategy,
    #[serde(default = "default_max_num_retries")]
    pub max_num_retries: u32,
    /// 失败节点的冷却时间，0 表示关闭冷却
    #[serde(default)]
    pub failed_url_cooldown_ms: u64,
    #[serde(default = "default_failures_before_switching")]
    pub failures_before_switching: u32,
    #[serde(default = "default_num_servers_to_try_before_failing")]
    pub num_servers_to_try_before_failing: u32,
    #[serde(default = "default_fast_failover_timeout")]
    pub fast_failover_timeout_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// 单次调用最多跟随的 308 重定向次数
    #[serde(default = "default_max_num_relocations")]
    pub max_num_relocations: u32,
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
    /// 构造时打乱节点顺序，让同一服务的多个客户端分散到不同副本
    #[serde(default)]
    pub randomize_order: bool,
}

impl ServiceConfig {
    /// 使用默认参数创建服务配置
    pub fn with_uris(uris: Vec<String>) -> Self {
        Self {
            uris,
            node_selection_strategy: NodeSelectionStrategy::default(),
            max_num_retries: default_max_num_retries(),
            failed_url_cooldown_ms: 0,
            failures_before_switching: default_failures_before_switching(),
            num_servers_to_try_before_failing: default_num_servers_to_try_before_failing(),
            fast_failover_timeout_ms: default_fast_failover_timeout(),
            max_backoff_ms: default_max_backoff(),
            max_num_relocations: default_max_num_relocations(),
            connect_timeout_ms: None,
            read_timeout_ms: None,
            randomize_order: false,
        }
    }

    pub fn failed_url_cooldown(&self) -> Duration {
        Duration::from_millis(self.failed_url_cooldown_ms)
    }

    pub fn fast_failover_timeout(&self) -> Duration {
        Duration::from_millis(self.fast_failover_timeout_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// 连接超时，未配置时使用全局设置
    pub fn connect_timeout(&self, settings: &GlobalSettings) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.unwrap_or(settings.connect_timeout_ms))
    }

    /// 读取超时，未配置时使用全局设置
    pub fn read_timeout(&self, settings: &GlobalSettings) -> Duration {
        Duration::from_millis(self.read_timeout_ms.unwrap_or(settings.read_timeout_ms))
    }
}

/// 节点选择策略
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeSelectionStrategy {
    /// 固定使用当前节点，直到它失败足够多次才切换
    #[default]
    #[serde(alias = "pin_until_error")]
    PinUntilError,
    /// 每次调用轮换到下一个节点，跳过冷却中的节点
    #[serde(alias = "round_robin")]
    RoundRobin,
}

impl std::fmt::Display for NodeSelectionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeSelectionStrategy::PinUntilError => write!(f, "PIN_UNTIL_ERROR"),
            NodeSelectionStrategy::RoundRobin => write!(f, "ROUND_ROBIN"),
        }
    }
}

// Default value functions
fn default_connect_timeout() -> u64 {
    10_000
}

fn default_read_timeout() -> u64 {
    300_000 // 5分钟
}

fn default_user_agent() -> String {
    format!("failover-client/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_num_retries() -> u32 {
    4
}

fn default_failures_before_switching() -> u32 {
    3
}

fn default_num_servers_to_try_before_failing() -> u32 {
    14
}

fn default_fast_failover_timeout() -> u64 {
    10_000
}

fn default_max_backoff() -> u64 {
    3_000
}

fn default_max_num_relocations() -> u32 {
    20
}

/// 将 ws/wss 地址改写为对应的 http/https 地址
pub fn switch_ws_to_http(uri: &str) -> String {
    let lower = uri.to_ascii_lowercase();
    if lower.starts_with("ws:") {
        format!("http:{}", &uri[3..])
    } else if lower.starts_with("wss:") {
        format!("https:{}", &uri[4..])
    } else {
        uri.to_string()
    }
}

/// 校验并规范化单个基础地址
///
/// 基础地址只能包含 scheme、host、port 和 path，不允许 query、fragment 或用户信息。
pub fn canonicalize_base_uri(uri: &str) -> Result<String> {
    let switched = switch_ws_to_http(uri.trim());
    let url = Url::parse(&switched)
        .map_err(|e| anyhow::anyhow!("Not a valid URL: '{}' ({})", uri, e))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!(
            "Invalid URL scheme in '{}'. Must start with http://, https://, ws:// or wss://",
            uri
        );
    }

    if url.host_str().is_none() {
        anyhow::bail!("URL '{}' has no host", uri);
    }

    if url.query().is_some()
        || url.fragment().is_some()
        || !url.username().is_empty()
        || url.password().is_some()
    {
        anyhow::bail!(
            "Base URLs must be 'canonical' and consist of schema, host, port, and path only: {}",
            uri
        );
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

impl Config {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            anyhow::bail!("No services configured");
        }

        if self.settings.connect_timeout_ms == 0 {
            anyhow::bail!("Global connect_timeout_ms cannot be 0");
        }

        if self.settings.read_timeout_ms == 0 {
            anyhow::bail!("Global read_timeout_ms cannot be 0");
        }

        for (service_name, service) in &self.services {
            Self::validate_service_config(service_name, service)?;
        }

        Ok(())
    }

    /// 验证单个服务配置的有效性
    pub fn validate_service_config(service_name: &str, service: &ServiceConfig) -> Result<()> {
        if service_name.trim().is_empty() {
            anyhow::bail!("Service name cannot be empty");
        }

        if service.uris.is_empty() {
            anyhow::bail!("Service '{}' has no uris defined", service_name);
        }

        for uri in &service.uris {
            if uri.trim().is_empty() {
                anyhow::bail!("Service '{}' has empty uri in uris list", service_name);
            }
            canonicalize_base_uri(uri)
                .map_err(|e| anyhow::anyhow!("Service '{}': {}", service_name, e))?;
        }

        if service.failures_before_switching == 0 {
            anyhow::bail!(
                "Service '{}' has invalid failures_before_switching: cannot be 0",
                service_name
            );
        }

        if service.num_servers_to_try_before_failing == 0 {
            anyhow::bail!(
                "Service '{}' has invalid num_servers_to_try_before_failing: cannot be 0",
                service_name
            );
        }

        if service.fast_failover_timeout_ms == 0 {
            anyhow::bail!(
                "Service '{}' has invalid fast_failover_timeout_ms: cannot be 0",
                service_name
            );
        }

        if service.connect_timeout_ms == Some(0) {
            anyhow::bail!(
                "Service '{}' has invalid connect_timeout_ms: cannot be 0",
                service_name
            );
        }

        if service.read_timeout_ms == Some(0) {
            anyhow::bail!(
                "Service '{}' has invalid read_timeout_ms: cannot be 0",
                service_name
            );
        }

        Ok(())
    }

    pub fn get_service(&self, service_name: &str) -> Option<&ServiceConfig> {
        self.services.get(service_name)
    }
}
