use super::backoff::BackoffPolicy;
use failover_core::{NodeSelectionStrategy, ServiceConfig};
use std::time::Duration;

/// 单个路由实例的不可变参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingConfig {
    pub strategy: NodeSelectionStrategy,
    /// 单次调用最多重试的次数（不含首次尝试）
    pub max_num_retries: u32,
    /// 单次调用最多跟随的 308 重定向次数
    pub max_num_relocations: u32,
    pub failures_before_switching: u32,
    pub num_servers_to_try_before_failing: u32,
    pub fast_failover_timeout: Duration,
    pub max_backoff: Duration,
    /// 失败节点的冷却时间，仅轮询模式使用，0 表示关闭
    pub failed_url_cooldown: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strategy: NodeSelectionStrategy::PinUntilError,
            max_num_retries: 4,
            max_num_relocations: 20,
            failures_before_switching: 3,
            num_servers_to_try_before_failing: 14,
            fast_failover_timeout: Duration::from_secs(10),
            max_backoff: Duration::from_secs(3),
            failed_url_cooldown: Duration::ZERO,
        }
    }
}

impl RoutingConfig {
    pub fn with_strategy(mut self, strategy: NodeSelectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.failures_before_switching, self.max_backoff)
    }
}

impl From<&ServiceConfig> for RoutingConfig {
    fn from(service: &ServiceConfig) -> Self {
        Self {
            strategy: service.node_selection_strategy,
            max_num_retries: service.max_num_retries,
            max_num_relocations: service.max_num_relocations,
            failures_before_switching: service.failures_before_switching,
            num_servers_to_try_before_failing: service.num_servers_to_try_before_failing,
            fast_failover_timeout: service.fast_failover_timeout(),
            max_backoff: service.max_backoff(),
            failed_url_cooldown: service.failed_url_cooldown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_defaults() {
        let service = ServiceConfig::with_uris(vec!["http://a".to_string()]);
        assert_eq!(RoutingConfig::from(&service), RoutingConfig::default());
    }

    #[test]
    fn test_from_service_config() {
        let mut service = ServiceConfig::with_uris(vec!["http://a".to_string()]);
        service.node_selection_strategy = NodeSelectionStrategy::RoundRobin;
        service.failed_url_cooldown_ms = 250;
        service.max_backoff_ms = 100;
        service.max_num_relocations = 2;

        let config = RoutingConfig::from(&service);
        assert_eq!(config.strategy, NodeSelectionStrategy::RoundRobin);
        assert_eq!(config.failed_url_cooldown, Duration::from_millis(250));
        assert_eq!(config.max_num_relocations, 2);
        assert_eq!(config.backoff_policy().max_backoff(), Duration::from_millis(100));
    }
}
