use super::handler::RetryCoordinator;
use anyhow::Result;
use failover_core::{Config, Transport};
use std::collections::HashMap;
use std::sync::Arc;

/// 路由管理器
/// 为配置中的每个服务创建一个独立的重试协调器，服务之间不共享失败状态
pub struct RouterManager {
    config: Arc<Config>,
    routers: HashMap<String, Arc<RetryCoordinator>>,
}

impl RouterManager {
    /// 使用 HTTP 传输创建所有服务的路由
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let mut routers = HashMap::new();
        for (name, service) in &config.services {
            let router = RetryCoordinator::from_service_config(name, service, &config.settings)?;
            routers.insert(name.clone(), Arc::new(router));
        }

        tracing::info!("Initialized {} service routers", routers.len());
        Ok(Self {
            config: Arc::new(config),
            routers,
        })
    }

    /// 所有服务共用给定的传输实现
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let mut routers = HashMap::new();
        for (name, service) in &config.services {
            let router = RetryCoordinator::with_transport(name, service, transport.clone())?;
            routers.insert(name.clone(), Arc::new(router));
        }

        Ok(Self {
            config: Arc::new(config),
            routers,
        })
    }

    pub fn get(&self, service_name: &str) -> Option<Arc<RetryCoordinator>> {
        self.routers.get(service_name).cloned()
    }

    /// 获取指定服务的路由
    pub fn router(&self, service_name: &str) -> Result<Arc<RetryCoordinator>> {
        self.get(service_name)
            .ok_or_else(|| anyhow::anyhow!("Service '{}' not found", service_name))
    }

    /// 按名称排序的服务列表
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_config(&self) -> Arc<Config> {
        self.config.clone()
    }
}
