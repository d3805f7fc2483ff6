use super::context::CallContext;
use super::types::RouteError;
use anyhow::Result;
use failover_balance::{
    CooldownCache, CooldownStats, Decision, ExhaustionReason, FailureTracker, NodeList,
    NodeSelector, RoutingConfig, RoutingState, SelectedNode,
};
use failover_core::{
    Config, FailureClass, GlobalSettings, HttpTransport, NodeSelectionStrategy, RouteRequest,
    RouteResponse, ServiceConfig, Transport, TransportError,
};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 重试协调器
///
/// 每个逻辑客户端一个实例，实例之间不共享任何状态。对每次调用：
/// 选择节点 → 通过传输层发送 → 成功则清零失败状态，失败则分类、更新共享状态，
/// 然后按退避等待后重试，或者把最后一次的错误返回给调用方。
pub struct RetryCoordinator {
    name: String,
    selector: NodeSelector,
    tracker: FailureTracker,
    cooldown: CooldownCache,
    config: RoutingConfig,
    transport: Arc<dyn Transport>,
}

impl RetryCoordinator {
    pub fn new(
        name: impl Into<String>,
        nodes: NodeList,
        config: RoutingConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let tracker = FailureTracker::new(&config);
        Self {
            name: name.into(),
            selector: NodeSelector::new(config.strategy, nodes),
            tracker,
            cooldown: CooldownCache::new(),
            config,
            transport,
        }
    }

    /// 根据服务配置创建，使用 HTTP 传输
    pub fn from_service_config(
        name: &str,
        service: &ServiceConfig,
        settings: &GlobalSettings,
    ) -> Result<Self> {
        let transport = HttpTransport::with_user_agent(
            service.connect_timeout(settings),
            service.read_timeout(settings),
            Some(&settings.user_agent),
        )?;
        Self::with_transport(name, service, Arc::new(transport))
    }

    /// 根据服务配置创建，使用给定的传输实现
    pub fn with_transport(
        name: &str,
        service: &ServiceConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        Config::validate_service_config(name, service)?;

        let nodes = if service.randomize_order {
            NodeList::shuffled(&service.uris)?
        } else {
            NodeList::new(&service.uris)?
        };

        debug!(
            "Created router '{}' with {} using {}",
            name, nodes, service.node_selection_strategy
        );

        Ok(Self::new(name, nodes, RoutingConfig::from(service), transport))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &NodeList {
        self.selector.nodes()
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// 共享路由状态的副本（用于监控和测试）
    pub fn snapshot(&self) -> RoutingState {
        self.tracker.snapshot()
    }

    pub fn cooldown_stats(&self) -> CooldownStats {
        self.cooldown.get_stats(Instant::now())
    }

    /// 路由一个请求
    pub async fn route(&self, request: &RouteRequest) -> Result<RouteResponse, RouteError> {
        self.route_with_cancellation(request, &CancellationToken::new())
            .await
    }

    /// 路由一个请求，`cancel` 被触发后立即停止且不再更新共享状态
    ///
    /// 直接丢弃返回的 future 也能停止重试：
    /// 共享状态只在传输结果返回之后同步更新。
    pub async fn route_with_cancellation(
        &self,
        request: &RouteRequest,
        cancel: &CancellationToken,
    ) -> Result<RouteResponse, RouteError> {
        let mut ctx = CallContext::new();

        loop {
            if cancel.is_cancelled() {
                return Err(RouteError::Cancelled);
            }

            let node = match ctx.take_redirect_target() {
                Some(position) => self
                    .tracker
                    .select(|state| self.selector.select_position(position, state)),
                None => self.select_node(),
            };
            ctx.begin_attempt(node.clone());

            debug!(
                "Router '{}' attempt {}: {} {} -> {}",
                self.name,
                ctx.attempts(),
                request.method,
                request.path,
                node.uri
            );

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Router '{}' call cancelled while waiting for {}", self.name, node.uri);
                    return Err(RouteError::Cancelled);
                }
                result = self.transport.execute(request, &node.uri) => result,
            };

            let error = match outcome {
                Ok(response) => {
                    self.tracker.record_success();
                    debug!(
                        "Router '{}' served by {} after {} attempts in {}ms",
                        self.name,
                        node.uri,
                        ctx.attempts(),
                        ctx.elapsed().as_millis()
                    );
                    return Ok(response);
                }
                Err(error) => error,
            };

            match error.class() {
                FailureClass::NonRetryable => {
                    debug!(
                        "Router '{}' got non-retryable error from {}: {}",
                        self.name, node.uri, error
                    );
                    return Err(RouteError::Transport(error));
                }
                FailureClass::Relocation => {
                    self.relocate(&mut ctx, error)?;
                    continue;
                }
                FailureClass::Ordinary | FailureClass::FastFailover => {}
            }

            // 调用方已经放弃，不再把这次失败计入共享状态
            if cancel.is_cancelled() {
                return Err(RouteError::Cancelled);
            }

            warn!("Failed to send request to {}: {}", node.uri, error);

            let delay = match self.handle_failure(&node, &error) {
                Decision::Retry(delay) => delay,
                Decision::Propagate(reason) => {
                    return Err(self.exhausted(reason, &ctx, error));
                }
            };

            if ctx.retries() >= self.config.max_num_retries {
                warn!(
                    "Router '{}' exhausted {} retries, last node {}",
                    self.name, self.config.max_num_retries, node.uri
                );
                let reason = ExhaustionReason::MaxRetriesExceeded {
                    retries: ctx.retries(),
                };
                return Err(self.exhausted(reason, &ctx, error));
            }

            if !delay.is_zero() {
                info!("Pausing {}ms before retrying", delay.as_millis());
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Router '{}' call cancelled during backoff", self.name);
                        return Err(RouteError::Cancelled);
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    /// 处理 308：把共享指针移到 `Location` 对应的节点，下一次尝试直接发往该节点
    fn relocate(&self, ctx: &mut CallContext, error: TransportError) -> Result<(), RouteError> {
        let location = error.redirect_location().unwrap_or_default().to_string();

        if ctx.relocations() >= self.config.max_num_relocations {
            warn!(
                "Router '{}' exceeded {} redirects, last location {}",
                self.name, self.config.max_num_relocations, location
            );
            return Err(RouteError::Redirect {
                location,
                message: format!(
                    "exceeded the maximum number of allowed redirects ({})",
                    self.config.max_num_relocations
                ),
                source: error,
            });
        }

        let nodes = self.selector.nodes();
        let Some(position) = nodes.position_for_url(&location) else {
            return Err(RouteError::Redirect {
                message: format!("no matching base URL in {}", nodes),
                location,
                source: error,
            });
        };

        debug!(
            "Router '{}' received 308, retrying at advertised location {}",
            self.name,
            nodes.get(position)
        );
        self.tracker.redirect_to(position, nodes.len());
        ctx.relocate(position);
        Ok(())
    }

    fn select_node(&self) -> SelectedNode {
        let now = Instant::now();
        self.tracker
            .select(|state| self.selector.select(state, &self.cooldown, now))
    }

    fn handle_failure(&self, node: &SelectedNode, error: &TransportError) -> Decision {
        let now = Instant::now();

        if self.config.strategy == NodeSelectionStrategy::RoundRobin {
            self.cooldown
                .mark_failed(&node.uri, now, self.config.failed_url_cooldown);
        }

        self.tracker.record_failure(
            node.attempt_index,
            error.class() == FailureClass::FastFailover,
            error.retry_after(),
            now,
        )
    }

    fn exhausted(
        &self,
        reason: ExhaustionReason,
        ctx: &CallContext,
        source: TransportError,
    ) -> RouteError {
        RouteError::Exhausted {
            target: self.selector.nodes().to_string(),
            reason,
            attempts: ctx.attempts(),
            source,
        }
    }
}

impl std::fmt::Debug for RetryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryCoordinator")
            .field("name", &self.name)
            .field("nodes", self.selector.nodes())
            .field("config", &self.config)
            .finish()
    }
}
