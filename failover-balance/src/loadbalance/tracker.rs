use super::backoff::BackoffPolicy;
use super::routing_config::RoutingConfig;
use super::selector::SelectedNode;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 共享路由状态
///
/// 由一个路由实例持有，所有并发调用方共享。所有字段只在同一把锁内读写。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingState {
    /// 当前固定节点的指针，只在切换时递增，使用时对节点数取模
    pub current_index: usize,
    /// 上次切换以来的连续失败次数
    pub consecutive_failures: u32,
    /// 上次成功以来的切换次数
    pub switch_count: u32,
    /// 快速故障转移开始的时间
    pub fast_failover_start: Option<Instant>,
    /// 上一次被选中的节点位置（轮询使用）
    pub last_selected: Option<usize>,
}

/// 失败处理的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// 等待给定时间后重试
    Retry(Duration),
    /// 放弃，把错误返回给调用方
    Propagate(ExhaustionReason),
}

/// 放弃重试的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionReason {
    /// 快速故障转移状态持续时间超过上限
    FastFailoverTimeout { timeout: Duration },
    /// 切换次数达到上限
    TooManySwitches { switches: u32, failures_per_node: u32 },
    /// 单次调用的重试次数用完
    MaxRetriesExceeded { retries: u32 },
}

impl std::fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExhaustionReason::FastFailoverTimeout { timeout } => write!(
                f,
                "remote hosts have been in a fast failover state for more than {}ms",
                timeout.as_millis()
            ),
            ExhaustionReason::TooManySwitches {
                switches,
                failures_per_node,
            } => write!(
                f,
                "tried {} hosts each {} times",
                switches, failures_per_node
            ),
            ExhaustionReason::MaxRetriesExceeded { retries } => {
                write!(f, "gave up after {} retries", retries)
            }
        }
    }
}

/// 失败跟踪器
///
/// 把"判断失败是否针对当前节点、累加计数、决定是否切换"作为一个整体在锁内完成，
/// 因此针对已被替换节点的并发失败不会造成重复切换。
#[derive(Debug)]
pub struct FailureTracker {
    state: Mutex<RoutingState>,
    failures_before_switching: u32,
    num_servers_to_try_before_failing: u32,
    fast_failover_timeout: Duration,
    backoff: BackoffPolicy,
}

impl FailureTracker {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            state: Mutex::new(RoutingState::default()),
            failures_before_switching: config.failures_before_switching.max(1),
            num_servers_to_try_before_failing: config.num_servers_to_try_before_failing,
            fast_failover_timeout: config.fast_failover_timeout,
            backoff: config.backoff_policy(),
        }
    }

    /// 当前状态的副本
    pub fn snapshot(&self) -> RoutingState {
        self.state.lock().clone()
    }

    /// 在锁内执行节点选择并记录被选中的位置
    pub fn select<F>(&self, select: F) -> SelectedNode
    where
        F: FnOnce(&RoutingState) -> SelectedNode,
    {
        let mut state = self.state.lock();
        let selected = select(&state);
        state.last_selected = Some(selected.position);
        selected
    }

    /// 记录一次成功调用，清零所有失败计数
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        if state.consecutive_failures != 0
            || state.switch_count != 0
            || state.fast_failover_start.is_some()
        {
            debug!(
                "Successful call, resetting failure state (failures={}, switches={})",
                state.consecutive_failures, state.switch_count
            );
        }
        state.consecutive_failures = 0;
        state.switch_count = 0;
        state.fast_failover_start = None;
    }

    /// 节点通过 308 指向另一个节点时，把当前指针移到该节点
    ///
    /// 指针只向前移动到下一个与 `position` 同余的值，之前针对旧节点的失败随之失效。
    /// 重定向不是失败，不改变切换次数和快速故障转移状态。
    pub fn redirect_to(&self, position: usize, num_nodes: usize) -> usize {
        let mut state = self.state.lock();
        let num_nodes = num_nodes.max(1);

        if state.current_index % num_nodes != position % num_nodes {
            let next = state.current_index.wrapping_add(1);
            let distance = (position % num_nodes + num_nodes - next % num_nodes) % num_nodes;
            state.current_index = next.wrapping_add(distance);
            state.consecutive_failures = 0;
            info!(
                "Redirected to node at position {} (index {})",
                position, state.current_index
            );
        }

        state.current_index
    }

    /// 记录一次可重试的失败并给出决定
    ///
    /// # 参数
    /// - `failed_at_index`: 失败的那次尝试在选择节点时看到的 `current_index`
    /// - `is_fast_failover`: 节点是否明确表示过载或正在关闭
    /// - `retry_after`: 节点给出的重试提示，仅快速故障转移使用
    /// - `now`: 当前时间
    pub fn record_failure(
        &self,
        failed_at_index: usize,
        is_fast_failover: bool,
        retry_after: Option<Duration>,
        now: Instant,
    ) -> Decision {
        let mut state = self.state.lock();

        let switches_before = state.switch_count;
        let mut failures_before_reset = state.consecutive_failures;

        // 只有针对当前节点的失败才计数，说明还没有其他调用方切换过
        if failed_at_index == state.current_index {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            failures_before_reset = state.consecutive_failures;

            if is_fast_failover || state.consecutive_failures >= self.failures_before_switching {
                if is_fast_failover {
                    // 节点可达只是在关闭或不是 leader，不应继续加大退避
                    state.switch_count = 0;
                    if state.fast_failover_start.is_none() {
                        state.fast_failover_start = Some(now);
                    }
                } else {
                    state.switch_count = state.switch_count.saturating_add(1);
                    state.fast_failover_start = None;
                }
                state.consecutive_failures = 0;
                state.current_index = state.current_index.wrapping_add(1);

                info!(
                    "Switching to next node (index {}, switches={}, fast_failover={})",
                    state.current_index, state.switch_count, is_fast_failover
                );
            }
        } else {
            debug!(
                "Ignoring stale failure against index {} (current index {})",
                failed_at_index, state.current_index
            );
        }

        let failed_due_to_fast_failover = state
            .fast_failover_start
            .map(|start| now.saturating_duration_since(start) > self.fast_failover_timeout)
            .unwrap_or(false);
        let failed_due_to_num_switches =
            state.switch_count >= self.num_servers_to_try_before_failing;

        if failed_due_to_fast_failover {
            warn!(
                "This connection has been instructed to fast failover for {} seconds without \
                 establishing a successful connection. The remote hosts have been in a fast \
                 failover state for too long.",
                self.fast_failover_timeout.as_secs()
            );
            return Decision::Propagate(ExhaustionReason::FastFailoverTimeout {
                timeout: self.fast_failover_timeout,
            });
        }

        if failed_due_to_num_switches {
            warn!(
                "This connection has tried {} hosts each {} times and has failed out.",
                self.num_servers_to_try_before_failing, self.failures_before_switching
            );
            return Decision::Propagate(ExhaustionReason::TooManySwitches {
                switches: state.switch_count,
                failures_per_node: self.failures_before_switching,
            });
        }

        drop(state);

        if is_fast_failover {
            let delay = retry_after
                .map(|hint| hint.min(self.backoff.max_backoff()))
                .unwrap_or(Duration::ZERO);
            Decision::Retry(delay)
        } else {
            Decision::Retry(self.backoff.delay(switches_before, failures_before_reset))
        }
    }
}
