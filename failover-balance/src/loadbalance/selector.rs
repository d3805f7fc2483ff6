use super::cooldown::CooldownCache;
use super::node_list::NodeList;
use super::tracker::RoutingState;
use failover_core::NodeSelectionStrategy;
use tokio::time::Instant;
use tracing::{debug, trace};

/// 选中的节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedNode {
    /// 节点在列表中的位置
    pub position: usize,
    pub uri: String,
    /// 选择时看到的 `current_index`，失败时用来判断是否针对当前节点
    pub attempt_index: usize,
}

/// 节点选择器
///
/// 选择本身没有副作用：固定模式只读取 `current_index`，
/// 轮询模式从上一次选中的节点往后找第一个不在冷却中的节点。
#[derive(Debug, Clone)]
pub struct NodeSelector {
    strategy: NodeSelectionStrategy,
    nodes: NodeList,
}

impl NodeSelector {
    pub fn new(strategy: NodeSelectionStrategy, nodes: NodeList) -> Self {
        Self { strategy, nodes }
    }

    pub fn strategy(&self) -> NodeSelectionStrategy {
        self.strategy
    }

    pub fn nodes(&self) -> &NodeList {
        &self.nodes
    }

    /// 根据策略选择下一个要尝试的节点
    pub fn select(
        &self,
        state: &RoutingState,
        cooldown: &CooldownCache,
        now: Instant,
    ) -> SelectedNode {
        match self.strategy {
            NodeSelectionStrategy::PinUntilError => self.select_pinned(state),
            NodeSelectionStrategy::RoundRobin => self.select_round_robin(state, cooldown, now),
        }
    }

    /// 直接选择指定位置的节点（重定向使用），不看策略和冷却
    pub fn select_position(&self, position: usize, state: &RoutingState) -> SelectedNode {
        self.selected(position % self.nodes.len(), state)
    }

    fn select_pinned(&self, state: &RoutingState) -> SelectedNode {
        let position = state.current_index % self.nodes.len();
        trace!("Pinned selection: {}", self.nodes.get(position));
        self.selected(position, state)
    }

    fn select_round_robin(
        &self,
        state: &RoutingState,
        cooldown: &CooldownCache,
        now: Instant,
    ) -> SelectedNode {
        let len = self.nodes.len();
        let start = state.last_selected.map(|p| p + 1).unwrap_or(0);

        for offset in 0..len {
            let position = (start + offset) % len;
            if cooldown.is_eligible(self.nodes.get(position), now) {
                return self.selected(position, state);
            }
        }

        // 所有节点都在冷却中，选择冷却最早结束的节点
        let position = cooldown
            .least_recently_cooled(self.nodes.iter())
            .and_then(|uri| self.nodes.position_of(uri))
            .unwrap_or(start % len);

        debug!(
            "All {} nodes are cooling down, falling back to {}",
            len,
            self.nodes.get(position)
        );
        self.selected(position, state)
    }

    fn selected(&self, position: usize, state: &RoutingState) -> SelectedNode {
        SelectedNode {
            position,
            uri: self.nodes.get(position).to_string(),
            attempt_index: state.current_index,
        }
    }
}
