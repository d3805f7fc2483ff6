use failover_balance::SelectedNode;
use tokio::time::Instant;

/// 单次逻辑调用的上下文
///
/// 每次 `route` 新建一个，记录本次调用当前尝试的节点以及它被选中时的索引，
/// 失败时据此判断是否针对仍被固定的节点。路由实例上的共享状态不在这里。
#[derive(Debug)]
pub struct CallContext {
    attempts: u32,
    relocations: u32,
    redirect_target: Option<usize>,
    current: Option<SelectedNode>,
    started_at: Instant,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContext {
    pub fn new() -> Self {
        Self {
            attempts: 0,
            relocations: 0,
            redirect_target: None,
            current: None,
            started_at: Instant::now(),
        }
    }

    /// 开始一次新的尝试
    pub fn begin_attempt(&mut self, node: SelectedNode) {
        self.attempts = self.attempts.saturating_add(1);
        self.current = Some(node);
    }

    pub fn current(&self) -> Option<&SelectedNode> {
        self.current.as_ref()
    }

    /// 已发起的尝试次数
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// 已发起的重试次数（不含首次尝试和重定向）
    pub fn retries(&self) -> u32 {
        self.attempts
            .saturating_sub(1)
            .saturating_sub(self.relocations)
    }

    /// 记录一次重定向，下一次尝试必须发往 `position`
    pub fn relocate(&mut self, position: usize) {
        self.relocations = self.relocations.saturating_add(1);
        self.redirect_target = Some(position);
    }

    pub fn relocations(&self) -> u32 {
        self.relocations
    }

    /// 取出待执行的重定向目标
    pub fn take_redirect_target(&mut self) -> Option<usize> {
        self.redirect_target.take()
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}
