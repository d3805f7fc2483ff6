use failover_balance::ExhaustionReason;
use failover_core::TransportError;
use thiserror::Error;

/// 路由调用对外返回的错误
#[derive(Error, Debug)]
pub enum RouteError {
    /// 重试用尽，携带最后一次失败的原因
    #[error(
        "Could not complete request against {target} after {attempts} attempts ({reason}): {source}"
    )]
    Exhausted {
        target: String,
        reason: ExhaustionReason,
        attempts: u32,
        #[source]
        source: TransportError,
    },
    /// 无法跟随 308 重定向：目标不在节点列表中，或超过重定向次数上限
    #[error("Failed to follow redirect to '{location}': {message}")]
    Redirect {
        location: String,
        message: String,
        #[source]
        source: TransportError,
    },
    /// 不可重试的错误，原样返回
    #[error(transparent)]
    Transport(TransportError),
    /// 调用方已取消
    #[error("Request was cancelled by the caller")]
    Cancelled,
}

impl RouteError {
    /// 最后一次尝试的底层原因
    pub fn last_cause(&self) -> Option<&TransportError> {
        match self {
            RouteError::Exhausted { source, .. } | RouteError::Redirect { source, .. } => {
                Some(source)
            }
            RouteError::Transport(error) => Some(error),
            RouteError::Cancelled => None,
        }
    }

    pub fn exhaustion_reason(&self) -> Option<ExhaustionReason> {
        match self {
            RouteError::Exhausted { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RouteError::Cancelled)
    }
}
