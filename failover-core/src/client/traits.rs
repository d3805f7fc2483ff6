use super::types::{RouteRequest, RouteResponse, TransportError};
use async_trait::async_trait;

/// 传输层抽象
///
/// 路由层只负责决定请求发往哪个节点，真正的发送由实现者完成。
/// 实现者需要把失败归入 [`TransportError`] 的某一类，路由层据此决定是否重试。
#[async_trait]
pub trait Transport: Send + Sync {
    /// 将请求发送到 `target_uri` 指定的节点
    ///
    /// # 参数
    /// - `request`: 逻辑请求
    /// - `target_uri`: 选中节点的基础地址
    async fn execute(
        &self,
        request: &RouteRequest,
        target_uri: &str,
    ) -> Result<RouteResponse, TransportError>;
}
