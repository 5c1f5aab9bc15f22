//! 影子策略：决定请求整形、回复顺序、影子请求构造与影子回复观察。
//!
//! # 设计初衷（Why）
//! - 不同的影子场景需要不同的“形状”：有的只是原样复制，有的要先拿到主回复、
//!   把结果字段拷进影子请求，或者对比主/影子回复是否一致；
//! - 路由节点只编排调用顺序，具体行为全部下放给策略，嵌入方可在装配时替换。
//!
//! # 契约说明（What）
//! - [`ShadowPolicy::adjust_request`]：每个请求至多调用一次，且仅在至少一个影子条目命中时调用；
//!   返回值同时用于主路由与全部影子条目；
//! - [`ShadowPolicy::should_delay_shadow`]：返回 `true` 时，节点在构造第一个影子请求之前先同步取得主回复；
//! - [`ShadowPolicy::make_shadow_request`]：每个命中的影子条目调用一次；
//! - [`ShadowPolicy::make_post_shadow_reply_fn`]：仅在主回复已存在时调用，返回的观察者在影子任务里
//!   以影子结果为参数调用一次。
//!
//! 策略除构造时捕获的常量配置外应视为无状态。

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::error::DestinationResult;
use crate::request::{RequestKind, ShadowableRequest};

mod validating;

pub use validating::{ReplyValidatingPolicy, ValidationStats};

/// 影子回复观察者，在影子任务中以影子结果调用一次。
pub type PostShadowReplyFn<Rep> = Box<dyn FnOnce(&DestinationResult<Rep>) + Send + 'static>;

/// 影子策略能力集合。
pub trait ShadowPolicy<Req, Rep>: Send + Sync + 'static
where
    Req: ShadowableRequest,
    Rep: Send + 'static,
{
    /// 构造用于主路由与影子的调整后请求。
    fn adjust_request(&self, request: &Req) -> Arc<Req>;

    /// 该类型的请求是否需要先取得主回复。
    fn should_delay_shadow(&self, kind: RequestKind) -> bool;

    /// 为单个影子条目构造影子请求。
    fn make_shadow_request(&self, adjusted: &Arc<Req>) -> Arc<Req>;

    /// 基于主回复构造影子回复观察者；返回 `None` 表示不观察。
    fn make_post_shadow_reply_fn(
        &self,
        primary_reply: &DestinationResult<Rep>,
    ) -> Option<PostShadowReplyFn<Rep>>;
}

/// 默认策略：原样复制请求，不延迟，不观察影子回复。
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultShadowPolicy;

impl<Req, Rep> ShadowPolicy<Req, Rep> for DefaultShadowPolicy
where
    Req: ShadowableRequest,
    Rep: Send + 'static,
{
    fn adjust_request(&self, request: &Req) -> Arc<Req> {
        Arc::new(request.clone())
    }

    fn should_delay_shadow(&self, _kind: RequestKind) -> bool {
        false
    }

    // 影子请求与调整后请求共享同一份数据，不再复制。
    fn make_shadow_request(&self, adjusted: &Arc<Req>) -> Arc<Req> {
        Arc::clone(adjusted)
    }

    fn make_post_shadow_reply_fn(
        &self,
        _primary_reply: &DestinationResult<Rep>,
    ) -> Option<PostShadowReplyFn<Rep>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_stubs::{CacheReply, CacheRequest};

    #[test]
    fn default_policy_shares_adjusted_request() {
        let policy = DefaultShadowPolicy;
        let request = CacheRequest::new(RequestKind::Set, "user:42").with_value("v1");

        let adjusted = ShadowPolicy::<CacheRequest, CacheReply>::adjust_request(&policy, &request);
        assert_eq!(*adjusted, request);

        let shadow =
            ShadowPolicy::<CacheRequest, CacheReply>::make_shadow_request(&policy, &adjusted);
        assert!(Arc::ptr_eq(&adjusted, &shadow));
    }

    #[test]
    fn default_policy_never_delays_or_observes() {
        let policy = DefaultShadowPolicy;
        for kind in [RequestKind::Get, RequestKind::Set, RequestKind::Delete] {
            assert!(!ShadowPolicy::<CacheRequest, CacheReply>::should_delay_shadow(
                &policy, kind
            ));
        }
        let reply = Ok(CacheReply::hit("v"));
        assert!(
            ShadowPolicy::<CacheRequest, CacheReply>::make_post_shadow_reply_fn(&policy, &reply)
                .is_none()
        );
    }
}
