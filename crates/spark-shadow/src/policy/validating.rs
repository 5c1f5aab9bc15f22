//! 主/影子回复一致性校验策略。
//!
//! # 设计定位（Why）
//! - 影子流量能到达新后端只说明链路通了；迁移前还需要确认新后端对同一读请求给出相同结果；
//! - 比较发生在影子任务内，主回复返回调用方的时间不受影响。
//!
//! # 契约说明（What）
//! - 只有读请求会延迟影子并构造观察者；
//! - 比较结果累计到共享的 [`ValidationStats`]，不一致时以 `warn` 记到目标 `spark_shadow::validation`。

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt::Debug;
use core::sync::atomic::{AtomicU64, Ordering};

use super::{PostShadowReplyFn, ShadowPolicy};
use crate::error::DestinationResult;
use crate::request::{RequestKind, ShadowableRequest};

/// 主/影子回复一致性计数。
#[derive(Debug, Default)]
pub struct ValidationStats {
    matches: AtomicU64,
    mismatches: AtomicU64,
}

impl ValidationStats {
    pub fn matches(&self) -> u64 {
        self.matches.load(Ordering::Relaxed)
    }

    pub fn mismatches(&self) -> u64 {
        self.mismatches.load(Ordering::Relaxed)
    }

    fn record(&self, matched: bool) {
        let counter = if matched {
            &self.matches
        } else {
            &self.mismatches
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// 回复校验策略：读请求先取主回复，再在影子任务里比较影子回复。
///
/// # 教案式说明
/// - **意图 (Why)**：验证新后端时，仅“能收到流量”不够，还需确认它对同一读请求给出相同结果；
/// - **执行逻辑 (How)**：
///   1. `should_delay_shadow` 对读请求返回 `true`，节点因此先拿到主回复；
///   2. `make_post_shadow_reply_fn` 克隆主回复，返回比较闭包；
///   3. 影子任务完成后比较两者，更新 [`ValidationStats`]，不一致时记 `warn` 日志；
/// - **契约 (What)**：写请求不延迟，也不构造观察者；统计通过 [`Self::stats`] 共享给外部读取；
/// - **风险 (Trade-offs)**：读请求的主回复延迟会叠加到“影子请求发出时间”上，但不影响主回复返回给调用方的时间。
#[derive(Clone, Debug, Default)]
pub struct ReplyValidatingPolicy {
    stats: Arc<ValidationStats>,
}

impl ReplyValidatingPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> Arc<ValidationStats> {
        Arc::clone(&self.stats)
    }
}

impl<Req, Rep> ShadowPolicy<Req, Rep> for ReplyValidatingPolicy
where
    Req: ShadowableRequest,
    Rep: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    fn adjust_request(&self, request: &Req) -> Arc<Req> {
        Arc::new(request.clone())
    }

    fn should_delay_shadow(&self, kind: RequestKind) -> bool {
        kind.is_read()
    }

    fn make_shadow_request(&self, adjusted: &Arc<Req>) -> Arc<Req> {
        Arc::clone(adjusted)
    }

    fn make_post_shadow_reply_fn(
        &self,
        primary_reply: &DestinationResult<Rep>,
    ) -> Option<PostShadowReplyFn<Rep>> {
        let expected = primary_reply.clone();
        let stats = Arc::clone(&self.stats);
        Some(Box::new(move |shadow_reply: &DestinationResult<Rep>| {
            let matched = *shadow_reply == expected;
            stats.record(matched);
            if !matched {
                tracing::warn!(
                    target: "spark_shadow::validation",
                    primary = ?expected,
                    shadow = ?shadow_reply,
                    "shadow reply differs from primary reply"
                );
            }
        }))
    }
}
