//! 影子请求的异步扇出。
//!
//! # 设计初衷（Why）
//! - 影子调用的存在意义是“在真实负载下演练目的地”，而不是服务调用方；因此它必须离开关键路径，
//!   且生命周期与主请求解耦：主请求返回、超时或被取消，都不影响已经提交的影子任务；
//! - 影子任务的任何失败都只留在日志与观察者里，不会回流到主请求。
//!
//! # 关键逻辑（How）
//! - [`ShadowSpawner`] 抽象“提交一个无参异步工作单元”，默认实现 [`TokioSpawner`]；
//! - [`ShadowDispatcher::dispatch`] 为任务派生带影子类别的上下文，可选地套上独立超时，
//!   然后把结果交给观察者；不保留任何 join 句柄。
//!
//! # 契约说明（What）
//! - 同一请求的多个影子任务之间、影子与主回复之间均无顺序保证；
//! - 运行时不可用时任务被丢弃，并以 [`FailureCategory::DispatchUnavailable`] 上报。

use alloc::sync::Arc;
use core::fmt;
use core::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::Handle;

use crate::context::{RequestClass, RouteContext};
use crate::destination::DestinationHandle;
use crate::error::DestinationError;
use crate::failure::FailureCategory;
use crate::policy::PostShadowReplyFn;

/// 任务提交契约。
pub trait ShadowSpawner: Send + Sync + 'static {
    /// 提交任务并立即返回；返回 `false` 表示任务未被接收。
    fn spawn(&self, task: BoxFuture<'static, ()>) -> bool;
}

/// 基于 Tokio 的任务提交实现。
///
/// 未绑定运行时句柄时，在提交那一刻从当前上下文获取；获取失败即拒绝任务。
#[derive(Clone, Debug, Default)]
pub struct TokioSpawner {
    handle: Option<Handle>,
}

impl TokioSpawner {
    /// 使用提交时所在的 Tokio 运行时。
    pub fn current() -> Self {
        Self { handle: None }
    }

    /// 固定提交到指定运行时。
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl ShadowSpawner for TokioSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> bool {
        let handle = match &self.handle {
            Some(handle) => handle.clone(),
            None => match Handle::try_current() {
                Ok(handle) => handle,
                Err(err) => {
                    tracing::warn!(
                        target: "spark_shadow::dispatch",
                        error = %err,
                        "no tokio runtime available, dropping shadow task"
                    );
                    return false;
                }
            },
        };
        // 句柄直接丢弃：任务与调用方彻底解耦。
        drop(handle.spawn(task));
        true
    }
}

/// 影子请求分发器。
#[derive(Clone)]
pub struct ShadowDispatcher {
    spawner: Arc<dyn ShadowSpawner>,
    timeout: Option<Duration>,
}

impl ShadowDispatcher {
    pub fn new(spawner: Arc<dyn ShadowSpawner>) -> Self {
        Self {
            spawner,
            timeout: None,
        }
    }

    /// 以 [`TokioSpawner::current`] 构造。
    pub fn tokio() -> Self {
        Self::new(Arc::new(TokioSpawner::current()))
    }

    /// 为每次影子调用设置独立超时，超时结果为 [`DestinationError::Timeout`]。
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// 即发即忘地把影子请求发往 `destination`。
    ///
    /// # 执行逻辑（How）
    /// 1. 基于 `ctx` 派生影子类别上下文，随任务一起移动；
    /// 2. 任务内调用目的地（可选超时），失败仅记 `debug` 日志；
    /// 3. 若提供了观察者，以影子结果调用一次；
    /// 4. 提交被拒绝时上报 [`FailureCategory::DispatchUnavailable`]。
    ///
    /// 本方法不会等待任务完成。
    pub fn dispatch<Req, Rep>(
        &self,
        ctx: &RouteContext,
        destination: DestinationHandle<Req, Rep>,
        request: Arc<Req>,
        post_reply_fn: Option<PostShadowReplyFn<Rep>>,
    ) where
        Req: Send + Sync + 'static,
        Rep: Send + 'static,
    {
        let shadow_ctx = ctx.with_request_class(RequestClass::SHADOW);
        let timeout = self.timeout;
        let task = async move {
            let call = destination.route(&shadow_ctx, &request);
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .unwrap_or_else(|_| Err(DestinationError::Timeout)),
                None => call.await,
            };
            if let Err(err) = &result {
                tracing::debug!(
                    target: "spark_shadow::dispatch",
                    destination = destination.name(),
                    code = err.code(),
                    error = %err,
                    "shadow request failed"
                );
            }
            if let Some(observe) = post_reply_fn {
                observe(&result);
            }
        }
        .boxed();

        if !self.spawner.spawn(task) {
            ctx.reporter().report(
                FailureCategory::DispatchUnavailable,
                "ShadowRoute: shadow task rejected by spawner",
            );
        }
    }
}

impl Default for ShadowDispatcher {
    fn default() -> Self {
        Self::tokio()
    }
}

impl fmt::Debug for ShadowDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowDispatcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
