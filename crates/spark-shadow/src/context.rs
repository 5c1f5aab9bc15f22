//! 随调用显式传递的路由上下文。
//!
//! # 设计初衷（Why）
//! - 影子调用需要携带“这是一次影子调用”的请求类别标记，供下游按类别统计或过滤；
//! - 标记只在引入它的那一步（遍历影子子节点、分发影子任务）内有效，不能泄漏到兄弟或父级作用域。
//!
//! # 关键逻辑（How）
//! - [`RouteContext`] 是一个廉价可克隆的值，[`RouteContext::with_request_class`] 返回**新**上下文，
//!   调用方手里的旧值保持不变；作用域结束时新值被丢弃，等价于“自动恢复到之前的取值”；
//! - 影子任务持有自己的上下文克隆，因此标记跨越挂起点、跨越 `spawn` 依然成立。
//!
//! # 契约说明（What）
//! - 上下文同时携带失败上报通道，判定逻辑通过它上报配置异常；
//! - 默认上报通道为 [`TracingFailureReporter`]。

use alloc::sync::Arc;
use core::fmt;

use crate::failure::{FailureReporter, TracingFailureReporter};

/// 请求类别位集合。
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RequestClass(u8);

impl RequestClass {
    /// 普通请求，无任何类别位。
    pub const NORMAL: RequestClass = RequestClass(0);
    /// 故障转移产生的请求。
    pub const FAILOVER: RequestClass = RequestClass(1 << 0);
    /// 影子请求。
    pub const SHADOW: RequestClass = RequestClass(1 << 1);

    /// 是否包含 `other` 的全部类别位。
    pub const fn contains(self, other: RequestClass) -> bool {
        self.0 & other.0 == other.0
    }

    /// 合并两组类别位。
    pub const fn union(self, other: RequestClass) -> RequestClass {
        RequestClass(self.0 | other.0)
    }

    /// 是否为普通请求。
    pub const fn is_normal(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_normal() {
            return f.write_str("RequestClass(normal)");
        }
        let mut set = f.debug_set();
        if self.contains(RequestClass::FAILOVER) {
            set.entry(&"failover");
        }
        if self.contains(RequestClass::SHADOW) {
            set.entry(&"shadow");
        }
        set.finish()
    }
}

/// 单次路由调用的上下文。
#[derive(Clone)]
pub struct RouteContext {
    request_class: RequestClass,
    reporter: Arc<dyn FailureReporter>,
}

impl RouteContext {
    /// 以默认的 `tracing` 上报通道构造普通请求上下文。
    pub fn new() -> Self {
        Self {
            request_class: RequestClass::NORMAL,
            reporter: Arc::new(TracingFailureReporter),
        }
    }

    /// 替换失败上报通道。
    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// 返回追加了 `class` 的新上下文；`self` 不受影响。
    #[must_use]
    pub fn with_request_class(&self, class: RequestClass) -> Self {
        Self {
            request_class: self.request_class.union(class),
            reporter: Arc::clone(&self.reporter),
        }
    }

    pub fn request_class(&self) -> RequestClass {
        self.request_class
    }

    /// 当前调用是否为影子调用。
    pub fn is_shadow(&self) -> bool {
        self.request_class.contains(RequestClass::SHADOW)
    }

    pub fn reporter(&self) -> &dyn FailureReporter {
        self.reporter.as_ref()
    }
}

impl Default for RouteContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RouteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteContext")
            .field("request_class", &self.request_class)
            .finish_non_exhaustive()
    }
}
