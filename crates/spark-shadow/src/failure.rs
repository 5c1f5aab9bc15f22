//! 配置不一致事件的上报通道。
//!
//! # 设计定位（Why）
//! - 影子配置错误（设置缺失、目的地为空）必须“可见但无害”：既要让运维在日志里看到，
//!   又不能让主请求因此失败或挂起；
//! - 通道本身只接受 `(category, message)`，不做去重或限流，每次发生都上报一次。
//!
//! # 契约说明（What）
//! - [`FailureReporter::report`] 为同步、即发即忘调用，实现不得阻塞、不得 panic；
//! - 默认实现 [`TracingFailureReporter`] 以 `tracing::error!` 落到目标 `spark_shadow::failure`。

use core::fmt;

/// 失败事件类别。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FailureCategory {
    /// 配置不一致：设置缺失、目的地句柄为空等。
    InvalidConfig,
    /// 影子任务无法提交到运行时。
    DispatchUnavailable,
}

impl FailureCategory {
    /// 稳定的类别名，用作日志字段取值。
    pub const fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::InvalidConfig => "invalid-config",
            FailureCategory::DispatchUnavailable => "dispatch-unavailable",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 失败上报契约。
///
/// - **前置条件**：实现需 `Send + Sync`，可被多个请求任务并发调用；
/// - **后置条件**：调用返回即视为上报完成，调用方不关心结果。
pub trait FailureReporter: Send + Sync + 'static {
    /// 上报一次失败事件。
    fn report(&self, category: FailureCategory, message: &str);
}

/// 基于 `tracing` 的默认上报实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingFailureReporter;

impl FailureReporter for TracingFailureReporter {
    fn report(&self, category: FailureCategory, message: &str) {
        tracing::error!(
            target: "spark_shadow::failure",
            category = category.as_str(),
            "{message}"
        );
    }
}
