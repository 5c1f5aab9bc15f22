//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 区分两类错误域：构造期错误 [`ShadowError`] 与路由结果错误 [`DestinationError`]；
//! - 影子判定热路径上**不存在**致命错误：配置异常只经由 [`FailureReporter`](crate::FailureReporter)
//!   上报并降级为“不影子”，因此本模块的错误只出现在节点装配阶段或目的地返回值中。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，兼容 `std::error::Error`；
//! - 每个变体提供稳定的 `code()`，遵循 `<域>.<语义>` 命名，便于日志与告警聚合。

use alloc::string::String;

use thiserror::Error;

use crate::destination::DestinationId;

/// 目的地路由结果的统一别名。
pub type DestinationResult<T> = Result<T, DestinationError>;

/// 影子节点在装配或配置校验阶段可能出现的错误。
///
/// # 教案式说明
/// - **意图 (Why)**：让配置协作者在把节点挂入路由树之前就发现不一致，而不是等到请求路径上才暴露；
/// - **契约 (What)**：所有变体都携带触发错误的原始取值，`code()` 返回稳定错误码；
/// - **风险 (Trade-offs)**：影子目的地缺失**不会**在此报错，而是装配为退化条目并在请求路径上报，
///   以保证“影子配置错误永远不会阻断主路由”。
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ShadowError {
    /// 注册表中找不到主目的地。
    #[error("primary destination {id} is not registered")]
    UnknownPrimary { id: DestinationId },

    /// 键分数区间非法：端点不在 `[0, 1]`、为 NaN，或起点大于终点。
    #[error("invalid key fraction range [{start}, {end}]")]
    InvalidKeyFractionRange { start: f64, end: f64 },

    /// 哈希区间起点大于终点。
    #[error("invalid key range [{lo}, {hi}]: lower bound exceeds upper bound")]
    InvalidKeyRange { lo: u32, hi: u32 },

    /// 目的地注册表的标识空间已耗尽。
    #[error("destination registry is full: {len} destinations already registered")]
    RegistryFull { len: usize },

    /// 同一份配置同时声明了分数区间与哈希区间。
    #[error("key_fraction_range and key_range are mutually exclusive")]
    ConflictingRanges,
}

impl ShadowError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ShadowError::UnknownPrimary { .. } => "shadow.build.unknown_primary",
            ShadowError::RegistryFull { .. } => "shadow.build.registry_full",
            ShadowError::InvalidKeyFractionRange { .. } => "shadow.config.invalid_fraction_range",
            ShadowError::InvalidKeyRange { .. } => "shadow.config.invalid_key_range",
            ShadowError::ConflictingRanges => "shadow.config.conflicting_ranges",
        }
    }
}

/// 目的地路由失败的原因。
///
/// - **意图 (Why)**：主路由失败需原样返回调用方；影子路由失败则仅交给观察者或日志；
/// - **契约 (What)**：实现 `Clone + PartialEq`，便于回复校验策略直接比较主/影子结果；
/// - **边界**：超时既可能来自目的地自身，也可能来自 [`ShadowDispatcher`](crate::ShadowDispatcher)
///   为影子调用设置的独立超时。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DestinationError {
    /// 调用超时。
    #[error("destination timed out")]
    Timeout,

    /// 传输层失败，例如连接被重置。
    #[error("transport failure: {0}")]
    Transport(String),

    /// 远端返回错误回复。
    #[error("remote error: {0}")]
    Remote(String),

    /// 目的地暂不可用（熔断、下线等）。
    #[error("destination `{destination}` is unavailable")]
    Unavailable { destination: String },
}

impl DestinationError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            DestinationError::Timeout => "shadow.destination.timeout",
            DestinationError::Transport(_) => "shadow.destination.transport",
            DestinationError::Remote(_) => "shadow.destination.remote",
            DestinationError::Unavailable { .. } => "shadow.destination.unavailable",
        }
    }
}
