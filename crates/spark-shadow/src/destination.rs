//! 目的地句柄、遍历协议与目的地注册表。
//!
//! # 设计初衷（Why）
//! - 路由树是目的地句柄的规范持有者；影子节点只在装配时按标识解析出共享句柄，
//!   目的地不回指节点，因此不存在所有权环；
//! - 遍历协议允许外部工具（配置校验、统计分类、演练）枚举可达目的地，而不发出任何请求。
//!
//! # 契约说明（What）
//! - [`Destination::route`] 是挂起点，返回 [`DestinationResult`]；
//! - [`Destination::traverse`] 默认是叶子：没有子节点可遍历；组合节点（如影子节点）需覆写；
//! - [`DestinationRegistry`] 以连续下标分配 [`DestinationId`]，解析失败返回 `None`。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use async_trait::async_trait;

use crate::context::RouteContext;
use crate::error::{DestinationResult, ShadowError};

/// 可路由的目的地。
///
/// # 契约说明（What）
/// - **线程安全**：实现需 `Send + Sync + 'static`，句柄以 `Arc` 形式在请求任务与影子任务间共享；
/// - **取消语义**：调用方丢弃 `route` 返回的 future 即视为放弃该调用，实现不得因此破坏内部状态。
#[async_trait]
pub trait Destination<Req, Rep>: Send + Sync + 'static
where
    Req: Send + Sync + 'static,
    Rep: Send + 'static,
{
    /// 用于日志与遍历的名称。
    fn name(&self) -> &str;

    /// 发送请求并等待回复。
    async fn route(&self, ctx: &RouteContext, request: &Req) -> DestinationResult<Rep>;

    /// 将访问者递交给子节点；叶子目的地无需覆写。
    fn traverse(
        &self,
        _ctx: &RouteContext,
        _request: &Req,
        _visitor: &dyn RouteVisitor<Req, Rep>,
    ) {
    }
}

/// 共享的目的地句柄。
pub type DestinationHandle<Req, Rep> = Arc<dyn Destination<Req, Rep>>;

/// 遍历访问者。
///
/// 组合节点对每个子目的地调用一次 [`RouteVisitor::visit`]；是否继续向下递归由访问者决定，
/// 通常做法是在 `visit` 内调用 `destination.traverse(ctx, request, self)`。
pub trait RouteVisitor<Req, Rep>
where
    Req: Send + Sync + 'static,
    Rep: Send + 'static,
{
    fn visit(&self, ctx: &RouteContext, destination: &dyn Destination<Req, Rep>, request: &Req);
}

/// 注册表内的目的地标识。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DestinationId(u32);

impl DestinationId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DestinationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 目的地句柄的规范持有者（arena）。
///
/// - **意图 (Why)**：把“谁拥有目的地”集中到路由树一侧，节点只在装配时解析标识；
/// - **契约 (What)**：标识按注册顺序递增分配，注册后不可删除，保证已分配标识长期有效。
pub struct DestinationRegistry<Req, Rep>
where
    Req: Send + Sync + 'static,
    Rep: Send + 'static,
{
    slots: Vec<DestinationHandle<Req, Rep>>,
}

impl<Req, Rep> DestinationRegistry<Req, Rep>
where
    Req: Send + Sync + 'static,
    Rep: Send + 'static,
{
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// 登记目的地并返回其标识。
    ///
    /// 标识空间耗尽时返回 [`ShadowError::RegistryFull`]，注册表保持不变。
    pub fn register(
        &mut self,
        destination: DestinationHandle<Req, Rep>,
    ) -> Result<DestinationId, ShadowError> {
        let id = next_id(self.slots.len())?;
        self.slots.push(destination);
        Ok(id)
    }

    /// 解析标识；未知标识返回 `None`。
    pub fn resolve(&self, id: DestinationId) -> Option<DestinationHandle<Req, Rep>> {
        self.slots.get(id.0 as usize).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn next_id(len: usize) -> Result<DestinationId, ShadowError> {
    u32::try_from(len)
        .map(DestinationId)
        .map_err(|_| ShadowError::RegistryFull { len })
}

impl<Req, Rep> Default for DestinationRegistry<Req, Rep>
where
    Req: Send + Sync + 'static,
    Rep: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Rep> fmt::Debug for DestinationRegistry<Req, Rep>
where
    Req: Send + Sync + 'static,
    Rep: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|slot| slot.name()))
            .finish()
    }
}
