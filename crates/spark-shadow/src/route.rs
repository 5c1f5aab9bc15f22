//! 影子路由节点。
//!
//! # 设计初衷（Why）
//! - 总是把请求发往主目的地；同时，对每个影子条目，若其设置选中了请求的路由键，
//!   就异步地把（可能经过整形的）请求副本发往影子目的地；
//! - 影子范围可在运行时调整，一个主目的地可对应多个影子目的地；
//! - 任何影子配置错误都退化为“不影子”，绝不能拖垮主路径。
//!
//! # 关键逻辑（How）
//! - [`ShadowRoute::route`] 按构造顺序遍历影子条目，惰性地调用一次
//!   [`ShadowPolicy::adjust_request`]，必要时提前取得主回复，再把影子请求交给
//!   [`ShadowDispatcher`]；每个请求恰好调用主目的地一次；
//! - [`ShadowRoute::traverse`] 是纯结构遍历：不整形、不判定资格、不发请求。
//!
//! # 契约说明（What）
//! - 节点构造后不可变：主目的地、影子条目与策略在生命周期内固定，读路径无需加锁；
//! - 唯一会被外部修改的资源是各条目的 [`ShadowSettingsHandle`]，每次判定只读一份快照。

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use async_trait::async_trait;

use crate::context::{RequestClass, RouteContext};
use crate::destination::{
    Destination, DestinationHandle, DestinationId, DestinationRegistry, RouteVisitor,
};
use crate::dispatch::ShadowDispatcher;
use crate::error::{DestinationResult, ShadowError};
use crate::failure::FailureCategory;
use crate::policy::{DefaultShadowPolicy, ShadowPolicy};
use crate::request::ShadowableRequest;
use crate::settings::ShadowSettingsHandle;

const NULL_DESTINATION_MESSAGE: &str = "ShadowRoute: shadow entry has no destination handle";

/// 一个影子条目：影子目的地 + 设置句柄。
///
/// `destination` 为 `None` 表示退化条目：合法但无法发送，命中时上报配置错误并跳过。
pub struct ShadowEntry<Req, Rep>
where
    Req: Send + Sync + 'static,
    Rep: Send + 'static,
{
    destination: Option<DestinationHandle<Req, Rep>>,
    settings: ShadowSettingsHandle,
}

impl<Req, Rep> ShadowEntry<Req, Rep>
where
    Req: Send + Sync + 'static,
    Rep: Send + 'static,
{
    pub fn new(destination: DestinationHandle<Req, Rep>, settings: ShadowSettingsHandle) -> Self {
        Self {
            destination: Some(destination),
            settings,
        }
    }

    /// 构造没有目的地句柄的退化条目。
    pub fn detached(settings: ShadowSettingsHandle) -> Self {
        Self {
            destination: None,
            settings,
        }
    }

    pub fn destination(&self) -> Option<&DestinationHandle<Req, Rep>> {
        self.destination.as_ref()
    }

    pub fn settings(&self) -> &ShadowSettingsHandle {
        &self.settings
    }
}

impl<Req, Rep> Clone for ShadowEntry<Req, Rep>
where
    Req: Send + Sync + 'static,
    Rep: Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            destination: self.destination.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<Req, Rep> fmt::Debug for ShadowEntry<Req, Rep>
where
    Req: Send + Sync + 'static,
    Rep: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowEntry")
            .field("destination", &self.destination.as_ref().map(|d| d.name()))
            .field("settings", &self.settings.snapshot())
            .finish()
    }
}

/// 影子路由节点。
///
/// # 教案式说明
/// - **意图 (Why)**：在不改变调用方所见结果的前提下，用真实流量验证新后端或新配置；
/// - **契约 (What)**：
///   - `route` 返回的永远是主目的地的结果，主目的地失败原样返回；
///   - 除非策略要求延迟，主回复不会等待任何影子任务；
///   - 节点本身实现 [`Destination`]，可以嵌入更大的路由树；
/// - **风险 (Trade-offs)**：延迟策略下，同一次调用内的全部影子条目共享同一份调整后请求与主回复；
///   若将来出现依赖“逐条目状态”的整形需求，需要在策略层显式处理。
pub struct ShadowRoute<Req, Rep, P = DefaultShadowPolicy>
where
    Req: ShadowableRequest,
    Rep: Send + 'static,
    P: ShadowPolicy<Req, Rep>,
{
    name: String,
    primary: DestinationHandle<Req, Rep>,
    shadows: Box<[ShadowEntry<Req, Rep>]>,
    policy: P,
    dispatcher: ShadowDispatcher,
}

impl<Req, Rep, P> ShadowRoute<Req, Rep, P>
where
    Req: ShadowableRequest,
    Rep: Send + 'static,
    P: ShadowPolicy<Req, Rep>,
{
    /// 路由类型名。
    pub const ROUTE_NAME: &'static str = "shadow";

    pub fn new(
        primary: DestinationHandle<Req, Rep>,
        shadows: Vec<ShadowEntry<Req, Rep>>,
        policy: P,
        dispatcher: ShadowDispatcher,
    ) -> Self {
        let name = format!("{}|{}", Self::ROUTE_NAME, primary.name());
        Self {
            name,
            primary,
            shadows: shadows.into_boxed_slice(),
            policy,
            dispatcher,
        }
    }

    pub fn primary(&self) -> &DestinationHandle<Req, Rep> {
        &self.primary
    }

    pub fn shadows(&self) -> &[ShadowEntry<Req, Rep>] {
        &self.shadows
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// 路由一个请求。
    ///
    /// # 执行逻辑（How）
    /// 1. 按构造顺序评估每个条目：读一份设置快照判定资格；命中但目的地为空时上报并跳过；
    /// 2. 第一个命中条目触发一次 `adjust_request`，结果复用于主路由与全部影子；
    /// 3. 策略要求延迟且尚无主回复时，立即路由主目的地并保存回复；
    /// 4. 构造影子请求，主回复存在时同时构造观察者，交给分发器后继续下一条目；
    /// 5. 返回第 3 步保存的主回复，或此时再路由主目的地（用调整后请求，若有）。
    pub async fn route(&self, ctx: &RouteContext, request: &Req) -> DestinationResult<Rep> {
        let mut adjusted: Option<Arc<Req>> = None;
        let mut primary_reply: Option<DestinationResult<Rep>> = None;

        for entry in self.shadows.iter() {
            if !entry.settings.should_shadow(request, ctx.reporter()) {
                continue;
            }
            let Some(shadow) = entry.destination.as_ref() else {
                ctx.reporter()
                    .report(FailureCategory::InvalidConfig, NULL_DESTINATION_MESSAGE);
                continue;
            };

            let adjusted_request = adjusted
                .get_or_insert_with(|| self.policy.adjust_request(request))
                .clone();

            if primary_reply.is_none() && self.policy.should_delay_shadow(request.kind()) {
                primary_reply = Some(self.primary.route(ctx, &adjusted_request).await);
            }

            let shadow_request = self.policy.make_shadow_request(&adjusted_request);
            let post_reply_fn = primary_reply
                .as_ref()
                .and_then(|reply| self.policy.make_post_shadow_reply_fn(reply));

            tracing::trace!(
                target: "spark_shadow::route",
                route = %self.name,
                shadow = shadow.name(),
                kind = request.kind().as_str(),
                delayed = primary_reply.is_some(),
                "dispatching shadow request"
            );
            self.dispatcher
                .dispatch(ctx, Arc::clone(shadow), shadow_request, post_reply_fn);
        }

        match primary_reply {
            Some(reply) => reply,
            None => {
                let request = adjusted.as_deref().unwrap_or(request);
                self.primary.route(ctx, request).await
            }
        }
    }

    /// 结构遍历：先访问主目的地，再在影子类别上下文中访问每个影子目的地。
    ///
    /// 不读取任何设置，也不发请求；影子标记只存在于本次调用派生出的上下文中。
    pub fn traverse(
        &self,
        ctx: &RouteContext,
        request: &Req,
        visitor: &dyn RouteVisitor<Req, Rep>,
    ) {
        visitor.visit(ctx, self.primary.as_ref(), request);

        let shadow_ctx = ctx.with_request_class(RequestClass::SHADOW);
        for entry in self.shadows.iter() {
            match entry.destination.as_ref() {
                Some(shadow) => visitor.visit(&shadow_ctx, shadow.as_ref(), request),
                None => ctx
                    .reporter()
                    .report(FailureCategory::InvalidConfig, NULL_DESTINATION_MESSAGE),
            }
        }
    }
}

#[async_trait]
impl<Req, Rep, P> Destination<Req, Rep> for ShadowRoute<Req, Rep, P>
where
    Req: ShadowableRequest,
    Rep: Send + 'static,
    P: ShadowPolicy<Req, Rep>,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn route(&self, ctx: &RouteContext, request: &Req) -> DestinationResult<Rep> {
        ShadowRoute::route(self, ctx, request).await
    }

    fn traverse(&self, ctx: &RouteContext, request: &Req, visitor: &dyn RouteVisitor<Req, Rep>) {
        ShadowRoute::traverse(self, ctx, request, visitor);
    }
}

impl<Req, Rep, P> fmt::Debug for ShadowRoute<Req, Rep, P>
where
    Req: ShadowableRequest,
    Rep: Send + 'static,
    P: ShadowPolicy<Req, Rep> + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShadowRoute")
            .field("name", &self.name)
            .field("shadows", &self.shadows)
            .field("policy", &self.policy)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// 为每个普通子节点各包一层影子路由，全部共享同一组影子条目。
///
/// 典型用法：把一个连接池的每个成员都影子到同一个新池。
pub fn make_shadow_routes<Req, Rep, P>(
    children: Vec<DestinationHandle<Req, Rep>>,
    shadows: &[ShadowEntry<Req, Rep>],
    policy: P,
    dispatcher: ShadowDispatcher,
) -> Vec<DestinationHandle<Req, Rep>>
where
    Req: ShadowableRequest,
    Rep: Send + 'static,
    P: ShadowPolicy<Req, Rep> + Clone,
{
    children
        .into_iter()
        .map(|child| {
            let route =
                ShadowRoute::new(child, shadows.to_vec(), policy.clone(), dispatcher.clone());
            Arc::new(route) as DestinationHandle<Req, Rep>
        })
        .collect()
}

/// 基于 [`DestinationRegistry`] 装配影子路由。
///
/// # 契约说明（What）
/// - 主目的地标识未知：[`Self::build`] 返回 [`ShadowError::UnknownPrimary`]；
/// - 影子目的地标识未知：装配为退化条目，在请求路径上报而不阻断装配。
pub struct ShadowRouteBuilder<'a, Req, Rep, P = DefaultShadowPolicy>
where
    Req: ShadowableRequest,
    Rep: Send + 'static,
    P: ShadowPolicy<Req, Rep>,
{
    registry: &'a DestinationRegistry<Req, Rep>,
    primary: DestinationId,
    shadows: Vec<(DestinationId, ShadowSettingsHandle)>,
    policy: P,
    dispatcher: ShadowDispatcher,
}

impl<'a, Req, Rep> ShadowRouteBuilder<'a, Req, Rep, DefaultShadowPolicy>
where
    Req: ShadowableRequest,
    Rep: Send + 'static,
{
    pub fn new(registry: &'a DestinationRegistry<Req, Rep>, primary: DestinationId) -> Self {
        Self {
            registry,
            primary,
            shadows: Vec::new(),
            policy: DefaultShadowPolicy,
            dispatcher: ShadowDispatcher::default(),
        }
    }
}

impl<'a, Req, Rep, P> ShadowRouteBuilder<'a, Req, Rep, P>
where
    Req: ShadowableRequest,
    Rep: Send + 'static,
    P: ShadowPolicy<Req, Rep>,
{
    /// 追加一个影子条目；条目顺序即判定顺序。
    #[must_use]
    pub fn shadow(mut self, destination: DestinationId, settings: ShadowSettingsHandle) -> Self {
        self.shadows.push((destination, settings));
        self
    }

    /// 替换策略。
    pub fn policy<Q>(self, policy: Q) -> ShadowRouteBuilder<'a, Req, Rep, Q>
    where
        Q: ShadowPolicy<Req, Rep>,
    {
        ShadowRouteBuilder {
            registry: self.registry,
            primary: self.primary,
            shadows: self.shadows,
            policy,
            dispatcher: self.dispatcher,
        }
    }

    #[must_use]
    pub fn dispatcher(mut self, dispatcher: ShadowDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn build(self) -> Result<ShadowRoute<Req, Rep, P>, ShadowError> {
        let registry = self.registry;
        let primary = registry
            .resolve(self.primary)
            .ok_or(ShadowError::UnknownPrimary { id: self.primary })?;

        let shadows = self
            .shadows
            .into_iter()
            .map(|(id, settings)| match registry.resolve(id) {
                Some(destination) => ShadowEntry::new(destination, settings),
                None => {
                    tracing::warn!(
                        target: "spark_shadow::route",
                        shadow = %id,
                        "shadow destination is not registered, entry will be skipped"
                    );
                    ShadowEntry::detached(settings)
                }
            })
            .collect();

        Ok(ShadowRoute::new(primary, shadows, self.policy, self.dispatcher))
    }
}
