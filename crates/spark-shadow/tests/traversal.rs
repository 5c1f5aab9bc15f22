//! 路由树结构遍历。
//!
//! - **Why**：配置校验与流量分类工具依赖遍历枚举全部可达目的地，且不能产生任何请求；
//! - **What**：主目的地恰好访问一次且不带影子标记；每个影子目的地恰好访问一次且带影子标记，
//!   与其设置是否选中请求无关；遍历结束后调用方上下文不残留影子标记。

use std::sync::Arc;

use spark_shadow::test_stubs::{
    CacheReply, CacheRequest, RecordingReporter, RecordingVisitor, ScriptedDestination,
};
use spark_shadow::{
    DefaultShadowPolicy, Destination, DestinationHandle, FailureCategory, RequestClass,
    RequestKind, RouteContext, ShadowDispatcher, ShadowEntry, ShadowRoute, ShadowSettings,
    ShadowSettingsHandle,
};

fn handle(destination: &Arc<ScriptedDestination>) -> DestinationHandle<CacheRequest, CacheReply> {
    destination.clone()
}

fn entry(
    destination: DestinationHandle<CacheRequest, CacheReply>,
    settings: ShadowSettings,
) -> ShadowEntry<CacheRequest, CacheReply> {
    ShadowEntry::new(destination, ShadowSettingsHandle::new(settings))
}

fn visited(visitor: &RecordingVisitor) -> Vec<(String, bool)> {
    visitor
        .visits()
        .into_iter()
        .map(|(name, class)| (name, class.contains(RequestClass::SHADOW)))
        .collect()
}

#[test]
fn visits_primary_then_every_shadow_without_routing() {
    let primary = Arc::new(ScriptedDestination::new("pool-a"));
    let selected = Arc::new(ScriptedDestination::new("pool-b"));
    let unselected = Arc::new(ScriptedDestination::new("pool-c"));
    let route = ShadowRoute::new(
        handle(&primary),
        vec![
            entry(handle(&selected), ShadowSettings::with_key_range(0, u32::MAX)),
            entry(handle(&unselected), ShadowSettings::disabled()),
        ],
        DefaultShadowPolicy,
        ShadowDispatcher::tokio(),
    );

    let ctx = RouteContext::new();
    let visitor = RecordingVisitor::default();
    route.traverse(&ctx, &CacheRequest::new(RequestKind::Get, "k"), &visitor);

    assert_eq!(
        visited(&visitor),
        vec![
            ("pool-a".to_owned(), false),
            ("pool-b".to_owned(), true),
            ("pool-c".to_owned(), true),
        ]
    );
    assert_eq!(primary.calls() + selected.calls() + unselected.calls(), 0);
    assert!(!ctx.is_shadow(), "影子标记不应泄漏到调用方上下文");
}

#[test]
fn nested_routes_are_walked_recursively() {
    let inner_primary = Arc::new(ScriptedDestination::new("pool-a"));
    let inner_shadow = Arc::new(ScriptedDestination::new("pool-b"));
    let outer_shadow = Arc::new(ScriptedDestination::new("pool-c"));

    let inner: DestinationHandle<CacheRequest, CacheReply> = Arc::new(ShadowRoute::new(
        handle(&inner_primary),
        vec![entry(handle(&inner_shadow), ShadowSettings::disabled())],
        DefaultShadowPolicy,
        ShadowDispatcher::tokio(),
    ));
    let outer = ShadowRoute::new(
        Arc::clone(&inner),
        vec![entry(handle(&outer_shadow), ShadowSettings::disabled())],
        DefaultShadowPolicy,
        ShadowDispatcher::tokio(),
    );
    assert_eq!(outer.name(), "shadow|shadow|pool-a");

    let visitor = RecordingVisitor::recursive();
    outer.traverse(
        &RouteContext::new(),
        &CacheRequest::new(RequestKind::Set, "k"),
        &visitor,
    );

    assert_eq!(
        visited(&visitor),
        vec![
            ("shadow|pool-a".to_owned(), false),
            ("pool-a".to_owned(), false),
            ("pool-b".to_owned(), true),
            ("pool-c".to_owned(), true),
        ]
    );
}

#[test]
fn detached_shadow_is_reported_and_skipped_during_traversal() {
    let primary = Arc::new(ScriptedDestination::new("pool-a"));
    let reporter = Arc::new(RecordingReporter::default());
    let ctx = RouteContext::new().with_reporter(reporter.clone());
    let route = ShadowRoute::new(
        handle(&primary),
        vec![ShadowEntry::detached(ShadowSettingsHandle::empty())],
        DefaultShadowPolicy,
        ShadowDispatcher::tokio(),
    );

    let visitor = RecordingVisitor::default();
    route.traverse(&ctx, &CacheRequest::new(RequestKind::Get, "k"), &visitor);

    assert_eq!(visited(&visitor), vec![("pool-a".to_owned(), false)]);
    assert_eq!(reporter.count(FailureCategory::InvalidConfig), 1);
}
