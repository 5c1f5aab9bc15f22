#![deny(unsafe_code)]
#![doc = "spark-shadow: 缓存代理路由层的影子流量节点。"]
#![doc = ""]
#![doc = "影子节点总是把请求发往主目的地并返回主目的地的结果；同时，按每个影子条目的可热更新设置，"]
#![doc = "把被选中请求的副本异步发往影子目的地，用真实负载演练新后端或新配置，而不改变调用方所见结果。"]
#![doc = ""]
#![doc = "== 模块分层 =="]
#![doc = "1. `settings`/`config`: 影子范围的表示、判定与配置换算；"]
#![doc = "2. `policy`: 请求整形、回复顺序与影子回复观察；"]
#![doc = "3. `dispatch`: 即发即忘的任务提交；"]
#![doc = "4. `route`: 路由节点本身、批量包装与基于注册表的装配。"]

extern crate alloc;

pub mod config;
pub mod context;
pub mod destination;
pub mod dispatch;
pub mod error;
pub mod failure;
pub mod policy;
pub mod request;
pub mod route;
pub mod settings;
/// 测试桩命名空间：内存请求/回复类型、记录型上报器、脚本化目的地与手动驱动的任务提交器。
///
/// # 使用方式（How）
/// - 单元测试、集成测试与基准通过 `use spark_shadow::test_stubs::*;` 复用同一组桩对象；
/// - 桩对象只在内存中记录调用，不触发任何网络 IO。
pub mod test_stubs;

pub use async_trait::async_trait;
pub use config::ShadowSettingsConfig;
pub use context::{RequestClass, RouteContext};
pub use destination::{
    Destination, DestinationHandle, DestinationId, DestinationRegistry, RouteVisitor,
};
pub use dispatch::{ShadowDispatcher, ShadowSpawner, TokioSpawner};
pub use error::{DestinationError, DestinationResult, ShadowError};
pub use failure::{FailureCategory, FailureReporter, TracingFailureReporter};
pub use policy::{
    DefaultShadowPolicy, PostShadowReplyFn, ReplyValidatingPolicy, ShadowPolicy, ValidationStats,
};
pub use request::{RequestKind, ShadowableRequest};
pub use route::{ShadowEntry, ShadowRoute, ShadowRouteBuilder, make_shadow_routes};
pub use settings::{
    FULL_KEY_RANGE, ShadowSettings, ShadowSettingsHandle, compare_shadow_keys, should_shadow,
};
