//! 影子路由的测试桩集合。
//!
//! # 设计定位（Why）
//! - 单元测试、集成测试与基准都需要一组可观测的请求、回复、目的地与任务提交器；
//!   集中定义可以避免在各测试文件里重复实现 `Destination` 与 `ShadowSpawner`；
//! - 接口演进时只需在此处同步更新。
//!
//! # 契约说明（What）
//! - 所有桩对象只在内存中记录调用，不做 IO；
//! - [`QueuedSpawner`] 不会自行执行任务，测试通过 [`QueuedSpawner::run_all`] 显式驱动，
//!   从而能断言“分发时尚未执行”这类时序。

use alloc::collections::VecDeque;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::context::{RequestClass, RouteContext};
use crate::destination::{Destination, RouteVisitor};
use crate::dispatch::ShadowSpawner;
use crate::error::DestinationResult;
use crate::failure::{FailureCategory, FailureReporter};
use crate::request::{RequestKind, ShadowableRequest};

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// 32 位 FNV-1a，桩请求默认以此计算路由键哈希。
pub fn routing_hash(key: &[u8]) -> u32 {
    key.iter().fold(FNV32_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV32_PRIME)
    })
}

/// 内存中的缓存请求。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheRequest {
    kind: RequestKind,
    key: Bytes,
    hash: u32,
    value: Option<Bytes>,
}

impl CacheRequest {
    /// 以 [`routing_hash`] 计算哈希。
    pub fn new(kind: RequestKind, key: &str) -> Self {
        let hash = routing_hash(key.as_bytes());
        Self::with_hash(kind, key, hash)
    }

    /// 指定哈希，便于精确命中区间边界。
    pub fn with_hash(kind: RequestKind, key: &str, hash: u32) -> Self {
        Self {
            kind,
            key: Bytes::copy_from_slice(key.as_bytes()),
            hash,
            value: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: &str) -> Self {
        self.value = Some(Bytes::copy_from_slice(value.as_bytes()));
        self
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }
}

impl ShadowableRequest for CacheRequest {
    fn routing_key(&self) -> &[u8] {
        &self.key
    }

    fn routing_key_hash(&self) -> u32 {
        self.hash
    }

    fn kind(&self) -> RequestKind {
        self.kind
    }
}

/// 内存中的缓存回复。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheReply {
    Hit(Bytes),
    Miss,
    Stored,
}

impl CacheReply {
    pub fn hit(value: &str) -> Self {
        CacheReply::Hit(Bytes::copy_from_slice(value.as_bytes()))
    }

    pub fn miss() -> Self {
        CacheReply::Miss
    }

    pub fn stored() -> Self {
        CacheReply::Stored
    }
}

/// 记录全部上报事件的 [`FailureReporter`]。
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<(FailureCategory, String)>>,
}

impl RecordingReporter {
    pub fn events(&self) -> Vec<(FailureCategory, String)> {
        self.events.lock().clone()
    }

    pub fn count(&self, category: FailureCategory) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(seen, _)| *seen == category)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl FailureReporter for RecordingReporter {
    fn report(&self, category: FailureCategory, message: &str) {
        self.events.lock().push((category, message.to_string()));
    }
}

/// 按脚本回复的目的地，记录每次调用的请求类别与请求内容。
///
/// - 默认回复 `Ok(CacheReply::Miss)`；
/// - [`Self::hanging`] 使调用在记录之后永不完成，用于验证主回复不等待影子任务。
#[derive(Debug)]
pub struct ScriptedDestination {
    name: String,
    reply: DestinationResult<CacheReply>,
    hang: bool,
    log: Mutex<Vec<(RequestClass, CacheRequest)>>,
}

impl ScriptedDestination {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reply: Ok(CacheReply::Miss),
            hang: false,
            log: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn replying(mut self, reply: CacheReply) -> Self {
        self.reply = Ok(reply);
        self
    }

    #[must_use]
    pub fn failing(mut self, error: crate::error::DestinationError) -> Self {
        self.reply = Err(error);
        self
    }

    #[must_use]
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// 已开始的调用次数。
    pub fn calls(&self) -> usize {
        self.log.lock().len()
    }

    /// 每次调用时上下文携带的请求类别。
    pub fn contexts(&self) -> Vec<RequestClass> {
        self.log.lock().iter().map(|(class, _)| *class).collect()
    }

    /// 每次调用收到的请求。
    pub fn requests(&self) -> Vec<CacheRequest> {
        self.log.lock().iter().map(|(_, req)| req.clone()).collect()
    }
}

#[async_trait]
impl Destination<CacheRequest, CacheReply> for ScriptedDestination {
    fn name(&self) -> &str {
        &self.name
    }

    async fn route(
        &self,
        ctx: &RouteContext,
        request: &CacheRequest,
    ) -> DestinationResult<CacheReply> {
        self.log.lock().push((ctx.request_class(), request.clone()));
        if self.hang {
            futures::future::pending::<()>().await;
        }
        self.reply.clone()
    }
}

/// 手动驱动的任务提交器：提交时只入队，由测试决定何时执行。
#[derive(Default)]
pub struct QueuedSpawner {
    queue: Mutex<VecDeque<BoxFuture<'static, ()>>>,
    rejecting: bool,
}

impl QueuedSpawner {
    /// 拒绝全部任务，模拟运行时不可用。
    pub fn rejecting() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            rejecting: true,
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// 按提交顺序依次执行全部排队任务，直到队列为空。
    pub async fn run_all(&self) {
        loop {
            let next = self.queue.lock().pop_front();
            match next {
                Some(task) => task.await,
                None => break,
            }
        }
    }
}

impl ShadowSpawner for QueuedSpawner {
    fn spawn(&self, task: BoxFuture<'static, ()>) -> bool {
        if self.rejecting {
            return false;
        }
        self.queue.lock().push_back(task);
        true
    }
}

impl core::fmt::Debug for QueuedSpawner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueuedSpawner")
            .field("pending", &self.pending())
            .field("rejecting", &self.rejecting)
            .finish()
    }
}

/// 记录访问顺序的遍历访问者。
///
/// `recursive` 模式下在每次访问后继续调用 `destination.traverse`，从而走完整棵路由树。
#[derive(Debug, Default)]
pub struct RecordingVisitor {
    recursive: bool,
    visits: Mutex<Vec<(String, RequestClass)>>,
}

impl RecordingVisitor {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            visits: Mutex::new(Vec::new()),
        }
    }

    /// `(目的地名称, 访问时的请求类别)`，按访问顺序排列。
    pub fn visits(&self) -> Vec<(String, RequestClass)> {
        self.visits.lock().clone()
    }
}

impl<Req, Rep> RouteVisitor<Req, Rep> for RecordingVisitor
where
    Req: Send + Sync + 'static,
    Rep: Send + 'static,
{
    fn visit(&self, ctx: &RouteContext, destination: &dyn Destination<Req, Rep>, request: &Req) {
        self.visits
            .lock()
            .push((destination.name().to_string(), ctx.request_class()));
        if self.recursive {
            destination.traverse(ctx, request, self);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a_matches_reference_vectors() {
        assert_eq!(routing_hash(b""), 0x811c_9dc5);
        assert_eq!(routing_hash(b"a"), 0xe40c_292c);
        assert_eq!(routing_hash(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn cache_request_exposes_key_value_and_hash() {
        let request = CacheRequest::new(RequestKind::Set, "user:1").with_value("v1");
        assert_eq!(request.key(), b"user:1");
        assert_eq!(request.value(), Some(&b"v1"[..]));
        assert_eq!(request.routing_key(), request.key());
        assert_eq!(request.routing_key_hash(), routing_hash(b"user:1"));
        assert_eq!(CacheRequest::new(RequestKind::Get, "k").value(), None);
    }
}
