//! 影子设置与影子资格判定。
//!
//! # 设计初衷（Why）
//! - 影子范围需要在运行时调整（逐步扩大灰度、紧急关闭），但不能为此重建路由节点；
//! - 判定位于每个请求的热路径上，读侧必须无锁。
//!
//! # 关键逻辑（How）
//! - [`ShadowSettings`] 是不可变值，配置协作者只做整体替换；
//! - [`ShadowSettingsHandle`] 以 `ArcSwapOption` 持有当前快照：读侧一次 `load` 得到完整快照，
//!   写侧 `store`/`rcu` 原子替换，旧快照在最后一个读者释放后回收；
//! - 空槽位即“设置缺失”，判定时上报配置错误并返回 `false`。
//!
//! # 契约说明（What）
//! - `keys_to_shadow` 非空时优先于 `key_range`，两种选择方式不会叠加；
//! - 判定只读取一次快照，决策过程中不会重读，避免看到半更新的设置。

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cmp::Ordering;

use arc_swap::ArcSwapOption;
use bytes::Bytes;

use crate::error::ShadowError;
use crate::failure::{FailureCategory, FailureReporter};
use crate::request::ShadowableRequest;

/// 闭区间 `[lo, hi]`，覆盖全部 32 位哈希空间。
pub const FULL_KEY_RANGE: (u32, u32) = (0, u32::MAX);

/// 一份不可变的影子设置快照。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadowSettings {
    key_range: (u32, u32),
    keys_to_shadow: Vec<(u32, Bytes)>,
}

impl ShadowSettings {
    /// 以闭区间 `[lo, hi]` 构造。`lo > hi` 时区间为空，任何请求都不会命中。
    pub fn with_key_range(lo: u32, hi: u32) -> Self {
        Self {
            key_range: (lo, hi),
            keys_to_shadow: Vec::new(),
        }
    }

    /// 不影子任何请求的设置。
    pub fn disabled() -> Self {
        Self::with_key_range(1, 0)
    }

    /// 将 `[start, end]` 分数区间映射到哈希空间：`hash = fraction * u32::MAX`。
    ///
    /// - **前置条件**：`0 <= start <= end <= 1`，且均不为 NaN；
    /// - **返回值**：非法输入返回 [`ShadowError::InvalidKeyFractionRange`]。
    pub fn from_key_fraction_range(start: f64, end: f64) -> Result<Self, ShadowError> {
        let valid = (0.0..=1.0).contains(&start) && (0.0..=1.0).contains(&end) && start <= end;
        if !valid {
            return Err(ShadowError::InvalidKeyFractionRange { start, end });
        }
        let max = f64::from(u32::MAX);
        // `as` 对 [0, u32::MAX] 内的有限浮点数是截断转换，不会溢出。
        Ok(Self::with_key_range((start * max) as u32, (end * max) as u32))
    }

    /// 改为显式键列表模式。
    ///
    /// 这里负责排序与去重，调用发生在配置协作者一侧；判定路径只做二分查找，不再排序。
    #[must_use]
    pub fn with_keys_to_shadow<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = (u32, Bytes)>,
    {
        let mut keys: Vec<(u32, Bytes)> = keys.into_iter().collect();
        keys.sort_by(compare_shadow_keys);
        keys.dedup();
        self.keys_to_shadow = keys;
        self
    }

    pub fn key_range(&self) -> (u32, u32) {
        self.key_range
    }

    pub fn keys_to_shadow(&self) -> &[(u32, Bytes)] {
        &self.keys_to_shadow
    }

    /// 判定单个 `(hash, key)` 是否落在本设置的影子集合内。
    pub fn selects(&self, hash: u32, key: &[u8]) -> bool {
        if !self.keys_to_shadow.is_empty() {
            return self
                .keys_to_shadow
                .binary_search_by(|(entry_hash, entry_key)| {
                    entry_hash
                        .cmp(&hash)
                        .then_with(|| entry_key.as_ref().cmp(key))
                })
                .is_ok();
        }
        let (lo, hi) = self.key_range;
        lo <= hash && hash <= hi
    }
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self::disabled()
    }
}

/// 指向“当前”影子设置的共享句柄。
///
/// # 契约说明（What）
/// - 克隆句柄共享同一槽位：配置协作者持有一份用于更新，路由节点持有一份用于读取；
/// - [`Self::snapshot`] 返回的 `Arc` 永远不会被原地修改。
#[derive(Clone, Debug, Default)]
pub struct ShadowSettingsHandle {
    slot: Arc<ArcSwapOption<ShadowSettings>>,
}

impl ShadowSettingsHandle {
    pub fn new(settings: ShadowSettings) -> Self {
        Self {
            slot: Arc::new(ArcSwapOption::from_pointee(settings)),
        }
    }

    /// 构造空槽位；判定时会被视为“设置缺失”。
    pub fn empty() -> Self {
        Self::default()
    }

    /// 整体替换为新设置。
    pub fn store(&self, settings: ShadowSettings) {
        self.slot.store(Some(Arc::new(settings)));
    }

    /// 清空槽位。
    pub fn clear(&self) {
        self.slot.store(None);
    }

    /// 读-拷贝-更新：基于当前快照计算下一份设置并原子替换。
    ///
    /// `f` 在与其他写者竞争时可能被调用多次，应保持无副作用。
    pub fn update<F>(&self, f: F)
    where
        F: Fn(Option<&ShadowSettings>) -> ShadowSettings,
    {
        self.slot
            .rcu(|current| Some(Arc::new(f(current.as_deref()))));
    }

    /// 获取当前快照。
    pub fn snapshot(&self) -> Option<Arc<ShadowSettings>> {
        self.slot.load_full()
    }

    /// 以当前快照评估请求资格；快照只加载一次。
    pub fn should_shadow<R>(&self, request: &R, reporter: &dyn FailureReporter) -> bool
    where
        R: ShadowableRequest,
    {
        let guard = self.slot.load();
        should_shadow(request, guard.as_deref(), reporter)
    }
}

/// 影子资格判定。
///
/// # 执行逻辑（How）
/// 1. 设置缺失：上报 [`FailureCategory::InvalidConfig`] 并返回 `false`；
/// 2. 显式键列表非空：按 `(hash, key)` 字典序二分查找；
/// 3. 否则：`lo <= hash <= hi`，两端闭合。
///
/// 除第 1 步的上报外无副作用。
pub fn should_shadow<R>(
    request: &R,
    settings: Option<&ShadowSettings>,
    reporter: &dyn FailureReporter,
) -> bool
where
    R: ShadowableRequest,
{
    let Some(settings) = settings else {
        reporter.report(
            FailureCategory::InvalidConfig,
            "ShadowRoute: ShadowSettings is absent",
        );
        return false;
    };
    settings.selects(request.routing_key_hash(), request.routing_key())
}

/// 显式键列表条目的排序比较，与 [`ShadowSettings::selects`] 使用的顺序一致。
pub fn compare_shadow_keys(a: &(u32, Bytes), b: &(u32, Bytes)) -> Ordering {
    a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1))
}
