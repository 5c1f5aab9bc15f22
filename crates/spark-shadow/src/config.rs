//! 影子设置的类型化配置载体。
//!
//! # 设计定位（Why）
//! - 配置协作者从自身的存储（运行时变量、配置中心）拿到的是松散字段，需要在交给判定逻辑之前
//!   完成校验与换算：分数区间映射到哈希空间、显式键列表计算哈希并排序；
//! - 本模块只负责“字段 → [`ShadowSettings`]”这一步，不解析路由树，也不关心字段从哪里来。
//!
//! # 契约说明（What）
//! - `key_fraction_range` 与 `key_range` 互斥；两者都缺省时不影子任何请求；
//! - `keys_to_shadow` 非空时切换为显式键列表模式，区间字段仍会被校验但不参与判定；
//! - 哈希函数由调用方提供，必须与协议层计算 `routing_key_hash` 的函数一致。

use alloc::string::String;
use alloc::vec::Vec;

use bytes::Bytes;
use serde::Deserialize;

use crate::error::ShadowError;
use crate::settings::ShadowSettings;

/// 影子设置的反序列化形态。
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ShadowSettingsConfig {
    /// `[start, end]`，取值 `0.0..=1.0`。
    #[serde(default)]
    pub key_fraction_range: Option<[f64; 2]>,
    /// `[lo, hi]` 闭区间哈希范围。
    #[serde(default)]
    pub key_range: Option<[u32; 2]>,
    /// 需要影子的完整路由键列表。
    #[serde(default)]
    pub keys_to_shadow: Vec<String>,
}

impl ShadowSettingsConfig {
    /// 校验并换算为 [`ShadowSettings`]。
    ///
    /// `hasher` 以路由键字节为输入，返回与请求侧一致的 32 位哈希。
    pub fn build<H>(&self, hasher: H) -> Result<ShadowSettings, ShadowError>
    where
        H: Fn(&[u8]) -> u32,
    {
        let settings = match (self.key_fraction_range, self.key_range) {
            (Some(_), Some(_)) => return Err(ShadowError::ConflictingRanges),
            (Some([start, end]), None) => ShadowSettings::from_key_fraction_range(start, end)?,
            (None, Some([lo, hi])) => {
                if lo > hi {
                    return Err(ShadowError::InvalidKeyRange { lo, hi });
                }
                ShadowSettings::with_key_range(lo, hi)
            }
            (None, None) => ShadowSettings::disabled(),
        };

        if self.keys_to_shadow.is_empty() {
            return Ok(settings);
        }
        let keys = self.keys_to_shadow.iter().map(|key| {
            let bytes = Bytes::copy_from_slice(key.as_bytes());
            (hasher(&bytes), bytes)
        });
        Ok(settings.with_keys_to_shadow(keys))
    }
}
