//! 影子判定所需的最小请求视图。
//!
//! 路由核心不关心请求的线协议形态，只需要三项信息：路由键、路由键哈希与请求类型。
//! 路由键哈希由协议层在解析时计算，核心只读取，不重新计算。

/// 请求类型，供策略决定是否“先取主回复再构造影子请求”。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RequestKind {
    Get,
    Gets,
    Metaget,
    Set,
    Add,
    Replace,
    Append,
    Prepend,
    Cas,
    Delete,
    Incr,
    Decr,
    Touch,
    Other,
}

impl RequestKind {
    /// 是否为只读请求。
    pub const fn is_read(&self) -> bool {
        matches!(self, RequestKind::Get | RequestKind::Gets | RequestKind::Metaget)
    }

    /// 稳定名称，用于日志字段。
    pub const fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Get => "get",
            RequestKind::Gets => "gets",
            RequestKind::Metaget => "metaget",
            RequestKind::Set => "set",
            RequestKind::Add => "add",
            RequestKind::Replace => "replace",
            RequestKind::Append => "append",
            RequestKind::Prepend => "prepend",
            RequestKind::Cas => "cas",
            RequestKind::Delete => "delete",
            RequestKind::Incr => "incr",
            RequestKind::Decr => "decr",
            RequestKind::Touch => "touch",
            RequestKind::Other => "other",
        }
    }
}

/// 可被影子路由处理的请求。
///
/// # 契约说明（What）
/// - `routing_key`：参与路由的键字节，可能是完整键的子串；
/// - `routing_key_hash`：对 `routing_key` 计算的 32 位哈希，同一请求多次调用必须返回相同值；
/// - `kind`：请求类型；
/// - `Clone`：默认策略通过克隆得到调整后的请求副本。
pub trait ShadowableRequest: Clone + Send + Sync + 'static {
    /// 路由键。
    fn routing_key(&self) -> &[u8];

    /// 路由键哈希。
    fn routing_key_hash(&self) -> u32;

    /// 请求类型。
    fn kind(&self) -> RequestKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_retrievals_are_reads() {
        assert!(RequestKind::Get.is_read());
        assert!(RequestKind::Gets.is_read());
        assert!(RequestKind::Metaget.is_read());
        for kind in [
            RequestKind::Set,
            RequestKind::Delete,
            RequestKind::Cas,
            RequestKind::Touch,
            RequestKind::Other,
        ] {
            assert!(!kind.is_read(), "{} 不应视为只读", kind.as_str());
        }
    }
}
