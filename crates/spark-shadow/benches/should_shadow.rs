use bytes::Bytes;
use criterion::{Criterion, black_box};
use spark_shadow::test_stubs::{CacheRequest, RecordingReporter, routing_hash};
use spark_shadow::{RequestKind, ShadowSettings, ShadowSettingsHandle};
use std::{env, time::Duration};

/// 影子判定热路径的基准：区间模式与显式键列表模式。
///
/// # 设计背景（Why）
/// - 判定在每个请求、每个影子条目上都会执行一次，必须保持“一次快照加载 + 常数或对数时间比较”；
/// - 键列表模式使用二分查找，列表规模增长时需要确认成本仍可接受。
///
/// # 逻辑解析（How）
/// - 区间模式：固定请求，反复经由句柄判定；
/// - 键列表模式：预置 1024 个键，命中列表中部的键。
fn bench_key_range(c: &mut Criterion) {
    let reporter = RecordingReporter::default();
    let handle = ShadowSettingsHandle::new(ShadowSettings::with_key_range(0, u32::MAX / 4));
    let request = CacheRequest::new(RequestKind::Get, "user:1024");

    c.bench_function("should_shadow/key_range", |b| {
        b.iter(|| black_box(handle.should_shadow(black_box(&request), &reporter)));
    });
}

fn bench_key_list(c: &mut Criterion) {
    let reporter = RecordingReporter::default();
    let keys = (0..1024).map(|i| {
        let key = format!("user:{i}");
        (routing_hash(key.as_bytes()), Bytes::from(key))
    });
    let handle =
        ShadowSettingsHandle::new(ShadowSettings::disabled().with_keys_to_shadow(keys));
    let request = CacheRequest::new(RequestKind::Get, "user:512");

    c.bench_function("should_shadow/key_list_1024", |b| {
        b.iter(|| black_box(handle.should_shadow(black_box(&request), &reporter)));
    });
}

fn main() {
    let mut quick_mode = false;
    for arg in env::args().skip(1) {
        if arg == "--quick" {
            quick_mode = true;
        }
    }

    let mut criterion = Criterion::default();
    if quick_mode {
        criterion = criterion
            .sample_size(10)
            .warm_up_time(Duration::from_millis(100))
            .measurement_time(Duration::from_millis(250));
    }

    bench_key_range(&mut criterion);
    bench_key_list(&mut criterion);
    criterion.final_summary();
}
