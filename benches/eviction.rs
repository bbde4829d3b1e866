use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pagepool::buffer::replacer::LruReplacer;
use pagepool::catalog::FileTable;
use pagepool::{BufferConfig, BufferManager, DEFAULT_PAGE_SIZE};
use tempfile::tempdir;

const PAGE_SIZE: usize = DEFAULT_PAGE_SIZE;
const TOTAL_PAGES: u64 = 256;

/// Sequential scan over more pages than frames: every access past the
/// first lap is a miss and an eviction.
fn benchmark_sequential_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_scan");

    for pool_size in [8, 32, 128] {
        let dir = tempdir().unwrap();
        let config = BufferConfig::new(PAGE_SIZE, pool_size, dir.path().join("spill.tmp"))
            .with_sync_writes(false);
        let bm = BufferManager::new(config).unwrap();
        let table = FileTable::new("scan", dir.path().join("scan.tbl"));
        let handles: Vec<_> = (0..TOTAL_PAGES).map(|n| bm.get_page(&table, n)).collect();

        group.bench_with_input(BenchmarkId::new("read", pool_size), &pool_size, |b, _| {
            b.iter(|| {
                for handle in &handles {
                    black_box(handle.get_bytes().unwrap()[0]);
                }
            });
        });
    }

    group.finish();
}

/// Working-set access: a small hot set that fits in the pool, touched
/// between cold reads that force evictions.
fn benchmark_working_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("working_set");

    for hot in [4u64, 12] {
        let dir = tempdir().unwrap();
        let config =
            BufferConfig::new(PAGE_SIZE, 16, dir.path().join("spill.tmp")).with_sync_writes(false);
        let bm = BufferManager::new(config).unwrap();
        let table = FileTable::new("hot", dir.path().join("hot.tbl"));
        let handles: Vec<_> = (0..TOTAL_PAGES).map(|n| bm.get_page(&table, n)).collect();

        group.bench_with_input(BenchmarkId::new("mixed_write", hot), &hot, |b, &hot| {
            let mut cold = hot;
            b.iter(|| {
                for n in 0..hot {
                    handles[n as usize].get_bytes_mut().unwrap()[0] = n as u8;
                }
                black_box(handles[cold as usize].get_bytes().unwrap()[0]);
                cold = if cold + 1 < TOTAL_PAGES { cold + 1 } else { hot };
            });
        });
    }

    group.finish();
}

/// Anonymous pages spilling to the temp file.
fn benchmark_anonymous_spill(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let config =
        BufferConfig::new(PAGE_SIZE, 8, dir.path().join("spill.tmp")).with_sync_writes(false);
    let bm = BufferManager::new(config).unwrap();
    let handles: Vec<_> = (0..64).map(|_| bm.get_anonymous_page()).collect();

    c.bench_function("anonymous_spill", |b| {
        b.iter(|| {
            for (i, handle) in handles.iter().enumerate() {
                handle.get_bytes_mut().unwrap()[0] = i as u8;
            }
        });
    });
}

/// Raw replacer throughput, no I/O.
fn benchmark_replacer(c: &mut Criterion) {
    c.bench_function("lru_touch_evict", |b| {
        b.iter(|| {
            let mut replacer = LruReplacer::new();
            for k in 0u32..1024 {
                replacer.touch(k);
                if k % 3 == 0 {
                    replacer.touch(k / 2);
                }
            }
            while let Some(k) = replacer.evict() {
                black_box(k);
            }
        });
    });
}

criterion_group!(
    benches,
    benchmark_sequential_scan,
    benchmark_working_set,
    benchmark_anonymous_spill,
    benchmark_replacer
);
criterion_main!(benches);
