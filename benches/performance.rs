use criterion::{criterion_group, criterion_main, Criterion};
use pixmem_alloc::{scoped, LifecycleOwner, TrackedAllocator};
use std::hint::black_box;

fn bench_tracked_alloc_free(c: &mut Criterion) {
    let alloc = TrackedAllocator::new();
    c.bench_function("tracked_alloc_free_64k", |b| {
        b.iter(|| {
            let ptr = alloc.alloc(black_box(64 * 1024)).unwrap();
            unsafe { alloc.free(ptr) };
        })
    });
    c.bench_function("tracked_buf_64k", |b| {
        b.iter(|| {
            let buf = alloc.alloc_buf(black_box(64 * 1024)).unwrap();
            black_box(buf.len());
        })
    });
}

fn bench_owner_teardown(c: &mut Criterion) {
    let alloc = TrackedAllocator::new();
    c.bench_function("owner_teardown_32_blocks", |b| {
        b.iter(|| {
            let owner = LifecycleOwner::new();
            for _ in 0..16 {
                alloc.alloc_in(&owner, 4096).unwrap();
                scoped::malloc(Some(&owner), 256);
            }
            black_box(owner.close());
        })
    });
}

criterion_group!(allocators, bench_tracked_alloc_free, bench_owner_teardown);
criterion_main!(allocators);
