use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use posixshmem::{SharedMemorySegment, unlink};

fn bench_name(tag: &str) -> String {
    format!("/posixshmem_bench_{tag}_{}", std::process::id())
}

fn benchmark_segment_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_write");

    let sizes = [
        (1024, "1KB"),            // Small metadata
        (100 * 1024, "100KB"),    // Small image
        (1024 * 1024, "1MB"),     // VGA raw frame (640x480x3)
        (6 * 1024 * 1024, "6MB"), // Full HD raw frame (1920x1080x3)
    ];

    for (size, label) in sizes.iter() {
        let name = bench_name(&format!("write_{label}"));
        let _ = unlink(&name); // Leftover from an aborted run

        let mut segment = SharedMemorySegment::create(&name, *size).unwrap();
        let data = vec![0u8; *size];

        group.bench_with_input(BenchmarkId::new("write", label), size, |b, _| {
            b.iter(|| {
                segment.write_at(0, black_box(&data)).unwrap();
            });
        });

        unlink(&name).unwrap();
    }

    group.finish();
}

fn benchmark_cross_handle_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_handle_read");

    let sizes = [
        (100 * 1024, "100KB"),
        (1024 * 1024, "1MB"),
        (6 * 1024 * 1024, "6MB"),
    ];

    for (size, label) in sizes.iter() {
        let name = bench_name(&format!("read_{label}"));
        let _ = unlink(&name);

        let mut writer = SharedMemorySegment::create(&name, *size).unwrap();
        let reader = SharedMemorySegment::attach(&name).unwrap();
        let data = vec![128u8; *size];
        let mut sink = vec![0u8; *size];

        group.bench_with_input(BenchmarkId::new("write_read_cycle", label), size, |b, _| {
            b.iter(|| {
                writer.write_at(0, black_box(&data)).unwrap();
                sink.copy_from_slice(reader.buffer().unwrap());
                black_box(&sink);
            });
        });

        unlink(&name).unwrap();
    }

    group.finish();
}

fn benchmark_lifecycle(c: &mut Criterion) {
    let name = bench_name("lifecycle");
    let _ = unlink(&name);

    c.bench_function("create_close_unlink", |b| {
        b.iter(|| {
            let mut segment = SharedMemorySegment::create(&name, 4096).unwrap();
            segment.unlink().unwrap();
            segment.close().unwrap();
        });
    });

    let creator = SharedMemorySegment::create(&name, 4096).unwrap();

    c.bench_function("attach_close", |b| {
        b.iter(|| {
            let mut segment = SharedMemorySegment::attach(&name).unwrap();
            black_box(segment.size());
            segment.close().unwrap();
        });
    });

    creator.unlink().unwrap();
}

criterion_group!(
    benches,
    benchmark_segment_write,
    benchmark_cross_handle_read,
    benchmark_lifecycle
);
criterion_main!(benches);
