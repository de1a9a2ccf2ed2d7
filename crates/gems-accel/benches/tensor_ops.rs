use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gems_accel::*;

fn cpu_nearest(src: &[f32], [n, c, ih, iw]: [usize; 4], [oh, ow]: [usize; 2]) -> Vec<f32> {
    let (rh, rw) = (ih as f32 / oh as f32, iw as f32 / ow as f32);
    let mut out = Vec::with_capacity(n * c * oh * ow);
    for plane in src.chunks(ih * iw).take(n * c) {
        for y in 0..oh {
            let sy = ((y as f32 * rh) as usize).min(ih - 1);
            for x in 0..ow {
                let sx = ((x as f32 * rw) as usize).min(iw - 1);
                out.push(plane[sy * iw + sx]);
            }
        }
    }
    out
}

fn cpu_add(a: &[f32], b: &[f32]) -> Vec<f32> {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

fn cpu_sum(a: &[f32]) -> f32 {
    a.iter().sum()
}

fn cpu_softmax_rows(a: &[f32], row_len: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(a.len());
    for row in a.chunks(row_len) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let denom: f32 = row.iter().map(|v| (v - max).exp()).sum();
        out.extend(row.iter().map(|v| (v - max).exp() / denom));
    }
    out
}

fn bench_upsample_nearest2d(c: &mut Criterion) {
    let gems = Gems::default();
    let mut group = c.benchmark_group("upsample_nearest2d");

    for &(hw, out) in [(32usize, 64usize), (128, 256), (256, 128)].iter() {
        let shape = [4, 16, hw, hw];
        let data: Vec<f32> = (0..shape.iter().product::<usize>()).map(|i| i as f32).collect();
        let label = format!("{hw}->{out}");

        group.bench_with_input(BenchmarkId::new("naive", &label), &data, |bench, data| {
            bench.iter(|| black_box(cpu_nearest(black_box(data), shape, [out, out])));
        });

        let x = gems.tensor(shape, data.clone()).unwrap();
        group.bench_with_input(BenchmarkId::new("gems", &label), &x, |bench, x| {
            bench.iter(|| black_box(upsample_nearest2d(&gems, black_box(x), &[out, out], None, None).unwrap()));
        });
    }
    group.finish();
}

fn bench_pointwise(c: &mut Criterion) {
    let gems = Gems::default();
    let mut group = c.benchmark_group("add");

    for size in [1_000usize, 100_000, 1_000_000].iter() {
        let a: Vec<f32> = (0..*size).map(|i| i as f32).collect();
        let b: Vec<f32> = (0..*size).map(|i| (i * 2) as f32).collect();

        group.bench_with_input(BenchmarkId::new("naive", size), size, |bench, _| {
            bench.iter(|| black_box(cpu_add(black_box(&a), black_box(&b))));
        });

        let ta = gems.tensor([*size], a.clone()).unwrap();
        let tb = gems.tensor([*size], b.clone()).unwrap();
        group.bench_with_input(BenchmarkId::new("gems", size), size, |bench, _| {
            bench.iter(|| black_box(add(&gems, black_box(&ta), black_box(&tb), 1.0).unwrap()));
        });
    }
    group.finish();
}

fn bench_reduction(c: &mut Criterion) {
    let gems = Gems::default();
    let mut group = c.benchmark_group("sum");

    for size in [1_000usize, 100_000, 1_000_000].iter() {
        let a: Vec<f32> = (0..*size).map(|i| (i % 13) as f32).collect();

        group.bench_with_input(BenchmarkId::new("naive", size), size, |bench, _| {
            bench.iter(|| black_box(cpu_sum(black_box(&a))));
        });

        let ta = gems.tensor([*size], a.clone()).unwrap();
        group.bench_with_input(BenchmarkId::new("gems", size), size, |bench, _| {
            bench.iter(|| black_box(sum(&gems, black_box(&ta)).unwrap()));
        });
    }
    group.finish();
}

fn bench_softmax(c: &mut Criterion) {
    let gems = Gems::default();
    let mut group = c.benchmark_group("softmax");

    for &(rows, row_len) in [(1024usize, 128usize), (256, 4096)].iter() {
        let a: Vec<f32> = (0..rows * row_len).map(|i| ((i % 97) as f32).sin()).collect();
        let label = format!("{rows}x{row_len}");

        group.bench_with_input(BenchmarkId::new("naive", &label), &a, |bench, a| {
            bench.iter(|| black_box(cpu_softmax_rows(black_box(a), row_len)));
        });

        let ta = gems.tensor([rows, row_len], a.clone()).unwrap();
        group.bench_with_input(BenchmarkId::new("gems", &label), &ta, |bench, ta| {
            bench.iter(|| black_box(softmax(&gems, black_box(ta), -1).unwrap()));
        });
    }
    group.finish();
}

#[cfg(any(feature = "cuda", feature = "wgpu"))]
fn bench_device_nearest(c: &mut Criterion) {
    use gems_accel::cube::*;

    #[cfg(feature = "cuda")]
    let runtime = init_cuda_runtime();
    #[cfg(all(feature = "wgpu", not(feature = "cuda")))]
    let runtime = init_wgpu_runtime();

    let Ok(runtime) = runtime else {
        println!("GPU not available, skipping benchmarks");
        return;
    };
    let tuner = resize_tuner(&GemsConfig::default());
    let mut group = c.benchmark_group("upsample_nearest2d_device");

    for &(hw, out) in [(128usize, 256usize), (256, 512)].iter() {
        let shape = vec![4, 16, hw, hw];
        let data: Vec<f32> = (0..shape.iter().product::<usize>()).map(|i| i as f32).collect();
        let input = to_device(&data, shape, &runtime).unwrap();

        group.bench_with_input(BenchmarkId::new("gpu", format!("{hw}->{out}")), &input, |bench, input| {
            bench.iter(|| {
                let y = upsample_nearest2d_execute::<_, f32>(input, &[out, out], None, None, &tuner, &runtime).unwrap();
                runtime.sync();
                black_box(y);
            });
        });
    }
    group.finish();
}

#[cfg(not(any(feature = "cuda", feature = "wgpu")))]
fn bench_device_nearest(_c: &mut Criterion) {}

criterion_group!(
    benches,
    bench_upsample_nearest2d,
    bench_pointwise,
    bench_reduction,
    bench_softmax,
    bench_device_nearest
);
criterion_main!(benches);
