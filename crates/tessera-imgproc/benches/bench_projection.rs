use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use tessera_image::Image;
use tessera_imgproc::{
    projection::{maximum, mean, percentile, sum, variance, MeanMode, VarianceMode},
    statistics::sample_statistics,
};

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("Projection");

    for (width, height) in [(256, 224), (512, 448), (1024, 896)].iter() {
        group.throughput(criterion::Throughput::Elements((*width * *height) as u64));

        let parameter_string = format!("{}x{}", width, height);

        let data: Vec<f32> = (0..width * height).map(|i| (i % 251) as f32).collect();
        let image = Image::from_vec(vec![*width, *height], 1, data).unwrap();

        group.bench_with_input(BenchmarkId::new("sum_all", &parameter_string), &image, |b, src| {
            let mut dst = Image::default();
            b.iter(|| black_box(sum(src, None, &mut dst, &[])))
        });

        group.bench_with_input(
            BenchmarkId::new("mean_rows", &parameter_string),
            &image,
            |b, src| {
                let mut dst = Image::default();
                b.iter(|| black_box(mean(src, None, &mut dst, MeanMode::Plain, &[true, false])))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("variance_stable", &parameter_string),
            &image,
            |b, src| {
                let mut dst = Image::default();
                b.iter(|| {
                    black_box(variance(src, None, &mut dst, VarianceMode::Stable, &[]))
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("maximum_columns", &parameter_string),
            &image,
            |b, src| {
                let mut dst = Image::default();
                b.iter(|| black_box(maximum(src, None, &mut dst, &[false, true])))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("median", &parameter_string),
            &image,
            |b, src| {
                let mut dst = Image::default();
                b.iter(|| black_box(percentile(src, None, &mut dst, 50.0, &[])))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("sample_statistics", &parameter_string),
            &image,
            |b, src| b.iter(|| black_box(sample_statistics(src, None))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_projection);
criterion_main!(benches);
