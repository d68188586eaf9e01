use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use tessera_framework::{
    boundary::BoundaryCondition,
    monadic::{new_dyadic_scan_line_filter, new_monadic_scan_line_filter},
    scan::{scan_dyadic, scan_monadic, ScanOptions},
    separable::{separable, SeparableLineFilter, SeparableLineFilterParameters, SeparableOptions},
};
use tessera_image::{DataType, Image, ImageError};

struct Smooth;

impl SeparableLineFilter for Smooth {
    fn filter(&self, params: &mut SeparableLineFilterParameters<'_>) -> Result<(), ImageError> {
        let input = params.in_buffer.typed::<f32>()?;
        let mut output = params.out_buffer.typed_mut::<f32>()?;
        for i in 0..output.len() as isize {
            let v = 0.25 * input.get_t(i - 1, 0)
                + 0.5 * input.get_t(i, 0)
                + 0.25 * input.get_t(i + 1, 0);
            output.set_t(i, 0, v);
        }
        Ok(())
    }
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("Scan");

    for (width, height) in [(256, 224), (512, 448), (1024, 896)].iter() {
        group.throughput(criterion::Throughput::Elements((*width * *height) as u64));

        let parameter_string = format!("{}x{}", width, height);

        let data: Vec<u8> = (0..width * height).map(|i| (i % 251) as u8).collect();
        let image_u8 = Image::from_vec(vec![*width, *height], 1, data).unwrap();
        let mut image_f32 = image_u8.clone();
        image_f32.convert(DataType::SFloat).unwrap();

        group.bench_with_input(
            BenchmarkId::new("monadic_u8_to_f32", &parameter_string),
            &image_u8,
            |b, src| {
                let mut dst = Image::default();
                let mut filter = new_monadic_scan_line_filter(|v: f32| v * 2.0 + 1.0, 2);
                b.iter(|| {
                    black_box(scan_monadic(
                        src,
                        &mut dst,
                        DataType::SFloat,
                        DataType::SFloat,
                        1,
                        &mut filter,
                        ScanOptions::new(),
                    ))
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("dyadic_f32", &parameter_string),
            &image_f32,
            |b, src| {
                let mut dst = Image::default();
                let mut filter = new_dyadic_scan_line_filter(|a: f32, b: f32| a * b, 1);
                b.iter(|| {
                    black_box(scan_dyadic(
                        src,
                        src,
                        &mut dst,
                        DataType::SFloat,
                        DataType::SFloat,
                        &mut filter,
                        ScanOptions::new(),
                    ))
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("separable_smooth_f32", &parameter_string),
            &image_f32,
            |b, src| {
                let mut dst = Image::default();
                b.iter(|| {
                    black_box(separable(
                        src,
                        &mut dst,
                        DataType::SFloat,
                        DataType::SFloat,
                        &[],
                        &[1],
                        &[BoundaryCondition::SymmetricMirror],
                        &mut Smooth,
                        SeparableOptions::new(),
                    ))
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_scan);
criterion_main!(benches);
