//! Benchmarks for pipeline construction.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reconflow::config::ScannerConfig;
use reconflow::pipeline::PipelineBuilder;
use reconflow::recon::recon_pipeline;
use reconflow::stages::ToolStage;
use std::path::Path;
use std::sync::Arc;

fn pipeline_benchmark(c: &mut Criterion) {
    let config = ScannerConfig::from_home(Path::new("/home/bench"));

    c.bench_function("recon_pipeline", |b| {
        b.iter(|| recon_pipeline(black_box(&config)).map(|graph| graph.waves().len()))
    });

    c.bench_function("chain_of_100_waves", |b| {
        b.iter(|| {
            let mut builder = PipelineBuilder::new("chain");
            for i in 0..100 {
                let stage = ToolStage::new(format!("stage{i}"), "true")
                    .input(format!("f{i}.txt"))
                    .output(format!("f{}.txt", i + 1));
                builder = match builder.stage(Arc::new(stage), &[]) {
                    Ok(builder) => builder,
                    Err(_) => return 0,
                };
            }
            builder.build().map_or(0, |graph| black_box(graph.waves().len()))
        })
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
