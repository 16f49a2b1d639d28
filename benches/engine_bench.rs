//! Benchmarks for the playback engine across realistic block sizes.
//!
//! Run with: cargo bench
//!
//! Reference timing at 44.1kHz:
//!   - 64 samples  = 1.45ms deadline
//!   - 128 samples = 2.90ms deadline
//!   - 256 samples = 5.80ms deadline
//!   - 512 samples = 11.61ms deadline

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use gridslicer::engine::{Command, Engine};
use gridslicer::modseq::ModTarget;
use gridslicer::timing::HostPosition;
use gridslicer::track::{PlayMode, SampleBuffer};
use gridslicer::NUM_TRACKS;

const SR: f32 = 44_100.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

fn loaded_engine() -> Engine {
    let (mut engine, _handle) = Engine::new(SR);
    for track in 0..NUM_TRACKS {
        let frames: Vec<f32> = (0..88_200)
            .map(|i| (i as f32 * 0.01).sin() * 0.5)
            .collect();
        engine.load_sample(track, SampleBuffer::from_mono(frames, SR));
    }
    engine.apply(Command::SetQuantizeEnabled { enabled: false });
    engine
}

fn run_block(engine: &mut Engine, left: &mut [f32], right: &mut [f32]) {
    let host = HostPosition {
        tempo: 120.0,
        ppq: None,
        playing: true,
    };
    engine.process(left, right, Some(&host));
}

fn bench_idle(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/idle");
    for &size in BLOCK_SIZES {
        let mut engine = loaded_engine();
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| run_block(&mut engine, &mut left, &mut right));
        });
    }
    group.finish();
}

fn bench_six_loops(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/six_loops");
    for &size in BLOCK_SIZES {
        let mut engine = loaded_engine();
        for track in 0..NUM_TRACKS {
            engine.apply(Command::ButtonDown { track, column: 0 });
        }
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| run_block(&mut engine, &mut left, &mut right));
        });
    }
    group.finish();
}

fn bench_granular(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/granular");
    for &size in BLOCK_SIZES {
        let mut engine = loaded_engine();
        for track in 0..NUM_TRACKS {
            engine.apply(Command::SetPlayMode {
                track,
                mode: PlayMode::Grain,
            });
            engine.apply(Command::ButtonDown { track, column: 4 });
        }
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| run_block(&mut engine, &mut left, &mut right));
        });
    }
    group.finish();
}

fn bench_full_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/full_session");
    for &size in BLOCK_SIZES {
        let mut engine = loaded_engine();
        engine.apply(Command::SetLimiterEnabled { enabled: true });
        for track in 0..NUM_TRACKS {
            engine.apply(Command::ButtonDown { track, column: 0 });
            engine.apply(Command::SetModEnabled {
                track,
                slot: 0,
                enabled: true,
            });
            engine.apply(Command::SetModTarget {
                track,
                slot: 0,
                target: ModTarget::FilterCutoff,
            });
            engine.apply(Command::SetFilterCutoff {
                track,
                value: 2_000.0,
            });
        }
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| run_block(&mut engine, &mut left, &mut right));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_idle,
    bench_six_loops,
    bench_granular,
    bench_full_session,
);
criterion_main!(benches);
