//! Full frame pass over a crowd of networked soldiers.
//!
//! Run with: `cargo bench --bench frame_pass`

use cadence_animation_core::{Config, Engine, FrameTime, LayerState, Value};
use cadence_test_fixtures as fixtures;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const TICK: f32 = 1.0 / 64.0;

fn crowd(count: usize) -> Engine {
    let mut engine = Engine::new(Config::default()).unwrap();
    let skel = engine
        .load_skeleton_json(&fixtures::skeletons::json("soldier").unwrap())
        .unwrap();
    for i in 0..count {
        let id = engine.spawn();
        engine.bind_skeleton(id, skel).unwrap();
        engine.set_value(id, "sequence", Value::Int(1)).unwrap();
        engine.set_layer_count(id, 4).unwrap();
        for slot in 0..4 {
            let state = LayerState {
                sequence: (slot % 3) as i32 + 1,
                cycle: 0.0,
                prev_cycle: 0.0,
                weight: 0.5,
                playback_rate: 1.0,
                order: (3 - slot) as i32,
                looping: slot % 3 == 0,
            };
            engine.set_layer(id, slot, state).unwrap();
        }
        engine
            .set_value(id, "origin", Value::Vec3([i as f32, 0.0, 0.0]))
            .unwrap();
    }
    engine
}

fn feed(engine: &mut Engine, tick: usize) {
    let t = tick as f32 * TICK;
    let ids: Vec<_> = engine.objects().map(|o| o.id()).collect();
    for (i, id) in ids.into_iter().enumerate() {
        let x = i as f32 + t;
        engine
            .note_value_changed(id, "origin", t, Value::Vec3([x, 0.0, 0.0]))
            .unwrap();
        engine
            .note_value_changed(id, "cycle", t, Value::Float((t * 1.5).fract()))
            .unwrap();
    }
}

fn bench_frame_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_pass");
    for count in [16usize, 128, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut engine = crowd(count);
            let mut tick = 0usize;
            b.iter(|| {
                tick += 1;
                feed(&mut engine, tick);
                let now = tick as f32 * TICK;
                let out = engine.update(FrameTime::at(now));
                black_box(out.events.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_frame_pass);
criterion_main!(benches);
