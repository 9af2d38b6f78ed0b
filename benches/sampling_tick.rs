use boresight::overlay::display::DisplayDescriptor;
use boresight::overlay::geometry::{Point, Rect};
use boresight::overlay::platform::headless::HeadlessHandles;
use boresight::overlay::{Overlay, OverlaySettings};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Instant;

fn three_displays() -> HeadlessHandles {
    HeadlessHandles::new(vec![
        DisplayDescriptor::new(1, Rect::new(0.0, 0.0, 2560.0, 1440.0), true),
        DisplayDescriptor::new(2, Rect::new(2560.0, 0.0, 1920.0, 1080.0), false),
        DisplayDescriptor::new(3, Rect::new(-1920.0, 200.0, 1920.0, 1080.0), false),
    ])
}

fn bench_tick(c: &mut Criterion) {
    let handles = three_displays();
    let settings = OverlaySettings {
        origin: Some(Point::new(1280.0, 720.0)),
        ..OverlaySettings::default()
    };
    let mut overlay = Overlay::new(settings, handles.platform());

    let mut step = 0u32;
    c.bench_function("tick_same_display", |b| {
        b.iter(|| {
            step = step.wrapping_add(1);
            handles
                .pointer
                .move_to(f64::from(step % 2000) + 100.0, 400.0);
            black_box(overlay.tick(Instant::now()));
            overlay.drain_events().for_each(drop);
        })
    });

    c.bench_function("tick_crossing_displays", |b| {
        b.iter(|| {
            step = step.wrapping_add(1);
            let x = if step % 2 == 0 { 1000.0 } else { 3000.0 };
            handles.pointer.move_to(x, 500.0);
            black_box(overlay.tick(Instant::now()));
            overlay.drain_events().for_each(drop);
        })
    });
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
