// End-to-end tests of the producer/renderer pipeline across real threads.

use crossbeam_channel::{bounded, unbounded};
use heatmap_core::column::{NormalizationWindow, band_intensity};
use heatmap_core::handoff::QueueBound;
use heatmap_core::visualization::{self, PipelineState};
use heatmap_core::{Gradient, PixelBuffer, ScrollDirection, VisualizationConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

const MIN_DB: f64 = -80.0;
const MAX_DB: f64 = -20.0;

fn config(width: u32, bands: u32) -> VisualizationConfig {
    VisualizationConfig {
        width,
        bands,
        ..VisualizationConfig::default()
    }
}

/// A distinct, flat spectrum for sample `i` of `n`.
fn sample(i: usize, n: usize, bands: usize) -> Vec<f64> {
    vec![MIN_DB + (MAX_DB - MIN_DB) * i as f64 / n as f64; bands]
}

fn expected_color(i: usize, n: usize) -> [u8; 4] {
    let window = NormalizationWindow::new(MIN_DB, MAX_DB).unwrap();
    let intensity = band_intensity(sample(i, n, 1)[0], window, 1.0);
    Gradient::heatmap().evaluate(intensity).to_rgba()
}

/// Spawns a renderer that drains a few columns per tick, slower than the
/// producer, and reports the final texture once `expected` columns landed.
fn slow_renderer(
    config: VisualizationConfig,
    expected: u64,
) -> (heatmap_core::SpectrumFeeder, crossbeam_channel::Receiver<(PixelBuffer, u32)>, thread::JoinHandle<()>) {
    let (done_tx, done_rx) = bounded(1);
    let (feeder, handle) = visualization::launch(config, || {}, move |endpoint| {
        let mut ctx = endpoint.initialize().expect("renderer init");
        while ctx.stats().applied < expected {
            ctx.drain_up_to(3);
            thread::sleep(Duration::from_micros(200));
        }
        let compositor = ctx.compositor();
        done_tx
            .send((compositor.texture().clone(), compositor.cursor()))
            .unwrap();
    })
    .expect("launch");
    (feeder, done_rx, handle)
}

#[test]
fn every_fed_sample_lands_once_at_its_sequential_column() {
    const N: usize = 120;
    let (mut feeder, done, handle) = slow_renderer(config(N as u32, 3), N as u64);
    let monitor = feeder.monitor();

    for i in 0..N {
        feeder.feed(&sample(i, N, 3), MIN_DB, MAX_DB).unwrap();
    }

    let (texture, cursor) = done.recv_timeout(Duration::from_secs(10)).expect("renderer finished");
    handle.join().unwrap();

    assert_eq!(cursor, 0, "cursor wrapped after exactly one period");
    for x in 0..N {
        for y in 0..3 {
            assert_eq!(texture.pixel(x as u32, y), Some(expected_color(x, N)), "column {x}");
        }
    }

    let stats = monitor.stats();
    assert_eq!(stats.submitted, N as u64);
    assert_eq!(stats.applied, N as u64);
    assert_eq!(stats.overflowed, 0);
}

#[test]
fn wraparound_keeps_the_most_recent_period_in_order() {
    const WIDTH: usize = 16;
    const N: usize = 40;
    let (mut feeder, done, handle) = slow_renderer(config(WIDTH as u32, 2), N as u64);
    for i in 0..N {
        feeder.feed(&sample(i, N, 2), MIN_DB, MAX_DB).unwrap();
    }
    let (texture, cursor) = done.recv_timeout(Duration::from_secs(10)).expect("renderer finished");
    handle.join().unwrap();

    assert_eq!(cursor as usize, N % WIDTH);
    // Sample i was written at column i % WIDTH; only the last WIDTH survive.
    for i in (N - WIDTH)..N {
        assert_eq!(texture.pixel((i % WIDTH) as u32, 0), Some(expected_color(i, N)), "sample {i}");
    }
}

#[test]
fn columns_are_applied_in_submission_order_while_submitting_concurrently() {
    const N: u64 = 500;
    let (order_tx, order_rx) = unbounded();
    let (feeder, handle) = visualization::launch(config(64, 8), || {}, move |endpoint| {
        let mut ctx = endpoint.initialize().expect("renderer init");
        let mut seen = Vec::new();
        while (seen.len() as u64) < N {
            if ctx.drain_up_to(1) == 1 {
                seen.push(ctx.compositor().last_sequence().unwrap());
            } else {
                thread::yield_now();
            }
        }
        order_tx.send(seen).unwrap();
    })
    .expect("launch");

    let producer = thread::spawn(move || {
        let mut feeder = feeder;
        for i in 0..N as usize {
            feeder.feed(&sample(i % 50, 50, 8), MIN_DB, MAX_DB).unwrap();
        }
        feeder
    });

    let seen = order_rx.recv_timeout(Duration::from_secs(10)).expect("renderer finished");
    let feeder = producer.join().unwrap();
    handle.join().unwrap();

    assert_eq!(seen, (0..N).collect::<Vec<_>>());
    assert_eq!(feeder.monitor().stats().discarded, 0);
}

#[test]
fn shutdown_signal_stops_the_renderer_and_silences_the_producer() {
    let shutdown_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&shutdown_calls);
    let (stop_tx, stop_rx) = bounded::<()>(1);

    let (mut feeder, handle) = visualization::launch(
        config(32, 4),
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
        },
        move |endpoint| {
            let mut ctx = endpoint.initialize().expect("renderer init");
            ctx.run_until(&stop_rx);
        },
    )
    .expect("launch");

    for i in 0..10 {
        feeder.feed(&sample(i, 10, 4), MIN_DB, MAX_DB).unwrap();
    }
    stop_tx.send(()).unwrap();
    handle.join().unwrap();

    assert_eq!(feeder.monitor().state(), PipelineState::Stopped);
    assert_eq!(shutdown_calls.load(Ordering::SeqCst), 1);

    let before = feeder.monitor().stats();
    for i in 0..100 {
        assert_eq!(feeder.feed(&sample(i % 10, 10, 4), MIN_DB, MAX_DB), Ok(()));
    }
    let after = feeder.monitor().stats();
    assert_eq!(after.submitted, before.submitted);
    assert_eq!(after.discarded, before.discarded);
    assert_eq!(after.rejected, before.rejected + 100);
    assert_eq!(feeder.queued(), 0);
    assert_eq!(before.applied + before.discarded, 10);
}

#[test]
fn shutdown_racing_a_busy_producer_leaves_nothing_queued() {
    const BANDS: usize = 512;
    for queue in [QueueBound::Unbounded, QueueBound::Bounded { capacity: 4 }] {
        for round in 0..100 {
            let config = VisualizationConfig {
                queue,
                ..config(32, BANDS as u32)
            };
            let (pending, endpoint) = visualization::channel(config, || {}).unwrap();
            let mut ctx = endpoint.initialize().expect("renderer init");
            let mut feeder = pending.wait_ready().unwrap();

            let producer = thread::spawn(move || {
                let mut i = 0;
                while !feeder.is_stopped() {
                    feeder.feed(&sample(i % 64, 64, BANDS), MIN_DB, MAX_DB).unwrap();
                    i += 1;
                }
                feeder
            });

            ctx.drain_up_to(round % 5);
            ctx.shutdown();
            let feeder = producer.join().unwrap();

            assert_eq!(ctx.queued(), 0, "{queue:?} round {round}");
            assert_eq!(feeder.queued(), 0, "{queue:?} round {round}");
            let stats = ctx.stats();
            assert_eq!(
                stats.submitted,
                stats.applied + stats.discarded + stats.overflowed,
                "{queue:?} round {round}: {stats:?}"
            );
            assert_eq!(stats.in_flight(), 0);
        }
    }
}

#[test]
fn producer_dropping_ends_a_blocking_render_loop() {
    let (_stop_tx, stop_rx) = bounded::<()>(1);
    let (applied_tx, applied_rx) = bounded(1);
    let (mut feeder, handle) = visualization::launch(config(8, 2), || {}, move |endpoint| {
        let mut ctx = endpoint.initialize().expect("renderer init");
        ctx.run_until(&stop_rx);
        applied_tx.send(ctx.stats().applied).unwrap();
    })
    .expect("launch");

    for i in 0..5 {
        feeder.feed(&sample(i, 5, 2), MIN_DB, MAX_DB).unwrap();
    }
    drop(feeder);
    handle.join().unwrap();
    assert_eq!(applied_rx.recv().unwrap(), 5);
}

#[test]
fn bounded_queue_under_backlog_keeps_the_newest_columns_in_order() {
    let config = VisualizationConfig {
        queue: QueueBound::Bounded { capacity: 4 },
        scroll: ScrollDirection::Forward,
        ..config(16, 2)
    };
    let (pending, endpoint) = visualization::channel(config, || {}).unwrap();
    let (ctx_tx, ctx_rx) = bounded(1);
    let renderer = thread::spawn(move || {
        ctx_tx.send(endpoint.initialize().expect("renderer init")).unwrap();
    });
    let mut feeder = pending.wait_ready().unwrap();
    let mut ctx = ctx_rx.recv().unwrap();
    renderer.join().unwrap();

    // The renderer is not draining at all while these arrive.
    for i in 0..20 {
        feeder.feed(&sample(i, 20, 2), MIN_DB, MAX_DB).unwrap();
    }
    assert_eq!(ctx.queued(), 4);

    let mut applied = Vec::new();
    while ctx.drain_up_to(1) == 1 {
        applied.push(ctx.compositor().last_sequence().unwrap());
    }
    assert_eq!(applied, vec![16, 17, 18, 19]);
    let stats = ctx.stats();
    assert_eq!((stats.submitted, stats.applied, stats.overflowed), (20, 4, 16));
}
