//! Allocation-free render path tests.
//!
//! These tests verify that `Engine::fill_buffer()` does not allocate once
//! the engine is built. They exercise note triggers, hard restarts,
//! filter rebinding, block changes and mutes.
//!
//! Just run `cargo test`; no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use qs_engine::Engine;
use qs_ir::Song;

/// Render a song for `samples` samples, aborting on any heap allocation.
fn assert_render_alloc_free(mut engine: Engine, samples: usize) {
    let mut buffer = vec![0i16; 1024];
    engine.play();

    assert_no_alloc(|| {
        let mut done = 0;
        while done < samples {
            let len = buffer.len().min(samples - done);
            engine.fill_buffer(&mut buffer[..len]);
            done += len;
        }
    });
}

#[test]
fn demo_alloc_free() {
    let engine = Engine::new(Song::demo(), 44100);
    assert_render_alloc_free(engine, 44100 * 5);
}

#[test]
fn looping_block_alloc_free() {
    let mut song = Song::demo();
    song.push_block([1, 1, 1, 1]).unwrap();
    song.set_swing(3);
    let mut engine = Engine::new(song, 48000);
    engine.set_block(1);
    engine.set_block_loop(true);
    assert_render_alloc_free(engine, 48000 * 3);
}

#[test]
fn transport_alloc_free() {
    let mut engine = Engine::new(Song::demo(), 44100);
    let mut buffer = [0i16; 333];
    engine.play();

    assert_no_alloc(|| {
        for i in 0..200 {
            engine.fill_buffer(&mut buffer);
            match i % 50 {
                10 => engine.set_channel_active(0, false),
                20 => engine.set_channel_active(0, true),
                30 => engine.pause(),
                31 => engine.play(),
                40 => engine.stop(),
                41 => engine.play(),
                _ => {}
            }
        }
        engine.reset();
    });
}
