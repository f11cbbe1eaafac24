// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate mandelbrot;

use std::thread;
use std::time::Duration;

use mandelbrot::{iterate, Config, Kernel, ParallelRenderer, Params, PlaneMapper, Session, State, Viewport};

const PATIENCE: Duration = Duration::from_secs(60);

fn config(threads: usize) -> Config {
    Config::detect()
        .with_threads(threads)
        .with_fill_delay(Duration::from_millis(0))
        .with_idle_poll(Duration::from_millis(1))
}

fn reference(viewport: Viewport, params: Params, width: usize, height: usize) -> Vec<u32> {
    let plane = PlaneMapper::new(width, height, viewport).unwrap();
    ParallelRenderer::new(1, Kernel::Scalar)
        .unwrap()
        .render_single(&plane, &params)
}

#[test]
fn converged_frame_matches_the_reference() {
    let mut session = Session::new(config(4)).unwrap();
    let viewport = Viewport::new(-1.0, 0.5, -0.75, 0.75).unwrap();
    session.configure(viewport, 150, 2.0).unwrap();
    session.resize(33, 21).unwrap();
    assert!(session.wait_converged(PATIENCE));

    let expected = reference(viewport, Params::new(150, 2.0).unwrap(), 33, 21);
    assert_eq!(session.buffer().unwrap().snapshot(), expected);
}

#[test]
fn scalar_and_vector_sessions_agree() {
    let mut frames = Vec::new();
    for kernel in [Kernel::Scalar, Kernel::Vector].iter().cloned() {
        let mut session = Session::new(config(3).with_kernel(kernel)).unwrap();
        session.configure(Viewport::default(), 120, 2.0).unwrap();
        session.resize(25, 17).unwrap();
        assert!(session.wait_converged(PATIENCE));
        frames.push(session.buffer().unwrap().snapshot());
    }
    assert_eq!(frames[0], frames[1]);
}

#[test]
fn resizing_while_running_never_writes_the_old_buffer() {
    let mut session = Session::new(config(4).with_sample_batch(10)).unwrap();
    session.configure(Viewport::default(), 2000, 2.0).unwrap();
    session.resize(120, 90).unwrap();
    thread::sleep(Duration::from_millis(20));

    let old = session.buffer_handle().unwrap();
    session.resize(60, 45).unwrap();
    assert!(old.is_retired());
    assert_eq!(old.stale_writes(), 0);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(old.stale_writes(), 0);
    assert_eq!(session.buffer_dimensions(), Some((60, 45)));
    assert_eq!(session.state(), State::Running);
}

#[test]
fn many_quick_resizes_leave_no_stale_writes() {
    let mut session = Session::new(config(4).with_sample_batch(1)).unwrap();
    let mut retired = Vec::new();
    for side in 8..24 {
        session.resize(side, side).unwrap();
        retired.push(session.buffer_handle().unwrap());
    }
    session.shutdown();
    thread::sleep(Duration::from_millis(20));
    for buffer in retired {
        assert!(buffer.is_retired());
        assert_eq!(buffer.stale_writes(), 0);
    }
}

#[test]
fn zoom_keeps_the_generation_and_converges_to_the_new_view() {
    let mut session = Session::new(config(3)).unwrap();
    session.configure(Viewport::default(), 100, 2.0).unwrap();
    session.resize(20, 20).unwrap();
    assert!(session.wait_converged(PATIENCE));
    let generation = session.generation();
    let pointer = session.buffer_pointer();

    session.zoom(0.3, 0.6, 4.0).unwrap();
    assert!(session.wait_converged(PATIENCE));
    assert_eq!(session.generation(), generation);
    assert_eq!(session.buffer_pointer(), pointer);

    let expected = reference(session.viewport(), session.params(), 20, 20);
    assert_eq!(session.buffer().unwrap().snapshot(), expected);
}

#[test]
fn configure_takes_the_cheap_path() {
    let mut session = Session::new(config(2)).unwrap();
    session.resize(16, 12).unwrap();
    let generation = session.generation();
    session.configure(Viewport::new(-0.8, -0.7, 0.05, 0.15).unwrap(), 300, 4.0).unwrap();
    assert_eq!(session.generation(), generation);
    assert!(session.wait_converged(PATIENCE));

    let buffer = session.buffer().unwrap();
    let plane = PlaneMapper::new(16, 12, session.viewport()).unwrap();
    let c = plane.pixel_to_point(&mandelbrot::planes::Pixel(5, 7));
    assert_eq!(buffer.get(5, 7), Some(iterate(c.re, c.im, 300, 16.0)));
}

#[test]
fn shutdown_is_idempotent() {
    let mut session = Session::new(config(2)).unwrap();
    session.resize(10, 10).unwrap();
    session.shutdown();
    session.shutdown();
    assert_eq!(session.state(), State::Idle);
    assert!(session.buffer_pointer().is_none());
    session.resize(4, 4).unwrap();
    assert_eq!(session.state(), State::Running);
}
