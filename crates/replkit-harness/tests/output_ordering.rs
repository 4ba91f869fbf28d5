#![forbid(unsafe_code)]

//! Output written from several threads reaches the surface in order.

use std::sync::{Arc, Barrier};
use std::thread;

use proptest::prelude::*;
use replkit_core::{Style, TextSurface};
use replkit_harness::{ConsoleFixture, SETTLE_TIMEOUT, SharedSurface, wait_until};
use replkit_runtime::{ConsoleConfig, OutputWriter, SurfaceThread};

fn settled(writer: &OutputWriter) -> bool {
    wait_until(SETTLE_TIMEOUT, || {
        !writer.write_in_progress() && writer.pending().is_empty()
    })
}

#[test]
fn sequential_writers_on_different_threads_keep_order() {
    let surface = SurfaceThread::start(SharedSurface::new()).unwrap();
    let writer = OutputWriter::new(surface.handle());

    for chunk in ["A", "B", "C"] {
        let writer = writer.clone();
        thread::spawn(move || writer.write(chunk)).join().unwrap();
    }
    assert!(settled(&writer));
    assert_eq!(surface.with_surface(|s| s.text()).unwrap(), "ABC");
}

#[test]
fn concurrent_writers_never_split_a_write() {
    const THREADS: usize = 4;
    const LINES: usize = 50;

    let surface = SurfaceThread::start(SharedSurface::new()).unwrap();
    let writer = OutputWriter::new(surface.handle());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let writer = writer.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..LINES {
                    writer.write(&format!("t{t}-{i}\n"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(settled(&writer));

    let text = surface.with_surface(|s| s.text()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), THREADS * LINES);
    for t in 0..THREADS {
        let tag = format!("t{t}-");
        let seen: Vec<usize> = lines
            .iter()
            .filter_map(|l| l.strip_prefix(&tag))
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(seen, (0..LINES).collect::<Vec<_>>());
    }
}

#[test]
fn console_output_follows_prompt_writes() {
    let fx = ConsoleFixture::new(ConsoleConfig::default()).unwrap();
    let console = Arc::clone(fx.console());
    thread::spawn(move || {
        console.write("banner\r\n", Style::Output);
        console.write_line("ready", Style::Output);
        console.write(">>> ", Style::Prompt);
    })
    .join()
    .unwrap();
    assert!(fx.wait_for_text(|t| t.ends_with(">>> ")));
    assert_eq!(fx.text(), "banner\nready\n>>> ");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn surface_text_is_concatenation_of_writes(chunks in prop::collection::vec("[a-z \\n]{0,8}", 1..12)) {
        let surface = SurfaceThread::start(SharedSurface::new()).unwrap();
        let writer = OutputWriter::new(surface.handle());
        for chunk in &chunks {
            writer.write(chunk);
        }
        prop_assert!(settled(&writer));
        let text = surface.with_surface(|s| s.text()).unwrap();
        prop_assert_eq!(text, chunks.concat());
    }
}
