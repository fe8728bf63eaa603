use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU32, Ordering},
};
use std::thread;
use std::time::Duration;

use cage_hardware::error::HwError;
use cage_hardware::util::{pulse, wait_for_level};
use rstest::rstest;

#[rstest]
#[case(true)]
#[case(false)]
fn wait_returns_once_line_flips(#[case] want: bool) {
    let level = Arc::new(AtomicBool::new(!want));
    let level_bg = level.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        level_bg.store(want, Ordering::Relaxed);
    });

    let res = wait_for_level(
        || level.load(Ordering::Relaxed),
        want,
        Duration::from_millis(500),
        Duration::from_micros(200),
    );
    assert!(res.is_ok(), "expected success, got {res:?}");
}

#[test]
fn wait_times_out_on_stuck_line() {
    let err = wait_for_level(
        || true,
        false,
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");

    match err {
        HwError::DataReadyTimeout => {}
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn pulse_leaves_line_low() {
    let transitions = AtomicU32::new(0);
    let mut last = None;
    pulse(
        |high| {
            transitions.fetch_add(1, Ordering::Relaxed);
            last = Some(high);
        },
        Duration::from_micros(10),
    );
    assert_eq!(transitions.load(Ordering::Relaxed), 2);
    assert_eq!(last, Some(false));
}
