use std::fs::File;
use std::io::Write;

use cage_config::{Calibration, CalibrationRow, load_calibration_csv};
use rstest::rstest;
use tempfile::tempdir;

fn row(raw: i64, grams: f32) -> CalibrationRow {
    CalibrationRow { raw, grams }
}

#[rstest]
fn two_point_fit_gives_slope_and_zero() {
    let c = Calibration::from_rows(&[row(1000, 0.0), row(3000, 1.0)]).unwrap();
    assert!((c.gain_g_per_count - 0.0005).abs() < 1e-9);
    assert_eq!(c.zero_counts, 1000);
}

#[rstest]
fn least_squares_over_noisy_points() {
    let rows = [row(0, 0.1), row(100, 9.9), row(200, 20.1), row(300, 29.9)];
    let c = Calibration::from_rows(&rows).unwrap();
    assert!((c.gain_g_per_count - 0.1).abs() < 0.005);
}

#[rstest]
#[case(vec![row(5, 1.0)], "at least two rows")]
#[case(vec![row(5, 1.0), row(5, 2.0)], "duplicate raw")]
#[case(vec![row(5, 1.0), row(10, 1.0)], "unusable slope")]
fn rejects_degenerate_rows(#[case] rows: Vec<CalibrationRow>, #[case] needle: &str) {
    let err = Calibration::from_rows(&rows).unwrap_err();
    assert!(err.to_string().contains(needle), "got: {err}");
}

#[rstest]
fn loads_csv_with_exact_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cal.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "raw,grams").unwrap();
    writeln!(f, "8400, 0.0").unwrap();
    writeln!(f, "112566, 50.0").unwrap();
    drop(f);

    let c = load_calibration_csv(&path).unwrap();
    assert!(c.gain_g_per_count > 0.00047 && c.gain_g_per_count < 0.00049);
}

#[rstest]
fn wrong_headers_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cal.csv");
    std::fs::write(&path, "counts,g\n1,2\n3,4\n").unwrap();
    let err = load_calibration_csv(&path).unwrap_err();
    assert!(err.to_string().contains("must have headers 'raw,grams'"));
}
