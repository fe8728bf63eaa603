//! Load-cell calibration from a `raw,grams` CSV.
//!
//! Only the slope matters at runtime: the zero point is re-established by
//! taring at startup and whenever the empty cage is stable.
use serde::Deserialize;

/// Calibration CSV schema.
///
/// Expected headers:
/// raw,grams
///
/// Example:
/// raw,grams
/// 8400,0.0
/// 112566,50.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub raw: i64,
    pub grams: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub gain_g_per_count: f32,
    /// Raw reading at 0 g when the rows were taken (informational)
    pub zero_counts: i64,
}

impl Calibration {
    /// Least-squares fit of grams = gain * raw + b over all rows.
    pub fn from_rows(rows: &[CalibrationRow]) -> eyre::Result<Self> {
        if rows.len() < 2 {
            eyre::bail!("calibration requires at least two rows, got {}", rows.len());
        }
        let mut seen = std::collections::BTreeSet::new();
        for (i, r) in rows.iter().enumerate() {
            if !seen.insert(r.raw) {
                eyre::bail!("calibration rows have duplicate raw value {} (row {})", r.raw, i + 2);
            }
            if !r.grams.is_finite() {
                eyre::bail!("calibration row {} has non-finite grams", i + 2);
            }
        }

        let n = rows.len() as f64;
        let mean_x = rows.iter().map(|r| r.raw as f64).sum::<f64>() / n;
        let mean_y = rows.iter().map(|r| f64::from(r.grams)).sum::<f64>() / n;
        let (sxx, sxy) = rows.iter().fold((0.0f64, 0.0f64), |(sxx, sxy), r| {
            let x = r.raw as f64 - mean_x;
            let y = f64::from(r.grams) - mean_y;
            (sxx + x * x, sxy + x * y)
        });
        let gain = sxy / sxx;
        if !gain.is_finite() || gain == 0.0 {
            eyre::bail!("calibration produced an unusable slope ({gain})");
        }
        let intercept = mean_y - gain * mean_x;
        let zero = -intercept / gain;
        if !zero.is_finite() {
            eyre::bail!("calibration produced invalid tare baseline");
        }

        Ok(Calibration {
            gain_g_per_count: gain as f32,
            zero_counts: zero.round() as i64,
        })
    }
}

pub fn load_calibration_csv(path: &std::path::Path) -> eyre::Result<Calibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<&str> = headers.iter().collect();
    if actual != ["raw", "grams"] {
        eyre::bail!(
            "calibration CSV must have headers 'raw,grams', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }

    Calibration::from_rows(&rows)
}
