//! Append-only experiment logs.
//!
//! Layout under the data directory, one folder per animal:
//!
//! ```text
//! <data>/<name>/<name>_data.txt                  timestamp \t event code
//! <data>/<name>/<name>_summary.txt               one row per completed day
//! <data>/<name>/Weights/<name>_weights_day<N>.txt  timestamp \t grams
//! ```
//!
//! plus a cage-wide tare log. Files are opened in append mode per write so a
//! crash loses at most the line in flight.
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{CageError, Result};
use crate::util::{format_timestamp, parse_timestamp};
use crate::zeroing::{ZeroOutcome, ZeroReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Entered,
    Exited,
    Touch,
    WaterDrop,
    DrugDrop,
}

impl EventKind {
    /// Two-digit code used in the event log.
    pub fn code(self) -> &'static str {
        match self {
            EventKind::Entered => "00",
            EventKind::Touch => "01",
            EventKind::WaterDrop => "02",
            EventKind::DrugDrop => "03",
            EventKind::Exited => "99",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightSample {
    pub at: NaiveDateTime,
    pub grams: f32,
}

/// Counters of a finished experiment day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySummary {
    pub day_index: u32,
    pub water_drops: u32,
    pub drug_drops: u32,
    pub required_drug_drops: u32,
    /// `None` when no sample fell in the plausible range.
    pub weight_g: Option<f32>,
}

pub trait Recorder {
    fn record_event(&mut self, animal: &str, at: NaiveDateTime, kind: EventKind) -> Result<()>;
    fn record_summary(&mut self, animal: &str, summary: &DailySummary) -> Result<()>;
    fn append_weight(&mut self, animal: &str, day_index: u32, sample: WeightSample) -> Result<()>;
    /// Samples logged for `day_index`; a missing file reads as empty.
    fn read_weights(&self, animal: &str, day_index: u32) -> Result<Vec<WeightSample>>;
    fn record_tare(&mut self, report: &ZeroReport) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileRecorder {
    data_dir: PathBuf,
    tare_log: PathBuf,
}

impl FileRecorder {
    pub fn new(data_dir: impl Into<PathBuf>, tare_log: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            tare_log: tare_log.into(),
        }
    }

    pub fn events_path(&self, animal: &str) -> PathBuf {
        self.data_dir.join(animal).join(format!("{animal}_data.txt"))
    }

    pub fn summary_path(&self, animal: &str) -> PathBuf {
        self.data_dir
            .join(animal)
            .join(format!("{animal}_summary.txt"))
    }

    pub fn weights_path(&self, animal: &str, day_index: u32) -> PathBuf {
        self.data_dir
            .join(animal)
            .join("Weights")
            .join(format!("{animal}_weights_day{day_index}.txt"))
    }

    pub fn tare_log_path(&self) -> &Path {
        &self.tare_log
    }
}

fn append(path: &Path, text: &str) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    f.write_all(text.as_bytes())?;
    Ok(())
}

fn parse_weight_line(line: &str) -> Option<WeightSample> {
    let (ts, grams) = line.split_once('\t')?;
    Some(WeightSample {
        at: parse_timestamp(ts)?,
        grams: grams.trim().parse().ok()?,
    })
}

impl Recorder for FileRecorder {
    fn record_event(&mut self, animal: &str, at: NaiveDateTime, kind: EventKind) -> Result<()> {
        append(
            &self.events_path(animal),
            &format!("{}\t{}\n", format_timestamp(&at), kind.code()),
        )
    }

    fn record_summary(&mut self, animal: &str, s: &DailySummary) -> Result<()> {
        let path = self.summary_path(animal);
        let mut text = String::new();
        if !path.exists() {
            text.push_str(&format!("Summary file for {animal}\n\n"));
            text.push_str(
                "Day\tTotal Drops\tWater Drops\tDrug Drops\tRequired Drug Drops\tAverage Weight\n",
            );
        }
        let weight = s
            .weight_g
            .map_or_else(|| "NA".to_string(), |g| format!("{g:.1}"));
        text.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\n",
            s.day_index,
            s.water_drops + s.drug_drops,
            s.water_drops,
            s.drug_drops,
            s.required_drug_drops,
            weight
        ));
        append(&path, &text)
    }

    fn append_weight(&mut self, animal: &str, day_index: u32, sample: WeightSample) -> Result<()> {
        append(
            &self.weights_path(animal, day_index),
            &format!("{}\t{}\n", format_timestamp(&sample.at), sample.grams),
        )
    }

    fn read_weights(&self, animal: &str, day_index: u32) -> Result<Vec<WeightSample>> {
        let path = self.weights_path(animal, day_index);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CageError::Io(format!("{}: {e}", path.display()))),
        };
        let mut skipped = 0usize;
        let samples: Vec<_> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| {
                let s = parse_weight_line(l);
                if s.is_none() {
                    skipped += 1;
                }
                s
            })
            .collect();
        if skipped > 0 {
            tracing::warn!(animal, day_index, skipped, "malformed weight lines ignored");
        }
        Ok(samples)
    }

    fn record_tare(&mut self, r: &ZeroReport) -> Result<()> {
        let mut text = format!("{}\n", format_timestamp(&r.at));
        for s in &r.samples {
            text.push_str(&format!("{s}\n"));
        }
        let line = match r.outcome {
            ZeroOutcome::Tared => format!("Scale zeroed. Mean weight = {:.2}\n", r.mean_g),
            ZeroOutcome::Unstable => format!(
                "Not zeroed, sample variability too high. Mean weight = {:.2}\n",
                r.mean_g
            ),
            ZeroOutcome::RebootRequested => {
                "New day in the cage and low scale variability. Automatic reboot triggered.\n"
                    .to_string()
            }
        };
        text.push_str(&line);
        append(&self.tare_log, &text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn events_use_two_digit_codes() {
        let dir = tempdir().unwrap();
        let mut rec = FileRecorder::new(dir.path(), dir.path().join("tare.txt"));
        rec.record_event("M1", at(9, 0), EventKind::Entered).unwrap();
        rec.record_event("M1", at(9, 1), EventKind::DrugDrop).unwrap();
        rec.record_event("M1", at(9, 2), EventKind::Exited).unwrap();

        let text = fs::read_to_string(rec.events_path("M1")).unwrap();
        assert_eq!(
            text,
            "2024-03-01 09:00:00.000000\t00\n\
             2024-03-01 09:01:00.000000\t03\n\
             2024-03-01 09:02:00.000000\t99\n"
        );
    }

    #[test]
    fn summary_header_written_once() {
        let dir = tempdir().unwrap();
        let mut rec = FileRecorder::new(dir.path(), dir.path().join("tare.txt"));
        let mut s = DailySummary {
            day_index: 0,
            water_drops: 7,
            drug_drops: 3,
            required_drug_drops: 50,
            weight_g: Some(25.3),
        };
        rec.record_summary("M1", &s).unwrap();
        s.day_index = 1;
        s.weight_g = None;
        rec.record_summary("M1", &s).unwrap();

        let text = fs::read_to_string(rec.summary_path("M1")).unwrap();
        assert_eq!(text.matches("Summary file for M1").count(), 1);
        assert!(text.contains("0\t10\t7\t3\t50\t25.3\n"), "{text}");
        assert!(text.ends_with("1\t10\t7\t3\t50\tNA\n"), "{text}");
    }

    #[test]
    fn weights_read_back_and_skip_junk() {
        let dir = tempdir().unwrap();
        let mut rec = FileRecorder::new(dir.path(), dir.path().join("tare.txt"));
        assert!(rec.read_weights("M1", 4).unwrap().is_empty());

        rec.append_weight("M1", 4, WeightSample { at: at(10, 0), grams: 25.1 })
            .unwrap();
        append(&rec.weights_path("M1", 4), "garbage\n\n").unwrap();
        rec.append_weight("M1", 4, WeightSample { at: at(10, 1), grams: 24.9 })
            .unwrap();

        let w = rec.read_weights("M1", 4).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].at, at(10, 0));
        assert!((w[1].grams - 24.9).abs() < 1e-6);
        assert!(rec.read_weights("M1", 5).unwrap().is_empty());
    }

    #[test]
    fn tare_log_records_samples_and_outcome() {
        let dir = tempdir().unwrap();
        let tare = dir.path().join("logs").join("tare.txt");
        let mut rec = FileRecorder::new(dir.path(), &tare);
        rec.record_tare(&ZeroReport {
            at: at(3, 0),
            samples: vec![0.5, 0.25],
            mean_g: 0.375,
            outcome: ZeroOutcome::Unstable,
        })
        .unwrap();
        let text = fs::read_to_string(&tare).unwrap();
        assert!(text.starts_with("2024-03-01 03:00:00.000000\n0.5\n0.25\n"));
        assert!(text.contains("Not zeroed"));
    }
}
