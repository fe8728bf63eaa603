//! Animal registry: durable per-animal state keyed by RFID tag.
//!
//! The on-disk table is tab-separated, one animal per row, no header:
//!
//! ```text
//! tag  name  treatment  last_seen_day  day_index  drug_drops  water_drops  required_drug_drops  reference_weight_g
//! ```
//!
//! Rows are added by hand while the cage runs, so every `load` reads the
//! table afresh. `save` re-reads, replaces the one row and writes the whole
//! table through a temp file and rename; a single writer is assumed. Every
//! other line, comments and blank lines included, is written back as read,
//! and columns past the ninth are kept on the saved row too.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use cage_traits::TagId;
use csv::StringRecord;

use crate::error::{CageError, Result};
use crate::record::{AnimalRecord, Treatment};

pub const COLUMNS: usize = 9;

pub trait AnimalStore {
    /// `CageError::UnknownTag` when no row carries `tag`.
    fn load(&mut self, tag: TagId) -> Result<AnimalRecord>;
    fn save(&mut self, record: &AnimalRecord) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct AnimalRegistry {
    path: PathBuf,
}

impl AnimalRegistry {
    /// Opens an existing table; a missing file is an error (registration is manual).
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let registry = Self { path: path.into() };
        registry.records()?;
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> Result<Vec<AnimalRecord>> {
        let text = fs::read_to_string(&self.path).map_err(|e| self.err(e))?;
        parse_table(&text).map_err(|msg| CageError::Registry {
            path: self.path.display().to_string(),
            msg,
        })
    }

    fn err(&self, e: impl std::fmt::Display) -> CageError {
        CageError::Registry {
            path: self.path.display().to_string(),
            msg: e.to_string(),
        }
    }

    fn write_table(&self, bytes: &[u8]) -> Result<()> {
        let tmp = self.path.with_extension("new");
        {
            let mut f = fs::File::create(&tmp).map_err(|e| self.err(e))?;
            f.write_all(bytes).map_err(|e| self.err(e))?;
            f.sync_all().map_err(|e| self.err(e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.err(e))
    }
}

impl AnimalStore for AnimalRegistry {
    fn load(&mut self, tag: TagId) -> Result<AnimalRecord> {
        self.records()?
            .into_iter()
            .find(|r| r.tag == tag)
            .ok_or(CageError::UnknownTag(tag))
    }

    fn save(&mut self, record: &AnimalRecord) -> Result<()> {
        let text = fs::read_to_string(&self.path).map_err(|e| self.err(e))?;
        parse_table(&text).map_err(|msg| CageError::Registry {
            path: self.path.display().to_string(),
            msg,
        })?;
        let table = replace_row(&text, record).unwrap_or_else(|| {
            tracing::warn!(tag = %record.tag, name = %record.name, "row vanished from registry, appending");
            let mut t = text.clone();
            if !t.is_empty() && !t.ends_with('\n') {
                t.push('\n');
            }
            t.push_str(&render_row(record));
            t.push('\n');
            t
        });
        self.write_table(table.as_bytes())?;
        tracing::debug!(tag = %record.tag, name = %record.name, "registry row saved");
        Ok(())
    }
}

/// Parses the whole table; the error names the offending line.
pub fn parse_table(text: &str) -> std::result::Result<Vec<AnimalRecord>, String> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .comment(Some(b'#'))
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec.map_err(|e| e.to_string())?;
        let line = rec.position().map_or(0, |p| p.line());
        if rec.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(parse_row(&rec).map_err(|e| format!("line {line}: {e}"))?);
    }
    Ok(rows)
}

pub fn parse_row(rec: &StringRecord) -> std::result::Result<AnimalRecord, String> {
    if rec.len() < COLUMNS {
        return Err(format!("expected {COLUMNS} columns, found {}", rec.len()));
    }
    let field = |i: usize| rec.get(i).unwrap_or_default().trim();
    fn num<T: std::str::FromStr>(s: &str, what: &str) -> std::result::Result<T, String> {
        s.parse::<T>().map_err(|_| format!("invalid {what} {s:?}"))
    }

    let reference_weight_g: f32 = num(field(8), "reference weight")?;
    if !reference_weight_g.is_finite() {
        return Err("reference weight must be finite".to_string());
    }
    Ok(AnimalRecord {
        tag: num(field(0), "tag")?,
        name: field(1).to_string(),
        treatment: Treatment::parse(field(2)),
        last_seen_day: num(field(3), "last seen day")?,
        day_index: num(field(4), "day index")?,
        drug_drops_today: num(field(5), "drug drops")?,
        water_drops_today: num(field(6), "water drops")?,
        required_drug_drops_today: num(field(7), "required drug drops")?,
        reference_weight_g,
        extra: rec.iter().skip(COLUMNS).map(str::to_string).collect(),
    })
}

fn fields(r: &AnimalRecord) -> Vec<String> {
    let mut f = vec![
        r.tag.to_string(),
        r.name.clone(),
        r.treatment.to_string(),
        r.last_seen_day.to_string(),
        r.day_index.to_string(),
        r.drug_drops_today.to_string(),
        r.water_drops_today.to_string(),
        r.required_drug_drops_today.to_string(),
        r.reference_weight_g.to_string(),
    ];
    f.extend(r.extra.iter().cloned());
    f
}

/// One table line for `r`, without the newline.
pub fn render_row(r: &AnimalRecord) -> String {
    fields(r).join("\t")
}

/// Tag in the first column of a data line; `None` for comments, blank lines
/// and anything else that is not a row.
fn line_tag(line: &str) -> Option<TagId> {
    if line.starts_with('#') {
        return None;
    }
    line.split('\t').next()?.parse().ok()
}

/// `text` with the first row carrying `record.tag` replaced; `None` when no
/// row matches.
fn replace_row(text: &str, record: &AnimalRecord) -> Option<String> {
    let mut out = String::with_capacity(text.len() + 16);
    let mut found = false;
    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        if !found && line_tag(body) == Some(record.tag) {
            out.push_str(&render_row(record));
            out.push_str(&line[body.len()..]);
            found = true;
        } else {
            out.push_str(line);
        }
    }
    found.then_some(out)
}

pub fn render_table(rows: &[AnimalRecord]) -> std::result::Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for r in rows {
        wtr.write_record(fields(r))?;
    }
    wtr.into_inner().map_err(|e| e.into_error().into())
}
