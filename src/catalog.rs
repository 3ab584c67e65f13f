//! Intensity labels for motion clips, indexed by clip position.
//!
//! The catalog is a small CSV table with an `index` column (clip position)
//! and an `m` column holding `h`, `m` or `l`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::analyzer::intensity::Intensity;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Required columns `index` and `m` not found (available: {0:?})")]
    MissingColumns(Vec<String>),
    #[error("Line {line}: invalid index {value:?}")]
    BadIndex { line: usize, value: String },
    #[error("Line {line}: index {value:?} exceeds {max}")]
    IndexTooLarge {
        line: usize,
        value: String,
        max: usize,
    },
}

/// Largest clip position a catalog may name.
pub const MAX_CATALOG_INDEX: usize = 100_000;

/// Source of per-clip intensity labels.
pub trait IntensityCatalog {
    /// Labels ordered by clip position. Empty means no usable catalog.
    fn load(&self) -> Result<Vec<Intensity>, CatalogError>;
}

impl IntensityCatalog for Vec<Intensity> {
    fn load(&self) -> Result<Vec<Intensity>, CatalogError> {
        Ok(self.clone())
    }
}

/// CSV-file-backed catalog.
#[derive(Debug, Clone)]
pub struct CsvIntensityCatalog {
    path: PathBuf,
}

impl CsvIntensityCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IntensityCatalog for CsvIntensityCatalog {
    fn load(&self) -> Result<Vec<Intensity>, CatalogError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| CatalogError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let labels = parse_catalog(&text)?;
        log::info!(
            "Loaded {} clip intensity labels from {}",
            labels.len(),
            self.path.display()
        );
        Ok(labels)
    }
}

fn parse_label(raw: &str) -> Intensity {
    match raw.trim().to_lowercase().as_str() {
        "h" => Intensity::High,
        "l" => Intensity::Low,
        _ => Intensity::Medium,
    }
}

fn split_row(line: &str) -> Vec<&str> {
    line.split(',').map(|cell| cell.trim().trim_matches('"')).collect()
}

/// Parse catalog CSV text. Unknown labels and gaps in the index range are
/// labeled Medium. Empty input gives an empty catalog.
pub fn parse_catalog(text: &str) -> Result<Vec<Intensity>, CatalogError> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns = split_row(header);
    let index_col = columns.iter().position(|c| *c == "index");
    let label_col = columns.iter().position(|c| *c == "m");
    let (Some(index_col), Some(label_col)) = (index_col, label_col) else {
        return Err(CatalogError::MissingColumns(
            columns.iter().map(|c| c.to_string()).collect(),
        ));
    };

    let mut by_index: BTreeMap<usize, Intensity> = BTreeMap::new();
    for (line_no, line) in lines {
        let cells = split_row(line);
        let raw_index = cells.get(index_col).copied().unwrap_or("");
        let index = parse_index(raw_index).ok_or_else(|| CatalogError::BadIndex {
            line: line_no + 1,
            value: raw_index.to_string(),
        })?;
        if index > MAX_CATALOG_INDEX {
            return Err(CatalogError::IndexTooLarge {
                line: line_no + 1,
                value: raw_index.to_string(),
                max: MAX_CATALOG_INDEX,
            });
        }
        let label = cells.get(label_col).copied().map(parse_label).unwrap_or(Intensity::Medium);
        by_index.insert(index, label);
    }

    let Some(&max_index) = by_index.keys().next_back() else {
        return Ok(Vec::new());
    };
    Ok((0..=max_index)
        .map(|i| by_index.get(&i).copied().unwrap_or(Intensity::Medium))
        .collect())
}

/// Accepts `3` as well as spreadsheet-style `3.0`.
fn parse_index(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0 && v.fract() == 0.0)
            .map(|v| v as usize)
    })
}
