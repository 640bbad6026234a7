//! CSV-backed reference data.
//!
//! This crate implements the `pinbot-core` storage ports over plain CSV files:
//! the master PIN directory (loaded once, read-only afterwards) and the partner
//! exclusion feeds plus the hard-block list (re-read on every query, since they
//! are refreshed out-of-band).

use std::{
    collections::HashMap,
    fmt::Display,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use pinbot_core::{
    config::{DirectoryColumns, ExclusionSourceConfig},
    domain::{AreaRecord, DeliveryFlag, ExclusionEntry, HardBlockEntry, MatchMode, PostalCode},
    errors::Error,
    ports::{CodeDirectory, ExclusionSource, HardBlockList},
    Result,
};

pub const PINCODE_COLUMN: &str = "pincode";
pub const AREA_COLUMN: &str = "area";

/// Blocking reads per feed that may still be running at once.
pub const MAX_READS_IN_FLIGHT: usize = 4;

fn csv_err(path: &Path, e: impl Display) -> Error {
    Error::Csv {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Header lookup after trimming and lowercasing, like the cleaned exports expect.
fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    let wanted = name.trim().to_lowercase();
    headers
        .iter()
        .position(|h| h.trim().to_lowercase() == wanted)
}

fn require_column(path: &Path, headers: &csv::StringRecord, name: &str) -> Result<usize> {
    column_index(headers, name).ok_or_else(|| csv_err(path, format!("missing column {name:?}")))
}

fn field(record: &csv::StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("").trim()
}

fn read_limit(n: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(n.max(1)))
}

/// Runs `read` on the blocking pool while holding one of the source's permits.
///
/// A blocking read cannot be cancelled: when the aggregator's timeout fires the
/// query is abandoned but the file read keeps going until it finishes. The
/// permit travels into the closure, so a feed stuck on a slow mount holds at
/// most `MAX_READS_IN_FLIGHT` pool threads and further queries fail fast.
async fn read_blocking<T, F>(permits: &Arc<Semaphore>, source_id: &str, read: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let unavailable = |reason: String| Error::Source {
        source_id: source_id.to_string(),
        reason,
    };
    let permit = permits
        .clone()
        .try_acquire_owned()
        .map_err(|_| unavailable("previous reads still in flight".to_string()))?;
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        read()
    })
    .await
    .map_err(|e| unavailable(e.to_string()))?
}

// ============== Master directory ==============

/// In-memory PIN → areas table. Rows keep their file order within a code.
#[derive(Debug, Default)]
pub struct CsvDirectory {
    by_code: HashMap<String, Vec<AreaRecord>>,
    rows: usize,
}

impl CsvDirectory {
    pub fn load(path: &Path, columns: &DirectoryColumns) -> Result<Self> {
        let file = File::open(path)?;
        let dir = Self::from_reader(path, file, columns)?;
        tracing::info!(
            path = %path.display(),
            codes = dir.code_count(),
            rows = dir.row_count(),
            "loaded pincode directory"
        );
        Ok(dir)
    }

    /// `label` is only used in error messages.
    pub fn from_reader<R: Read>(
        label: &Path,
        reader: R,
        columns: &DirectoryColumns,
    ) -> Result<Self> {
        let mut rdr = csv_reader(reader);
        let headers = rdr.headers().map_err(|e| csv_err(label, e))?.clone();

        let code_idx = require_column(label, &headers, &columns.code)?;
        let area_idx = require_column(label, &headers, &columns.area)?;
        let flag_idx = require_column(label, &headers, &columns.flag)?;
        let city_idx = require_column(label, &headers, &columns.city)?;
        let state_idx = require_column(label, &headers, &columns.state)?;

        let mut dir = Self::default();
        for record in rdr.records() {
            let record = record.map_err(|e| csv_err(label, e))?;
            let code = field(&record, code_idx);
            if code.is_empty() {
                continue;
            }
            dir.by_code
                .entry(code.to_string())
                .or_default()
                .push(AreaRecord {
                    postal_code: code.to_string(),
                    area_name: field(&record, area_idx).to_string(),
                    delivery_flag: DeliveryFlag::parse(field(&record, flag_idx)),
                    city: field(&record, city_idx).to_string(),
                    state: field(&record, state_idx).to_string(),
                });
            dir.rows += 1;
        }
        Ok(dir)
    }

    pub fn code_count(&self) -> usize {
        self.by_code.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }
}

#[async_trait]
impl CodeDirectory for CsvDirectory {
    async fn lookup_areas(&self, code: &PostalCode) -> Result<Vec<AreaRecord>> {
        Ok(self.by_code.get(code.as_str()).cloned().unwrap_or_default())
    }
}

// ============== Negative-area feeds ==============

/// A partner exclusion feed stored as CSV with `pincode` and (for area feeds)
/// `area` columns.
#[derive(Clone, Debug)]
pub struct CsvExclusionSource {
    id: String,
    path: PathBuf,
    mode: MatchMode,
    permits: Arc<Semaphore>,
}

impl CsvExclusionSource {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, mode: MatchMode) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            mode,
            permits: read_limit(MAX_READS_IN_FLIGHT),
        }
    }

    pub fn with_read_limit(mut self, n: usize) -> Self {
        self.permits = read_limit(n);
        self
    }

    pub fn from_config(cfg: &ExclusionSourceConfig) -> Self {
        Self::new(cfg.id.clone(), cfg.path.clone(), cfg.mode)
    }

    fn read(&self, code: &PostalCode) -> Result<Vec<ExclusionEntry>> {
        let file = File::open(&self.path).map_err(|e| self.unavailable(e))?;
        let mut rdr = csv_reader(file);
        let headers = rdr.headers().map_err(|e| self.unavailable(e))?.clone();

        let code_idx =
            require_column(&self.path, &headers, PINCODE_COLUMN).map_err(|e| self.unavailable(e))?;
        let area_idx = match self.mode {
            MatchMode::CodeOnly => None,
            MatchMode::CodeAndArea => Some(
                require_column(&self.path, &headers, AREA_COLUMN)
                    .map_err(|e| self.unavailable(e))?,
            ),
        };

        let mut out = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| self.unavailable(e))?;
            if field(&record, code_idx) != code.as_str() {
                continue;
            }
            let area_name = area_idx
                .map(|idx| field(&record, idx))
                .filter(|a| !a.is_empty())
                .map(str::to_string);
            out.push(ExclusionEntry {
                source_id: self.id.clone(),
                postal_code: code.as_str().to_string(),
                area_name,
            });
        }
        Ok(out)
    }

    fn unavailable(&self, e: impl Display) -> Error {
        Error::Source {
            source_id: self.id.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl ExclusionSource for CsvExclusionSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn match_mode(&self) -> MatchMode {
        self.mode
    }

    async fn query(&self, code: &PostalCode) -> Result<Vec<ExclusionEntry>> {
        let this = self.clone();
        let code = code.clone();
        read_blocking(&self.permits, &self.id, move || this.read(&code)).await
    }
}

// ============== Hard-block list ==============

/// "Cannot process" list stored as CSV with a `pincode` column.
#[derive(Clone, Debug)]
pub struct CsvHardBlockList {
    id: String,
    path: PathBuf,
    permits: Arc<Semaphore>,
}

impl CsvHardBlockList {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            permits: read_limit(MAX_READS_IN_FLIGHT),
        }
    }

    fn read(&self) -> Result<Vec<HardBlockEntry>> {
        let file = File::open(&self.path).map_err(|e| self.unavailable(e))?;
        let mut rdr = csv_reader(file);
        let headers = rdr.headers().map_err(|e| self.unavailable(e))?.clone();
        let code_idx =
            require_column(&self.path, &headers, PINCODE_COLUMN).map_err(|e| self.unavailable(e))?;

        let mut out = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| self.unavailable(e))?;
            let code = field(&record, code_idx);
            if !code.is_empty() {
                out.push(HardBlockEntry {
                    postal_code: code.to_string(),
                });
            }
        }
        Ok(out)
    }

    fn unavailable(&self, e: impl Display) -> Error {
        Error::Source {
            source_id: self.id.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl HardBlockList for CsvHardBlockList {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_hard_blocked(&self, code: &PostalCode) -> Result<bool> {
        let this = self.clone();
        let entries = read_blocking(&self.permits, &self.id, move || this.read()).await?;
        Ok(entries.iter().any(|e| e.postal_code == code.as_str()))
    }
}
