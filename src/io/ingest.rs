//! Snapshot ingest.
//!
//! This module is responsible for turning the pre-aggregated fund snapshot into
//! an immutable in-memory table of `Record`s.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear `LoadError`s, exit code 2)
//! - **Column projection**: extra columns in the snapshot are never read
//! - **Capability detection**: optional dimensions missing from older
//!   snapshots simply disappear from the dashboard
//! - **Separation of concerns**: no filtering logic here

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use polars::prelude::*;

use crate::domain::{
    BASE_COLUMNS, COL_CATEGORIA, COL_FECHA_INF, COL_NOM_ADM, COL_NOMBRE_CORTO,
    COL_PATRIMONIO_NETO_MM, COL_RUN_FM, COL_SERIE, COL_TIPO_FM, COL_VENTA_NETA_MM, Capabilities,
    Dimension, RawRecord, Record,
};
use crate::error::AppError;

/// Loader options.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Optional dimensions the caller insists on. A snapshot lacking their
    /// column fails to load instead of silently dropping the dimension.
    pub required_dimensions: Vec<Dimension>,
}

/// Information about where the table came from.
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub path: PathBuf,
    pub format: SnapshotFormat,
    pub rows_read: usize,
    /// Rows whose `FECHA_INF` could not be parsed into a date.
    pub unparsed_dates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Parquet,
    Csv,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Result<Self, AppError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("parquet") | Some("pq") => Ok(SnapshotFormat::Parquet),
            Some("csv") => Ok(SnapshotFormat::Csv),
            _ => Err(AppError::load(format!(
                "Unsupported snapshot '{}': expected a .parquet or .csv file.",
                path.display()
            ))),
        }
    }
}

/// The loaded table. Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<Record>,
    pub capabilities: Capabilities,
    pub info: SnapshotInfo,
}

impl Dataset {
    /// Build a dataset from already-parsed rows (tests, other front-ends).
    pub fn from_raw(raw: Vec<RawRecord>, capabilities: Capabilities) -> Self {
        let records: Vec<Record> = raw.into_iter().map(Record::from_raw).collect();
        let unparsed_dates = records.iter().filter(|r| r.report_date.is_none()).count();
        Self {
            info: SnapshotInfo {
                path: PathBuf::new(),
                format: SnapshotFormat::Csv,
                rows_read: records.len(),
                unparsed_dates,
            },
            records,
            capabilities,
        }
    }
}

/// Load the snapshot at `path`, reading only the columns the dashboard uses.
pub fn load_dataset(path: &Path, options: &LoadOptions) -> Result<Dataset, AppError> {
    if !path.exists() {
        return Err(AppError::load(format!(
            "Snapshot not found: '{}'. Check that the file exists or pass --data.",
            path.display()
        )));
    }

    let format = SnapshotFormat::from_path(path)?;
    let (raw, capabilities) = match format {
        SnapshotFormat::Parquet => read_parquet(path, options)?,
        SnapshotFormat::Csv => read_csv(path, options)?,
    };

    let dataset = Dataset::from_raw(raw, capabilities);
    let info = SnapshotInfo {
        path: path.to_path_buf(),
        format,
        ..dataset.info
    };

    if info.unparsed_dates > 0 {
        tracing::warn!(
            path = %path.display(),
            rows = info.unparsed_dates,
            "rows with unparsable FECHA_INF are excluded from date filters and charts"
        );
    }
    tracing::info!(
        path = %path.display(),
        rows = info.rows_read,
        fund_type = capabilities.fund_type,
        category = capabilities.category,
        "snapshot loaded"
    );

    Ok(Dataset { info, ..dataset })
}

/// Decide which optional columns to read, failing on required-but-missing ones.
fn resolve_projection(
    has_column: impl Fn(&str) -> bool,
    options: &LoadOptions,
) -> Result<(Vec<&'static str>, Capabilities), AppError> {
    for col in BASE_COLUMNS {
        if !has_column(col) {
            return Err(AppError::load(format!("Missing required column: `{col}`")));
        }
    }

    for dim in &options.required_dimensions {
        for col in dim.columns() {
            if !has_column(col) {
                return Err(AppError::load(format!(
                    "Filter `{}` requires a `{col}` column in the snapshot.",
                    dim.display_name()
                )));
            }
        }
    }

    let capabilities = Capabilities {
        fund_type: has_column(COL_TIPO_FM),
        category: has_column(COL_CATEGORIA),
    };
    Ok((capabilities.columns(), capabilities))
}

fn read_parquet(
    path: &Path,
    options: &LoadOptions,
) -> Result<(Vec<RawRecord>, Capabilities), AppError> {
    let mut lf = LazyFrame::scan_parquet(path, Default::default()).map_err(|e| {
        AppError::load(format!("Failed to open Parquet '{}': {e}", path.display()))
    })?;
    let schema = lf
        .collect_schema()
        .map_err(|e| AppError::load(format!("Failed to read Parquet schema: {e}")))?;

    let (columns, capabilities) = resolve_projection(|c| schema.contains(c), options)?;
    let exprs: Vec<Expr> = columns.iter().map(|c| col(*c)).collect();

    let df = lf
        .select(exprs)
        .collect()
        .map_err(|e| AppError::load(format!("Failed to read Parquet '{}': {e}", path.display())))?;

    let fecha = string_column(&df, COL_FECHA_INF)?;
    let run = string_column(&df, COL_RUN_FM)?;
    let name = string_column(&df, COL_NOMBRE_CORTO)?;
    let adm = string_column(&df, COL_NOM_ADM)?;
    let serie = string_column(&df, COL_SERIE)?;
    let nav = float_column(&df, COL_PATRIMONIO_NETO_MM)?;
    let sales = float_column(&df, COL_VENTA_NETA_MM)?;
    let tipo = if capabilities.fund_type {
        Some(string_column(&df, COL_TIPO_FM)?)
    } else {
        None
    };
    let categoria = if capabilities.category {
        Some(string_column(&df, COL_CATEGORIA)?)
    } else {
        None
    };

    let mut raw = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        raw.push(RawRecord {
            fecha_inf: fecha[i].clone().unwrap_or_default(),
            run_fm: run[i].clone().unwrap_or_default(),
            short_name: name[i].clone(),
            administrator: adm[i].clone(),
            fund_type: tipo.as_ref().and_then(|v| v[i].clone()),
            category: categoria.as_ref().and_then(|v| v[i].clone()),
            series: serie[i].clone(),
            net_assets_mm: nav[i],
            net_sales_mm: sales[i],
        });
    }

    Ok((raw, capabilities))
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, AppError> {
    let casted = df
        .column(name)
        .and_then(|c| c.cast(&DataType::String))
        .map_err(|e| AppError::load(format!("Column `{name}` cannot be read as text: {e}")))?;
    let ca = casted
        .str()
        .map_err(|e| AppError::load(format!("Column `{name}` cannot be read as text: {e}")))?;
    Ok(ca
        .into_iter()
        .map(|v| v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))
        .collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, AppError> {
    let casted = df
        .column(name)
        .and_then(|c| c.cast(&DataType::Float64))
        .map_err(|e| AppError::load(format!("Column `{name}` is not numeric: {e}")))?;
    let ca = casted
        .f64()
        .map_err(|e| AppError::load(format!("Column `{name}` is not numeric: {e}")))?;
    Ok(ca.into_iter().map(|v| v.filter(|x| x.is_finite())).collect())
}

fn read_csv(path: &Path, options: &LoadOptions) -> Result<(Vec<RawRecord>, Capabilities), AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::load(format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::load(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let (_, capabilities) =
        resolve_projection(|c| header_map.contains_key(&normalize_header_name(c)), options)?;

    let mut raw = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, and lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::load(format!("CSV parse error on line {line}: {e}")))?;

        raw.push(RawRecord {
            fecha_inf: get_optional(&record, &header_map, COL_FECHA_INF)
                .unwrap_or_default()
                .to_string(),
            run_fm: get_optional(&record, &header_map, COL_RUN_FM)
                .unwrap_or_default()
                .to_string(),
            short_name: get_optional(&record, &header_map, COL_NOMBRE_CORTO).map(str::to_string),
            administrator: get_optional(&record, &header_map, COL_NOM_ADM).map(str::to_string),
            fund_type: capabilities
                .fund_type
                .then(|| get_optional(&record, &header_map, COL_TIPO_FM).map(str::to_string))
                .flatten(),
            category: capabilities
                .category
                .then(|| get_optional(&record, &header_map, COL_CATEGORIA).map(str::to_string))
                .flatten(),
            series: get_optional(&record, &header_map, COL_SERIE).map(str::to_string),
            net_assets_mm: parse_opt_f64(get_optional(&record, &header_map, COL_PATRIMONIO_NETO_MM)),
            net_sales_mm: parse_opt_f64(get_optional(&record, &header_map, COL_VENTA_NETA_MM)),
        });
    }

    Ok((raw, capabilities))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Our own exports (and Excel) prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_optional<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Option<&'a str> {
    let idx = header_map.get(&normalize_header_name(name))?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_opt_f64(s: Option<&str>) -> Option<f64> {
    let v = s?.parse::<f64>().ok()?;
    if v.is_finite() { Some(v) } else { None }
}
