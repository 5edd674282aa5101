//! Export the filtered subset to CSV.
//!
//! The export is meant to open cleanly in regional spreadsheet tools:
//! UTF-8 with a byte-order mark, comma-delimited, source column names in the
//! header, raw numeric values, no index column.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::{
    COL_CATEGORIA, COL_FECHA_INF, COL_NOM_ADM, COL_NOMBRE_CORTO, COL_PATRIMONIO_NETO_MM,
    COL_RUN_FM, COL_SERIE, COL_TIPO_FM, COL_VENTA_NETA_MM, Capabilities, Record,
};
use crate::error::AppError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Serialize `subset` as CSV bytes, refusing subsets larger than `row_cap`.
///
/// The cap is a hard reject: nothing is produced when it is exceeded.
pub fn export_rows(
    subset: &[&Record],
    capabilities: Capabilities,
    row_cap: usize,
) -> Result<Vec<u8>, AppError> {
    if subset.len() > row_cap {
        tracing::warn!(rows = subset.len(), cap = row_cap, "export refused: row cap exceeded");
        return Err(AppError::export_too_large(subset.len(), row_cap));
    }

    let columns = capabilities.columns();
    let mut writer = csv::WriterBuilder::new().from_writer(UTF8_BOM.to_vec());

    writer
        .write_record(&columns)
        .map_err(|e| AppError::io(format!("Failed to write export CSV header: {e}")))?;

    for record in subset {
        let row: Vec<String> = columns.iter().map(|c| field(record, c)).collect();
        writer
            .write_record(&row)
            .map_err(|e| AppError::io(format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::io(format!("Failed to finish export CSV: {e}")))
}

/// Write export bytes to `path`.
pub fn write_export(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    file.write_all(bytes)
        .map_err(|e| AppError::io(format!("Failed to write export CSV '{}': {e}", path.display())))?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "export written");
    Ok(())
}

fn field(record: &Record, column: &str) -> String {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    let num = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    match column {
        COL_FECHA_INF => record.fecha_inf.clone(),
        COL_RUN_FM => record.run_fm.clone(),
        COL_NOMBRE_CORTO => text(&record.short_name),
        COL_NOM_ADM => text(&record.administrator),
        COL_TIPO_FM => text(&record.fund_type),
        COL_CATEGORIA => text(&record.category),
        COL_SERIE => text(&record.series),
        COL_PATRIMONIO_NETO_MM => num(record.net_assets_mm),
        COL_VENTA_NETA_MM => num(record.net_sales_mm),
        _ => String::new(),
    }
}
