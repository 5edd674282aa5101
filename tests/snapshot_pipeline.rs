use std::fs;
use std::path::Path;

use ffmm_dash::app::pipeline::{ViewConfig, build_view, export_filtered};
use ffmm_dash::domain::{Dimension, FilterState, Measure, Selection};
use ffmm_dash::error::ErrorKind;
use ffmm_dash::io::{LoadOptions, SnapshotCache, SnapshotFormat, load_dataset};
use polars::prelude::*;
use pretty_assertions::assert_eq;

const CSV_SNAPSHOT: &str = "\u{feff}FECHA_INF,RUN_FM,Nombre_Corto,NOM_ADM,SERIE,PATRIMONIO_NETO_MM,VENTA_NETA_MM,EXTRA
20240102,8001,AHORRO,ADM UNO,A,100,10,x
20240102,8001,AHORRO,ADM UNO,B,50,-4,x
20240103,8001,AHORRO,ADM UNO,A,110,5,x
20240102,900,RENTA,ADM DOS,A,300,0,x
20240103,900,RENTA,ADM DOS,A,,2,x
bad-date,900,RENTA,ADM DOS,A,1,1,x
";

fn view_config() -> ViewConfig {
    ViewConfig {
        rank_measure: Measure::NetAssets,
        top_n: 10,
    }
}

fn write_csv(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("snapshot.csv");
    fs::write(&path, CSV_SNAPSHOT).unwrap();
    path
}

#[test]
fn csv_snapshot_loads_and_builds_a_view() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path());

    let dataset = load_dataset(&path, &LoadOptions::default()).unwrap();
    assert_eq!(dataset.records.len(), 6);
    assert_eq!(dataset.info.format, SnapshotFormat::Csv);
    assert_eq!(dataset.info.unparsed_dates, 1);
    assert!(!dataset.capabilities.fund_type);
    assert!(!dataset.capabilities.category);

    let view = build_view(&dataset, &FilterState::new(), view_config());
    let dims: Vec<Dimension> = view.cascade.levels.iter().map(|l| l.dimension).collect();
    assert_eq!(dims, vec![Dimension::Administrator, Dimension::Fund, Dimension::Series]);

    let nav: Vec<f64> = view.net_assets.iter().map(|p| p.value).collect();
    assert_eq!(nav, vec![450.0, 110.0]);
    let sales: Vec<f64> = view.net_sales_cumulative.iter().map(|p| p.value).collect();
    assert_eq!(sales, vec![6.0, 13.0]);

    let ids: Vec<&str> = view.ranking.rows.iter().map(|r| r.run_fm.as_str()).collect();
    // The undated row is left out of the ranking, like it is left out of the charts.
    assert_eq!(view.subset_rows, 5);
    assert_eq!(ids, vec!["900", "8001"]);
    assert_eq!(view.ranking.rows[0].total, 300.0);
    assert_eq!(view.ranking.rows[1].total, 260.0);
    let ranked: f64 = view.ranking.rows.iter().map(|r| r.total).sum();
    let charted: f64 = view.net_assets.iter().map(|p| p.value).sum();
    assert_eq!(ranked, charted);
}

#[test]
fn csv_filters_narrow_options_and_subset() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path());
    let dataset = load_dataset(&path, &LoadOptions::default()).unwrap();

    let state = FilterState::new().with_selection(Dimension::Administrator, Selection::only(["ADM DOS"]));
    let view = build_view(&dataset, &state, view_config());

    let funds = &view.cascade.level(Dimension::Fund).unwrap().options;
    assert_eq!(funds, &vec!["900 - RENTA".to_string()]);
    assert_eq!(view.subset_rows, 2);
    assert_eq!(view.ranking.total_funds, 1);
}

#[test]
fn required_dimension_missing_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path());
    let options = LoadOptions {
        required_dimensions: vec![Dimension::FundType],
    };
    let err = load_dataset(&path, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Load);
    assert!(err.to_string().contains("TIPO_FM"));
}

#[test]
fn missing_column_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.csv");
    fs::write(&path, "FECHA_INF,RUN_FM\n20240102,1\n").unwrap();
    let err = load_dataset(&path, &LoadOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Load);
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn export_round_trips_through_the_csv_loader() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path());
    let dataset = load_dataset(&path, &LoadOptions::default()).unwrap();

    let state = FilterState::new().with_selection(Dimension::Series, Selection::only(["B"]));
    let bytes = export_filtered(&dataset, &state, 100).unwrap();
    let out = dir.path().join("ffmm_filtrado.csv");
    ffmm_dash::io::write_export(&out, &bytes).unwrap();

    let reloaded = load_dataset(&out, &LoadOptions::default()).unwrap();
    assert_eq!(reloaded.records.len(), 1);
    let row = &reloaded.records[0];
    assert_eq!(row.fund_label, "8001 - AHORRO");
    assert_eq!(row.net_sales_mm, Some(-4.0));

    let err = export_filtered(&dataset, &FilterState::new(), 4).unwrap_err();
    assert!(err.is_export_too_large());
}

#[test]
fn export_without_a_range_skips_undated_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path());
    let dataset = load_dataset(&path, &LoadOptions::default()).unwrap();

    let bytes = export_filtered(&dataset, &FilterState::new(), 5).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(!text.contains("bad-date"));
    assert_eq!(text.lines().count(), 6);
}

#[test]
fn cache_reuses_unchanged_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(dir.path());

    let mut cache = SnapshotCache::new();
    let first = cache.get_or_load(&path, &LoadOptions::default()).unwrap();
    let second = cache.get_or_load(&path, &LoadOptions::default()).unwrap();
    assert_eq!(cache.loads(), 1);
    assert!(std::sync::Arc::ptr_eq(&first, &second));
}

#[test]
fn parquet_snapshot_projects_and_detects_optional_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ffmm_merged.parquet");

    let mut df = df! {
        "FECHA_INF" => &[20240102i64, 20240102, 20240103],
        "RUN_FM" => &[8001i64, 9100, 8001],
        "Nombre_Corto" => &["AHORRO", "ACCIONES", "AHORRO"],
        "NOM_ADM" => &["ADM UNO", "ADM DOS", "ADM UNO"],
        "TIPO_FM" => &[Some("RF"), Some("RV"), Some("RF")],
        "SERIE" => &[Some("A"), Some("A"), None],
        "PATRIMONIO_NETO_MM" => &[100.0, 200.0, 120.0],
        "VENTA_NETA_MM" => &[Some(1.5), None, Some(-0.5)],
        "UNUSED" => &["x", "y", "z"]
    }
    .unwrap();
    let file = fs::File::create(&path).unwrap();
    ParquetWriter::new(file).finish(&mut df).unwrap();

    let dataset = load_dataset(&path, &LoadOptions::default()).unwrap();
    assert_eq!(dataset.info.format, SnapshotFormat::Parquet);
    assert!(dataset.capabilities.fund_type);
    assert!(!dataset.capabilities.category);
    assert_eq!(dataset.records[1].fund_label, "9100 - ACCIONES");
    assert_eq!(dataset.records[2].series, None);
    assert_eq!(dataset.records[1].net_sales_mm, None);

    let state = FilterState::new().with_selection(Dimension::FundType, Selection::only(["RF"]));
    let view = build_view(&dataset, &state, view_config());
    assert_eq!(view.subset_rows, 2);
    assert_eq!(
        view.cascade.level(Dimension::Administrator).unwrap().options,
        vec!["ADM UNO".to_string()]
    );
    let sales: Vec<f64> = view.net_sales_cumulative.iter().map(|p| p.value).collect();
    assert_eq!(sales, vec![1.5, 1.0]);
}

#[test]
fn parquet_date_typed_report_dates_are_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dated.parquet");

    let d = |day: u32| chrono::NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
    let mut df = df! {
        "FECHA_INF" => &[d(2), d(3)],
        "RUN_FM" => &["8001", "8001"],
        "Nombre_Corto" => &["AHORRO", "AHORRO"],
        "NOM_ADM" => &["ADM UNO", "ADM UNO"],
        "SERIE" => &["A", "A"],
        "PATRIMONIO_NETO_MM" => &[100.0, 120.0],
        "VENTA_NETA_MM" => &[1.0, 2.0]
    }
    .unwrap();
    let file = fs::File::create(&path).unwrap();
    ParquetWriter::new(file).finish(&mut df).unwrap();

    let dataset = load_dataset(&path, &LoadOptions::default()).unwrap();
    assert_eq!(dataset.info.unparsed_dates, 0);
    assert_eq!(dataset.records[0].report_date, Some(d(2)));

    let view = build_view(&dataset, &FilterState::new(), view_config());
    assert_eq!(view.subset_rows, 2);
}
