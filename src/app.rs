//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and installs logging
//! - parses CLI arguments
//! - loads the snapshot
//! - turns filter flags into a `FilterState`
//! - dispatches to the TUI or the printing/export commands

use clap::Parser;

use crate::cli::{Command, DashArgs, ExportArgs, OptionsArgs, ShowArgs};
use crate::domain::{DateRange, Dimension, FilterState, Selection};
use crate::error::AppError;
use crate::io::ingest::{Dataset, LoadOptions, load_dataset};

pub mod pipeline;

use pipeline::{ViewConfig, build_view, export_filtered, with_quick_range};

/// Entry point for the `ffmm` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let _log_guard = crate::logging::init()?;

    // We want `ffmm` and `ffmm -d file.parquet` to behave like `ffmm tui ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    let result = match cli.command {
        Command::Tui(args) => handle_tui(args),
        Command::Show(args) => handle_show(args),
        Command::Options(args) => handle_options(args),
        Command::Export(args) => handle_export(args),
    };
    if let Err(err) = &result {
        tracing::error!(kind = ?err.kind(), "{err}");
    }
    result
}

fn handle_tui(args: DashArgs) -> Result<(), AppError> {
    let path = crate::cli::picker::resolve_snapshot_path(args.data.as_deref());
    let path = crate::cli::picker::validate_snapshot_path(&path)?;
    let options = load_options(&args);

    // Load before touching the terminal so load errors print normally.
    let mut cache = crate::io::cache::SnapshotCache::new();
    let dataset = cache.get_or_load(&path, &options)?;
    let state = state_from_args(&dataset, &args)?;

    crate::tui::run(crate::tui::TuiSetup {
        path,
        options,
        cache,
        dataset,
        state,
        view: view_config(&args),
        row_cap: args.row_cap,
    })
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let dataset = load(&args.dash)?;
    let state = state_from_args(&dataset, &args.dash)?;
    let view = build_view(&dataset, &state, view_config(&args.dash));

    if args.json {
        let json = serde_json::to_string_pretty(&view)
            .map_err(|e| AppError::io(format!("Failed to serialize view: {e}")))?;
        println!("{json}");
        return Ok(());
    }

    println!("{}", crate::report::format_view_summary(&view));
    if view.is_empty() {
        println!("No hay datos disponibles con los filtros seleccionados.");
        return Ok(());
    }

    if args.no_plot {
        println!(
            "{}",
            crate::report::format_series("Patrimonio Neto Total (MM CLP)", &view.net_assets)
        );
        println!(
            "{}",
            crate::report::format_series("Venta Neta Acumulada (MM CLP)", &view.net_sales_cumulative)
        );
    } else {
        println!(
            "{}",
            crate::plot::render_bar_chart(
                "Patrimonio Neto Total (MM CLP)",
                &view.net_assets,
                args.width,
                args.height
            )
        );
        println!(
            "{}",
            crate::plot::render_bar_chart(
                "Venta Neta Acumulada (MM CLP)",
                &view.net_sales_cumulative,
                args.width,
                args.height
            )
        );
    }

    println!("{}", crate::report::format_ranking(&view.ranking));
    Ok(())
}

fn handle_options(args: OptionsArgs) -> Result<(), AppError> {
    let dataset = load(&args.dash)?;
    if !dataset.capabilities.has(args.dimension) {
        return Err(AppError::usage(format!(
            "The snapshot has no `{}` column; `{}` is not available.",
            args.dimension.columns().join("`/`"),
            args.dimension.display_name()
        )));
    }

    let state = state_from_args(&dataset, &args.dash)?;
    let options = crate::filter::options_for(&dataset.records, args.dimension, &state);
    for option in &options {
        println!("{option}");
    }
    if crate::filter::is_small(&options) {
        tracing::debug!(dimension = ?args.dimension, "small dimension (single-select in the TUI)");
    }
    Ok(())
}

fn handle_export(args: ExportArgs) -> Result<(), AppError> {
    let dataset = load(&args.dash)?;
    let state = state_from_args(&dataset, &args.dash)?;
    let bytes = export_filtered(&dataset, &state, args.dash.row_cap)?;
    crate::io::export::write_export(&args.output, &bytes)?;
    println!("Wrote {}", args.output.display());
    Ok(())
}

fn load(args: &DashArgs) -> Result<Dataset, AppError> {
    let path = crate::cli::picker::resolve_snapshot_path(args.data.as_deref());
    let path = crate::cli::picker::validate_snapshot_path(&path)?;
    load_dataset(&path, &load_options(args))
}

fn load_options(args: &DashArgs) -> LoadOptions {
    LoadOptions {
        required_dimensions: args.require.clone(),
    }
}

fn view_config(args: &DashArgs) -> ViewConfig {
    ViewConfig {
        rank_measure: args.measure,
        top_n: args.top,
    }
}

/// Build the initial filter state from CLI flags.
pub fn state_from_args(dataset: &Dataset, args: &DashArgs) -> Result<FilterState, AppError> {
    let mut state = FilterState::new();

    let flags: [(Dimension, &Vec<String>); 5] = [
        (Dimension::FundType, &args.fund_type),
        (Dimension::Category, &args.category),
        (Dimension::Administrator, &args.administrator),
        (Dimension::Fund, &args.fund),
        (Dimension::Series, &args.series),
    ];

    for (dimension, values) in flags {
        if values.is_empty() {
            continue;
        }
        if !dataset.capabilities.has(dimension) {
            tracing::warn!(?dimension, "filter ignored: snapshot has no such column");
            continue;
        }
        let values = if dimension == Dimension::Fund {
            expand_fund_ids(dataset, values)
        } else {
            values.iter().map(|v| v.trim().to_string()).collect()
        };
        state = state.with_selection(dimension, Selection::only(values));
    }

    if let Some(quick) = args.range {
        return Ok(with_quick_range(dataset, &state, quick));
    }

    if args.from.is_some() || args.to.is_some() {
        let start = args.from.unwrap_or(chrono::NaiveDate::MIN);
        let end = args.to.unwrap_or(chrono::NaiveDate::MAX);
        let range = DateRange::new(start, end).ok_or_else(|| {
            AppError::usage(format!("--from ({start}) must not be after --to ({end})."))
        })?;
        state = state.with_date_range(Some(range));
    }

    Ok(state)
}

/// Accept bare `RUN_FM` ids for the fund filter by mapping them to labels.
fn expand_fund_ids(dataset: &Dataset, values: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for value in values {
        let value = value.trim();
        let matches: Vec<&str> = dataset
            .records
            .iter()
            .filter(|r| r.run_fm == value)
            .map(|r| r.fund_label.as_str())
            .collect();
        if matches.is_empty() {
            out.push(value.to_string());
        } else {
            out.extend(matches.into_iter().map(str::to_string));
        }
    }
    out.sort();
    out.dedup();
    out
}

/// Rewrite argv so `ffmm` defaults to `ffmm tui`.
///
/// Rules:
/// - `ffmm`                       -> `ffmm tui`
/// - `ffmm -d file.parquet ...`   -> `ffmm tui -d file.parquet ...`
/// - `ffmm --help/--version/-h`   -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "tui" | "show" | "options" | "export");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Capabilities, QuickRange, RawRecord};
    use chrono::NaiveDate;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn dash(extra: &[&str]) -> DashArgs {
        let mut full = vec!["ffmm", "show"];
        full.extend_from_slice(extra);
        match crate::cli::Cli::parse_from(full).command {
            Command::Show(args) => args.dash,
            _ => unreachable!(),
        }
    }

    fn dataset() -> Dataset {
        let row = |fecha: &str, run: &str, name: &str| RawRecord {
            fecha_inf: fecha.into(),
            run_fm: run.into(),
            short_name: Some(name.into()),
            administrator: Some("ADM".into()),
            series: Some("A".into()),
            ..RawRecord::default()
        };
        Dataset::from_raw(
            vec![
                row("20240110", "8001", "AHORRO"),
                row("20240610", "8002", "RENTA"),
            ],
            Capabilities::default(),
        )
    }

    #[test]
    fn rewrite_defaults_to_tui() {
        assert_eq!(rewrite_args(argv(&["ffmm"])), argv(&["ffmm", "tui"]));
        assert_eq!(
            rewrite_args(argv(&["ffmm", "-d", "x.parquet"])),
            argv(&["ffmm", "tui", "-d", "x.parquet"])
        );
        assert_eq!(rewrite_args(argv(&["ffmm", "--help"])), argv(&["ffmm", "--help"]));
        assert_eq!(rewrite_args(argv(&["ffmm", "show"])), argv(&["ffmm", "show"]));
    }

    #[test]
    fn bare_fund_ids_map_to_labels() {
        let ds = dataset();
        let state = state_from_args(&ds, &dash(&["--fund", "8002"])).unwrap();
        assert_eq!(
            state.selection(Dimension::Fund),
            &Selection::only(["8002 - RENTA"])
        );
    }

    #[test]
    fn inverted_dates_are_rejected() {
        let ds = dataset();
        let err = state_from_args(&ds, &dash(&["--from", "2024-05-01", "--to", "2024-01-01"])).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Usage);
    }

    #[test]
    fn quick_range_resolves_against_data() {
        let ds = dataset();
        let state = state_from_args(&ds, &dash(&["--range", "1m"])).unwrap();
        let expected = QuickRange::OneMonth.resolve(
            DateRange::new(
                NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            )
            .unwrap(),
        );
        assert_eq!(state.date_range(), Some(expected));
    }

    #[test]
    fn filters_on_missing_dimensions_are_dropped() {
        let ds = dataset();
        let state = state_from_args(&ds, &dash(&["--type", "RV"])).unwrap();
        assert_eq!(state.active_dimensions().count(), 0);
    }
}
