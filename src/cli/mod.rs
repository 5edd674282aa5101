//! Command-line parsing for the fund dashboard.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the filtering/aggregation code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_EXPORT_NAME, DEFAULT_ROW_CAP, DEFAULT_TOP_N, Dimension, Measure, QuickRange};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ffmm", version, about = "Dashboard Fondos Mutuos (CMF snapshot)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Launch the interactive dashboard.
    ///
    /// Filter flags set the initial state; everything can be changed live.
    Tui(DashArgs),
    /// Print the filtered summary, ranking, and charts.
    Show(ShowArgs),
    /// List the options a filter dimension offers under the given filters.
    Options(OptionsArgs),
    /// Write the filtered rows to CSV.
    Export(ExportArgs),
}

/// Snapshot location and filters shared by every command.
#[derive(Debug, Args, Clone)]
pub struct DashArgs {
    /// Snapshot file (.parquet or .csv). Falls back to FFMM_DATA, then ./ffmm_merged.parquet.
    #[arg(short = 'd', long, value_name = "FILE")]
    pub data: Option<PathBuf>,

    /// Fail to load unless the snapshot carries these optional dimensions.
    #[arg(long = "require", value_enum, value_delimiter = ',')]
    pub require: Vec<Dimension>,

    /// Fund type(s) (TIPO_FM). Repeat or comma-separate.
    #[arg(long = "type", value_delimiter = ',')]
    pub fund_type: Vec<String>,

    /// Category(ies) (CATEGORIA).
    #[arg(long, value_delimiter = ',')]
    pub category: Vec<String>,

    /// Administrator(s) (NOM_ADM).
    #[arg(long = "adm", value_delimiter = ',')]
    pub administrator: Vec<String>,

    /// Fund(s), as "RUN - Nombre" labels or bare RUN_FM ids.
    #[arg(long)]
    pub fund: Vec<String>,

    /// Share series (SERIE).
    #[arg(long, value_delimiter = ',')]
    pub series: Vec<String>,

    /// First date, inclusive (YYYY-MM-DD).
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last date, inclusive (YYYY-MM-DD).
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Quick date range anchored at the latest available date.
    #[arg(long, value_enum, conflicts_with_all = ["from", "to"])]
    pub range: Option<QuickRange>,

    /// Measure used for the fund ranking.
    #[arg(long, value_enum, default_value_t = Measure::NetAssets)]
    pub measure: Measure,

    /// Number of funds in the ranking.
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    pub top: usize,

    /// Largest export allowed, in rows.
    #[arg(long, env = "FFMM_ROW_CAP", default_value_t = DEFAULT_ROW_CAP)]
    pub row_cap: usize,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub dash: DashArgs,

    /// Disable the ASCII charts (print series as tables instead).
    #[arg(long)]
    pub no_plot: bool,

    /// Print the computed view as JSON.
    #[arg(long, conflicts_with = "no_plot")]
    pub json: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 15)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct OptionsArgs {
    /// Dimension to list.
    #[arg(value_enum)]
    pub dimension: Dimension,

    #[command(flatten)]
    pub dash: DashArgs,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub dash: DashArgs,

    /// Output CSV path.
    #[arg(short = 'o', long, default_value = DEFAULT_EXPORT_NAME)]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filters_accept_repeats_and_commas() {
        let cli = Cli::parse_from([
            "ffmm", "show", "--adm", "ADM1,ADM2", "--series", "A", "--series", "B", "--range", "3m",
        ]);
        let Command::Show(args) = cli.command else {
            panic!("expected show");
        };
        assert_eq!(args.dash.administrator, vec!["ADM1", "ADM2"]);
        assert_eq!(args.dash.series, vec!["A", "B"]);
        assert_eq!(args.dash.range, Some(QuickRange::ThreeMonths));
    }

    #[test]
    fn options_takes_dimension_positionally() {
        let cli = Cli::parse_from(["ffmm", "options", "fund", "--type", "RV"]);
        let Command::Options(args) = cli.command else {
            panic!("expected options");
        };
        assert_eq!(args.dimension, Dimension::Fund);
        assert_eq!(args.dash.fund_type, vec!["RV"]);
    }
}
