//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - shared read-only between the pipeline and the front-ends
//! - printed as JSON by `ffmm show --json`
//! - constructed directly in tests without a snapshot file

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Months, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const COL_FECHA_INF: &str = "FECHA_INF";
pub const COL_RUN_FM: &str = "RUN_FM";
pub const COL_NOMBRE_CORTO: &str = "Nombre_Corto";
pub const COL_NOM_ADM: &str = "NOM_ADM";
pub const COL_TIPO_FM: &str = "TIPO_FM";
pub const COL_CATEGORIA: &str = "CATEGORIA";
pub const COL_SERIE: &str = "SERIE";
pub const COL_PATRIMONIO_NETO_MM: &str = "PATRIMONIO_NETO_MM";
pub const COL_VENTA_NETA_MM: &str = "VENTA_NETA_MM";

/// Columns every snapshot must carry, in export order.
pub const BASE_COLUMNS: [&str; 7] = [
    COL_FECHA_INF,
    COL_RUN_FM,
    COL_NOMBRE_CORTO,
    COL_NOM_ADM,
    COL_SERIE,
    COL_PATRIMONIO_NETO_MM,
    COL_VENTA_NETA_MM,
];

/// Dimensions with fewer options than this are shown as single-select.
pub const SMALL_OPTION_THRESHOLD: usize = 5;

/// Separator between `RUN_FM` and `Nombre_Corto` in the fund label.
pub const FUND_LABEL_SEPARATOR: &str = " - ";

/// A categorical filter dimension.
///
/// Declaration order is the cascade order: each dimension's options are
/// computed from rows that satisfy every dimension declared before it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    #[value(name = "type")]
    FundType,
    Category,
    #[value(name = "adm")]
    Administrator,
    Fund,
    Series,
}

impl Dimension {
    pub const CHAIN: [Dimension; 5] = [
        Dimension::FundType,
        Dimension::Category,
        Dimension::Administrator,
        Dimension::Fund,
        Dimension::Series,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Dimension::FundType => "Tipo de Fondo",
            Dimension::Category => "Categoría",
            Dimension::Administrator => "Administradora(s)",
            Dimension::Fund => "Fondo(s)",
            Dimension::Series => "Serie(s)",
        }
    }

    /// Source columns this dimension reads.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Dimension::FundType => &[COL_TIPO_FM],
            Dimension::Category => &[COL_CATEGORIA],
            Dimension::Administrator => &[COL_NOM_ADM],
            Dimension::Fund => &[COL_RUN_FM, COL_NOMBRE_CORTO],
            Dimension::Series => &[COL_SERIE],
        }
    }

    /// Whether the dimension depends on a column older snapshots may lack.
    pub fn is_optional(self) -> bool {
        matches!(self, Dimension::FundType | Dimension::Category)
    }

    /// Dimensions strictly upstream of `self` in the cascade.
    pub fn upstream(self) -> impl Iterator<Item = Dimension> {
        Self::CHAIN.into_iter().take_while(move |d| *d != self)
    }
}

/// Which optional dimensions the loaded schema carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub fund_type: bool,
    pub category: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        fund_type: true,
        category: true,
    };

    pub fn has(&self, dimension: Dimension) -> bool {
        match dimension {
            Dimension::FundType => self.fund_type,
            Dimension::Category => self.category,
            Dimension::Administrator | Dimension::Fund | Dimension::Series => true,
        }
    }

    /// Available dimensions in cascade order.
    pub fn dimensions(&self) -> Vec<Dimension> {
        Dimension::CHAIN.into_iter().filter(|d| self.has(*d)).collect()
    }

    /// Source columns present in the table, in export order.
    pub fn columns(&self) -> Vec<&'static str> {
        let mut cols = vec![COL_FECHA_INF, COL_RUN_FM, COL_NOMBRE_CORTO, COL_NOM_ADM];
        if self.fund_type {
            cols.push(COL_TIPO_FM);
        }
        if self.category {
            cols.push(COL_CATEGORIA);
        }
        cols.extend([COL_SERIE, COL_PATRIMONIO_NETO_MM, COL_VENTA_NETA_MM]);
        cols
    }
}

/// A numeric column that can be charted or ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Measure {
    /// `PATRIMONIO_NETO_MM`.
    NetAssets,
    /// `VENTA_NETA_MM`.
    NetSales,
}

impl Measure {
    pub fn column(self) -> &'static str {
        match self {
            Measure::NetAssets => COL_PATRIMONIO_NETO_MM,
            Measure::NetSales => COL_VENTA_NETA_MM,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Measure::NetAssets => "Patrimonio Neto (MM CLP)",
            Measure::NetSales => "Venta Neta (MM CLP)",
        }
    }

    pub fn value(self, record: &Record) -> Option<f64> {
        match self {
            Measure::NetAssets => record.net_assets_mm,
            Measure::NetSales => record.net_sales_mm,
        }
    }
}

/// How `daily_aggregate` folds per-date sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateMode {
    Plain,
    Cumulative,
}

/// A row as read from the snapshot, before derived fields are added.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    pub fecha_inf: String,
    pub run_fm: String,
    pub short_name: Option<String>,
    pub administrator: Option<String>,
    pub fund_type: Option<String>,
    pub category: Option<String>,
    pub series: Option<String>,
    pub net_assets_mm: Option<f64>,
    pub net_sales_mm: Option<f64>,
}

/// One row of the loaded table. Never mutated after load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub fecha_inf: String,
    pub report_date: Option<NaiveDate>,
    pub run_fm: String,
    pub short_name: Option<String>,
    pub administrator: Option<String>,
    pub fund_type: Option<String>,
    pub category: Option<String>,
    pub series: Option<String>,
    pub net_assets_mm: Option<f64>,
    pub net_sales_mm: Option<f64>,
    pub fund_label: String,
}

impl Record {
    pub fn from_raw(raw: RawRecord) -> Self {
        let report_date = parse_report_date(&raw.fecha_inf);
        let fund_label = format!(
            "{}{FUND_LABEL_SEPARATOR}{}",
            raw.run_fm,
            raw.short_name.as_deref().unwrap_or("")
        );
        Self {
            fecha_inf: raw.fecha_inf,
            report_date,
            run_fm: raw.run_fm,
            short_name: raw.short_name,
            administrator: raw.administrator,
            fund_type: raw.fund_type,
            category: raw.category,
            series: raw.series,
            net_assets_mm: raw.net_assets_mm,
            net_sales_mm: raw.net_sales_mm,
            fund_label,
        }
    }

    /// Value of a categorical dimension; `None` is treated as null.
    pub fn value(&self, dimension: Dimension) -> Option<&str> {
        let v = match dimension {
            Dimension::FundType => self.fund_type.as_deref(),
            Dimension::Category => self.category.as_deref(),
            Dimension::Administrator => self.administrator.as_deref(),
            Dimension::Fund => Some(self.fund_label.as_str()),
            Dimension::Series => self.series.as_deref(),
        };
        v.filter(|s| !s.is_empty())
    }
}

/// Parse `FECHA_INF` (`YYYYMMDD`, integer or string) into a date.
///
/// Float-typed columns come through as `20240301.0`, so a zero fraction is
/// dropped. Date-typed columns come through as `2024-03-01`.
pub fn parse_report_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    let s = s.strip_suffix(".0").unwrap_or(s);
    if s.len() == 10 {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
    }
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

/// Closed date interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Shortcut ranges offered next to the date control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum QuickRange {
    #[value(name = "1m")]
    OneMonth,
    #[value(name = "3m")]
    ThreeMonths,
    #[value(name = "6m")]
    SixMonths,
    Ytd,
    #[value(name = "1y")]
    OneYear,
    All,
}

impl QuickRange {
    pub const ALL: [QuickRange; 6] = [
        QuickRange::OneMonth,
        QuickRange::ThreeMonths,
        QuickRange::SixMonths,
        QuickRange::Ytd,
        QuickRange::OneYear,
        QuickRange::All,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QuickRange::OneMonth => "1M",
            QuickRange::ThreeMonths => "3M",
            QuickRange::SixMonths => "6M",
            QuickRange::Ytd => "YTD",
            QuickRange::OneYear => "1A",
            QuickRange::All => "Todo",
        }
    }

    /// Resolve against the available `bounds`, anchored at the latest date.
    pub fn resolve(self, bounds: DateRange) -> DateRange {
        let end = bounds.end;
        let start = match self {
            QuickRange::OneMonth => end.checked_sub_months(Months::new(1)),
            QuickRange::ThreeMonths => end.checked_sub_months(Months::new(3)),
            QuickRange::SixMonths => end.checked_sub_months(Months::new(6)),
            QuickRange::OneYear => end.checked_sub_months(Months::new(12)),
            QuickRange::Ytd => NaiveDate::from_ymd_opt(end.year(), 1, 1),
            QuickRange::All => Some(bounds.start),
        }
        .unwrap_or(bounds.start)
        .max(bounds.start);
        DateRange { start, end }
    }
}

/// Per-dimension selection.
///
/// `All` and "an explicit set covering every offered option" mean the same
/// thing; `filter::Cascade` collapses the latter into the former.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "mode", content = "values")]
pub enum Selection {
    #[default]
    All,
    None,
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Only(values.into_iter().map(Into::into).collect())
    }

    /// Whether a record value passes. Nulls only pass `All`.
    pub fn accepts(&self, value: Option<&str>) -> bool {
        match self {
            Selection::All => true,
            Selection::None => false,
            Selection::Only(set) => value.is_some_and(|v| set.contains(v)),
        }
    }

    /// Whether `value` is chosen, as a checkbox would show it.
    pub fn is_chosen(&self, value: &str) -> bool {
        self.accepts(Some(value))
    }

    /// Collapse against the options currently offered for the dimension.
    pub fn normalized(&self, options: &[String]) -> Selection {
        match self {
            Selection::Only(set) if set.is_empty() => Selection::None,
            Selection::Only(set) if options.iter().all(|o| set.contains(o)) => Selection::All,
            other => other.clone(),
        }
    }

    /// Flip one option, given the options currently offered.
    pub fn toggled(&self, value: &str, options: &[String]) -> Selection {
        let mut set: BTreeSet<String> = match self {
            Selection::All => options.iter().cloned().collect(),
            Selection::None => BTreeSet::new(),
            Selection::Only(set) => set.clone(),
        };
        if !set.remove(value) {
            set.insert(value.to_string());
        }
        Selection::Only(set).normalized(options)
    }
}

/// Immutable filter state handed to the pipeline on every recompute.
///
/// Front-ends own the "current" value and replace it wholesale; the `with_*`
/// methods return a new state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterState {
    selections: BTreeMap<Dimension, Selection>,
    date_range: Option<DateRange>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection(&self, dimension: Dimension) -> &Selection {
        static ALL: Selection = Selection::All;
        self.selections.get(&dimension).unwrap_or(&ALL)
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    pub fn with_selection(&self, dimension: Dimension, selection: Selection) -> Self {
        let mut next = self.clone();
        if selection == Selection::All {
            next.selections.remove(&dimension);
        } else {
            next.selections.insert(dimension, selection);
        }
        next
    }

    pub fn with_date_range(&self, range: Option<DateRange>) -> Self {
        let mut next = self.clone();
        next.date_range = range;
        next
    }

    /// Dimensions with a non-`All` selection.
    pub fn active_dimensions(&self) -> impl Iterator<Item = Dimension> + '_ {
        self.selections.keys().copied()
    }
}

pub const DEFAULT_SNAPSHOT: &str = "ffmm_merged.parquet";
pub const DEFAULT_EXPORT_NAME: &str = "ffmm_filtrado.csv";
pub const DEFAULT_ROW_CAP: usize = 100_000;
pub const DEFAULT_TOP_N: usize = 20;
