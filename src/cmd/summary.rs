//! Summary command - gains bucketed by year and holding term

use crate::cmd::{self, format_amount};
use crate::lots::report::{read_records_csv, term_gains, write_records_csv, DispositionReport};
use crate::lots::DispositionRecord;
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct SummaryCommand {
    /// Disposition report CSV file (as written by `dispose`)
    #[arg(short, long)]
    file: PathBuf,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// Summary data for JSON output
#[derive(Debug, Serialize)]
struct SummaryData {
    years: Vec<YearSummary>,
}

#[derive(Debug, Serialize)]
struct YearSummary {
    year: i32,
    assets: Vec<AssetGains>,
    total: Gains,
}

#[derive(Debug, Serialize)]
struct AssetGains {
    asset: String,
    #[serde(flatten)]
    gains: Gains,
}

#[derive(Debug, Serialize)]
struct Gains {
    long_term: String,
    short_term: String,
}

impl Gains {
    fn new(long_term: Decimal, short_term: Decimal) -> Self {
        Gains {
            long_term: format_amount(long_term),
            short_term: format_amount(short_term),
        }
    }
}

impl SummaryCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let records = read_records_csv(File::open(&self.file)?)?;
        let report = DispositionReport {
            records,
            warnings: Vec::new(),
        };
        let out_dir = self.file.parent().unwrap_or_else(|| Path::new("."));

        let summary = build_summary(&report);
        write_term_files(&report, out_dir)?;
        write_summary_text(&summary, &cmd::summary_path(&self.file))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            self.print_summary(&summary);
        }
        Ok(())
    }

    fn print_summary(&self, summary: &SummaryData) {
        if summary.years.is_empty() {
            println!("No dispositions found");
            return;
        }
        for year in &summary.years {
            println!();
            println!("Profit/Loss Summary, {}", year.year);
            println!();

            let mut rows: Vec<SummaryRow> = year
                .assets
                .iter()
                .map(|a| SummaryRow {
                    asset: a.asset.clone(),
                    long_term: a.gains.long_term.clone(),
                    short_term: a.gains.short_term.clone(),
                })
                .collect();
            rows.push(SummaryRow {
                asset: "Total".to_string(),
                long_term: year.total.long_term.clone(),
                short_term: year.total.short_term.clone(),
            });

            let table = Table::new(rows)
                .with(Style::rounded())
                .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
                .to_string();
            println!("{}", table);
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Long Term Gains")]
    long_term: String,
    #[tabled(rename = "Short Term Gains")]
    short_term: String,
}

fn build_summary(report: &DispositionReport) -> SummaryData {
    let years = report
        .years()
        .into_iter()
        .map(|year| {
            let assets = report
                .assets(Some(year))
                .into_iter()
                .map(|asset| {
                    let (long, short) = term_gains(
                        report
                            .filter_records(Some(year))
                            .filter(|r| r.asset == asset),
                    );
                    AssetGains {
                        asset,
                        gains: Gains::new(long, short),
                    }
                })
                .collect();
            let (long, short) = term_gains(report.filter_records(Some(year)));
            YearSummary {
                year,
                assets,
                total: Gains::new(long, short),
            }
        })
        .collect();
    SummaryData { years }
}

/// Write per-year long-term and short-term disposition spreadsheets.
fn write_term_files(report: &DispositionReport, out_dir: &Path) -> anyhow::Result<()> {
    for year in report.years() {
        let (long, short): (Vec<DispositionRecord>, Vec<DispositionRecord>) = report
            .filter_records(Some(year))
            .cloned()
            .partition(|r| r.is_long_term());

        let long_path = out_dir.join(format!("longterm_{year}.csv"));
        write_records_csv(&long, File::create(&long_path)?)?;
        let short_path = out_dir.join(format!("shortterm_{year}.csv"));
        write_records_csv(&short, File::create(&short_path)?)?;
        log::info!(
            "wrote {} and {}",
            long_path.display(),
            short_path.display()
        );
    }
    Ok(())
}

fn write_summary_text(summary: &SummaryData, path: &Path) -> anyhow::Result<()> {
    let mut file = File::create(path)?;
    for year in &summary.years {
        writeln!(file, "Profit/Loss Summary, {}", year.year)?;
        for asset in &year.assets {
            writeln!(
                file,
                "{}, long term gains = {}, short term gains = {}",
                asset.asset, asset.gains.long_term, asset.gains.short_term
            )?;
        }
        writeln!(
            file,
            "Total, long term gains = {}, short term gains = {}",
            year.total.long_term, year.total.short_term
        )?;
    }
    log::info!("wrote {}", path.display());
    Ok(())
}
