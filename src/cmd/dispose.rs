//! Dispose command - match sells against prior buys and write the outputs

use crate::cache;
use crate::cmd::{self, format_amount, format_quantity};
use crate::ledger::Ledger;
use crate::lots::{dispose, DispositionReport, Policy};
use clap::{Args, ValueEnum};
use std::fs::File;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct DisposeCommand {
    /// Transaction report CSV file
    #[arg(short, long)]
    file: PathBuf,

    /// Cost-basis assignment policy
    #[arg(short, long, value_enum, default_value_t = PolicyArg::Hifo)]
    policy: PolicyArg,

    /// Cache file path (defaults to <stem>_cache.csv next to the report)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Disposition output path (defaults to <stem>_report.csv)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum PolicyArg {
    #[default]
    Hifo,
    Fifo,
    Lifo,
}

impl From<PolicyArg> for Policy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Hifo => Policy::Hifo,
            PolicyArg::Fifo => Policy::Fifo,
            PolicyArg::Lifo => Policy::Lifo,
        }
    }
}

impl DisposeCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let policy: Policy = self.policy.into();
        let mut ledger = Ledger::read_csv(File::open(&self.file)?)?;

        let cache_path = self
            .cache
            .clone()
            .unwrap_or_else(|| cmd::cache_path(&self.file));
        if cache_path.exists() {
            cache::restore(&mut ledger, File::open(&cache_path)?)?;
            log::info!("restored consumed state from {}", cache_path.display());
        }

        let report = dispose(&mut ledger, policy);

        cache::persist(&ledger, File::create(&cache_path)?)?;
        log::info!("saved consumed state to {}", cache_path.display());

        let output_path = self
            .output
            .clone()
            .unwrap_or_else(|| cmd::report_path(&self.file));
        if !report.records.is_empty() {
            report.write_csv(File::create(&output_path)?)?;
            log::info!(
                "wrote {} dispositions to {}",
                report.records.len(),
                output_path.display()
            );
        }

        self.print_report(&report, policy);

        for warning in &report.warnings {
            eprintln!("warning: {warning}");
        }
        Ok(())
    }

    fn print_report(&self, report: &DispositionReport, policy: Policy) {
        println!();
        println!("DISPOSITIONS ({})", policy);
        println!();

        if report.records.is_empty() {
            println!("No new dispositions (all sells already matched)");
            return;
        }

        let rows: Vec<AssetRow> = report
            .assets(None)
            .into_iter()
            .map(|asset| {
                let records: Vec<_> = report
                    .records
                    .iter()
                    .filter(|r| r.asset == asset)
                    .collect();
                AssetRow {
                    asset: asset.clone(),
                    disposals: records.len(),
                    quantity: format_quantity(records.iter().map(|r| r.quantity).sum()),
                    proceeds: format_amount(records.iter().map(|r| r.proceeds).sum()),
                    basis: format_amount(records.iter().map(|r| r.basis).sum()),
                    gain: format_amount(records.iter().map(|r| r.gain).sum()),
                }
            })
            .collect();

        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        println!();
        println!(
            "Total: {} dispositions, proceeds {}, basis {}, gain {}",
            report.records.len(),
            format_amount(report.total_proceeds(None)),
            format_amount(report.total_basis(None)),
            format_amount(report.total_gain(None))
        );
    }
}

#[derive(Debug, Clone, Tabled)]
struct AssetRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Disposals")]
    disposals: usize,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Basis")]
    basis: String,
    #[tabled(rename = "Gain")]
    gain: String,
}
