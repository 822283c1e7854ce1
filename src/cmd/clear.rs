//! Clear command - remove the derived cache and output files for a ledger

use crate::cmd;
use clap::Args;
use std::fs;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ClearCommand {
    /// Transaction report CSV file whose derived files should be removed
    #[arg(short, long)]
    file: PathBuf,
}

impl ClearCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let report = cmd::report_path(&self.file);
        let paths = [
            cmd::cache_path(&self.file),
            cmd::summary_path(&report),
            report,
        ];
        for path in paths {
            if path.exists() {
                fs::remove_file(&path)?;
                println!("cleared {}", path.display());
            }
        }
        Ok(())
    }
}
