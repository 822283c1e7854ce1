use clap::{Parser, Subcommand};

mod cache;
mod cmd;
mod ledger;
mod lots;
mod warnings;

#[derive(Parser)]
#[command(
    name = "cryptolots",
    version,
    about = "Compute capital gain/loss lots from a cryptocurrency transaction report"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Match sells against prior buys and write the disposition report
    Dispose(cmd::dispose::DisposeCommand),
    /// Summarise gains by year and holding term
    Summary(cmd::summary::SummaryCommand),
    /// Remove the cache and output files derived from a ledger
    Clear(cmd::clear::ClearCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Dispose(cmd) => cmd.exec(),
        Command::Summary(cmd) => cmd.exec(),
        Command::Clear(cmd) => cmd.exec(),
    }
}
