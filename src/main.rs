//! gbsegen CLI — compile solver graphs into linear programs.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "gbsegen",
    version,
    about = "Graph-based solver compiler — aDOT execution plans to linear programs"
)]
struct Cli {
    #[command(subcommand)]
    command: gbsegen::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = gbsegen::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
