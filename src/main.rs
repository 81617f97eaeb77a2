#![forbid(unsafe_code)]

//! opsdeck: operations dashboard inspection CLI.

use clap::Parser;

mod cli_app;

fn main() {
    let args = cli_app::Cli::parse();
    if let Err(e) = cli_app::run(&args) {
        eprintln!("opsdeck: {e}");
        std::process::exit(e.exit_code());
    }
}
