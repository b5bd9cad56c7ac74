mod cli;

use clap::Parser;

fn main() {
    let parsed = cli::Cli::parse();
    std::process::exit(cli::run(parsed));
}
