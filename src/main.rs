use std::{path::PathBuf, process};

use clap::Parser;
use log::info;

use crate::driver::Config;

mod ast;
mod driver;
mod error;
mod parser;
mod translator;

#[cfg(test)]
mod test_utils;

#[derive(Parser)]
#[command(name = "hackvm")]
#[command(about = "Hack VM to Hack assembly translator", long_about = None)]
#[command(version)]
struct Cli {
    /// A .vm file, or a directory translated into one combined program
    input: PathBuf,

    /// Output file (default: `X.asm` beside `X.vm`, or `Dir/Dir.asm`)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Omit the bootstrap code when translating a single file
    #[arg(long)]
    no_bootstrap: bool,

    /// Function the bootstrap code calls
    #[arg(long, default_value = "Sys.init")]
    entry: String,

    /// Don't echo each VM command as a comment
    #[arg(long)]
    no_comments: bool,

    /// Log each unit as it is translated
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = Config {
        input: cli.input,
        output: cli.output,
        bootstrap: !cli.no_bootstrap,
        entry: cli.entry,
        annotate: !cli.no_comments,
    };

    match driver::run(&config) {
        Ok((output, units)) => {
            let commands: usize = units.iter().map(|u| u.commands).sum();
            info!(
                "{} units, {} commands -> {}",
                units.len(),
                commands,
                output.display()
            );
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}
