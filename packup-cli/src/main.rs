//! Packup CLI.

pub mod parse;
pub mod cmd;

use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

use parse::Cli;


/// Entry point. Argument errors exit with code 1, help and version with 0.
fn main() -> ExitCode {
    match Cli::try_parse() {
        Ok(cli) => cmd::main(cli),
        Err(e) => {
            let _ = e.print();
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            }
        }
    }
}
