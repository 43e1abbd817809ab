//! FTP conformance harness
//!
//! Starts the server under test, replays scripted control-connection
//! commands and compares the responses with recorded expectations.

use clap::Parser;
use ftp_harness::commands::Args;
use ftp_harness::{cli, common::logging};

#[tokio::main]
async fn main() {
    // clap exits with code 2 on usage errors
    let args = Args::parse();

    logging::init_cli(args.verbose);

    let code = match cli::run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            e.exit_code()
        }
    };

    std::process::exit(code);
}
