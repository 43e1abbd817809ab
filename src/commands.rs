//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ftp-harness", about = "Conformance test harness for FTP daemons")]
#[command(version, long_about = None)]
pub struct Args {
    /// Path to the server binary under test
    #[arg(short = 'p', value_name = "BINARY")]
    pub binary: PathBuf,

    /// Run a single test case file (default: every test case in the test directory)
    #[arg(short = 'f', value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Print expected and actual transcripts for failing tests
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Harness configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory to search for test cases in batch mode
    #[arg(long = "dir", value_name = "DIR", conflicts_with = "file")]
    pub dir: Option<PathBuf>,
}
