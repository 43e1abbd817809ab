//! Test runner implementation
//!
//! Runs one test case end to end (load, start server, drive the session,
//! stop server, compare) or a whole directory of them, strictly one after
//! another.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::common::{Error, HarnessConfig, Result};
use crate::server::ProcessManager;
use crate::session::{run_session, SessionTranscript};

use super::case::{ExpectedTranscript, TestCase};
use super::verdict::{compare, Mismatch, Verdict};

/// Result of a completed test
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub verdict: Verdict,
    pub expected: Vec<String>,
    pub actual: Vec<String>,
    pub mismatch: Option<Mismatch>,
}

/// Counts for a batch run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SuiteSummary {
    pub passed: usize,
    pub failed: usize,
    /// Tests aborted by an error before a verdict was reached
    pub errored: usize,
}

impl SuiteSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errored
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }

    /// 0 if every test passed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}

/// Drives tests against one server binary
pub struct Runner {
    config: HarnessConfig,
    manager: ProcessManager,
    verbose: bool,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl Runner {
    pub fn new(binary: &Path, config: HarnessConfig, verbose: bool) -> Self {
        let manager = ProcessManager::new(binary, &config);
        Self {
            config,
            manager,
            verbose,
        }
    }

    /// Run a single test case and report its verdict
    ///
    /// Errors (unresolvable config, empty test, startup or communication
    /// failure) abort the test; the server is cleaned up either way.
    pub async fn run_one(&self, test_file: &Path) -> Result<TestResult> {
        let name = display_name(test_file);

        let case = TestCase::load(test_file, &self.config.paths.config_dir)?;
        let expected = ExpectedTranscript::load_for(test_file)?;

        tracing::debug!(
            test = %name,
            config = %case.config_path.display(),
            commands = case.commands.len(),
            "Loaded test case"
        );

        let transcript = self.drive(&case).await?;

        let expected = expected.lines().to_vec();
        let actual = transcript.into_lines();
        let (verdict, mismatch) = compare(&expected, &actual);

        let result = TestResult {
            name,
            verdict,
            expected,
            actual,
            mismatch,
        };
        self.report(&result);

        Ok(result)
    }

    /// Start the server, run the session, stop the server
    async fn drive(&self, case: &TestCase) -> Result<SessionTranscript> {
        self.manager.cleanup().await;

        let mut handle = match self.manager.start(&case.config_path).await {
            Ok(handle) => handle,
            Err(e) => {
                self.manager.cleanup().await;
                return Err(e);
            }
        };

        if !self.manager.wait_for_ready(&mut handle).await {
            self.manager.terminate(handle).await;
            return Err(self.manager.not_ready_error());
        }

        let session = run_session(handle.addr(), &case.commands, &self.config.session).await;
        self.manager.terminate(handle).await;

        session
    }

    fn report(&self, result: &TestResult) {
        match result.verdict {
            Verdict::Pass => println!("  {} {} {}", "✓".green(), result.name, "PASS".green()),
            Verdict::Fail => println!("  {} {} {}", "✗".red(), result.name, "FAIL".red().bold()),
        }

        if result.verdict == Verdict::Fail && self.verbose {
            println!("    {}", "Expected:".cyan());
            for line in &result.expected {
                println!("      {}", line);
            }
            println!("    {}", "Actual:".cyan());
            for line in &result.actual {
                println!("      {}", line);
            }
            if let Some(mismatch) = &result.mismatch {
                println!("    {}", mismatch.to_string().dimmed());
            }
        }
    }

    /// Test case files in `dir` matching the configured pattern, sorted
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        discover(dir, &self.config.paths.testcase_pattern)
    }

    /// Run every discovered test case in order
    ///
    /// A failing or erroring test never stops the batch.
    pub async fn run_all(&self, dir: Option<&Path>) -> Result<SuiteSummary> {
        let dir = dir.unwrap_or(&self.config.paths.testcase_dir);
        let files = self.discover(dir)?;
        let mut summary = SuiteSummary::default();

        if files.is_empty() {
            println!("No test cases found in {}", dir.display());
            return Ok(summary);
        }

        println!(
            "\n{} {} test case(s) from {}",
            "Running".blue().bold(),
            files.len(),
            dir.display()
        );

        for file in &files {
            match self.run_one(file).await {
                Ok(result) if result.verdict.is_pass() => summary.passed += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    let name = display_name(file);
                    tracing::warn!(test = %name, kind = ?e.kind(), "Test aborted: {}", e);
                    println!("  {} {} {}: {}", "✗".red(), name, "ERROR".red().bold(), e);
                    summary.errored += 1;
                }
            }
        }

        let line = format!(
            "{} passed, {} failed, {} errored ({} total)",
            summary.passed,
            summary.failed,
            summary.errored,
            summary.total()
        );
        if summary.all_passed() {
            println!("\n{}\n", line.green().bold());
        } else {
            println!("\n{}\n", line.red().bold());
        }

        Ok(summary)
    }
}

/// Files directly inside `dir` whose names match `pattern`, sorted lexically
pub fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Usage(format!(
            "test case directory '{}' not found",
            dir.display()
        )));
    }

    let glob_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        pattern
    );

    let entries = glob::glob(&glob_pattern)
        .map_err(|e| Error::Usage(format!("invalid test case pattern '{}': {}", pattern, e)))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    Ok(files)
}
