//! Test case and expected-output files
//!
//! A test case file names the server configuration on its first non-empty
//! line; every later line starting with `1:` is one command:
//! ```text
//! bftpd.conf
//! 1:USER anonymous
//! 1:QUIT
//! ```
//! The expected output lives next to it, named by replacing `input` with
//! `output` in the file name, one expected response per line.

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// Prefix marking a command line in a test case file
pub const COMMAND_PREFIX: &str = "1:";

/// Status code that opens the server greeting
pub const GREETING_CODE: &str = "220";

/// A parsed test case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// File the test case was loaded from
    pub source: PathBuf,
    /// Server configuration, resolved against the configuration directory
    pub config_path: PathBuf,
    /// Commands to send, in order
    pub commands: Vec<String>,
}

impl TestCase {
    /// Load and parse a test case file
    pub fn load(path: &Path, config_dir: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::parse(&content, path, config_dir)
    }

    /// Parse test case text
    ///
    /// `config_dir` should be absolute so that resolution does not depend on
    /// the working directory at the time of the call.
    pub fn parse(content: &str, source: &Path, config_dir: &Path) -> Result<Self> {
        let mut lines = content.lines().skip_while(|line| line.trim().is_empty());

        let config_name = lines
            .next()
            .map(str::trim)
            .ok_or_else(|| Error::config_not_found("", config_dir))?;

        let config_path = config_dir.join(config_name);
        if !config_path.is_file() {
            return Err(Error::config_not_found(config_name, config_dir));
        }

        let commands: Vec<String> = lines
            .filter_map(|line| line.strip_prefix(COMMAND_PREFIX))
            .map(str::trim)
            .filter(|payload| !payload.is_empty())
            .map(str::to_string)
            .collect();

        if commands.is_empty() {
            return Err(Error::EmptyTest(source.display().to_string()));
        }

        Ok(Self {
            source: source.to_path_buf(),
            config_path,
            commands,
        })
    }
}

/// Expected response lines for a test case
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedTranscript {
    lines: Vec<String>,
}

impl ExpectedTranscript {
    /// Load the expected output paired with `test_case`
    pub fn load_for(test_case: &Path) -> Result<Self> {
        let path = expected_path_for(test_case)?;
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Ok(Self::parse(&content))
    }

    /// Parse expected-output text
    ///
    /// A first line that does not start with `220` is dropped; a first line
    /// that does is kept as the expected greeting. Trailing whitespace is
    /// stripped and blank lines removed.
    pub fn parse(content: &str) -> Self {
        let lines = content
            .lines()
            .enumerate()
            .filter(|(i, line)| *i != 0 || line.starts_with(GREETING_CODE))
            .map(|(_, line)| line.trim_end())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Expected-output path for a test case: `input` becomes `output` in the
/// file name, directories untouched
pub fn expected_path_for(test_case: &Path) -> Result<PathBuf> {
    let file_name = test_case
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Usage(format!("'{}' is not a file", test_case.display())))?;

    if !file_name.contains("input") {
        return Err(Error::Usage(format!(
            "test case file name '{}' does not contain 'input'",
            file_name
        )));
    }

    Ok(test_case.with_file_name(file_name.replace("input", "output")))
}
