//! CLI command handling
//!
//! Validates the invocation, then runs either one test case or the whole
//! test directory and decides the process exit code.

use std::path::{Path, PathBuf};

use crate::commands::Args;
use crate::common::{paths, Error, HarnessConfig, Result};
use crate::testing::Runner;

/// Resolve and check the server binary
///
/// Relative paths are taken relative to the working directory, never looked
/// up on `PATH`.
pub fn validate_binary(binary: &Path) -> Result<PathBuf> {
    let path = paths::absolutize(binary)?;

    if !path.is_file() {
        return Err(Error::BinaryNotFound(binary.display().to_string()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path)?.permissions().mode();
        if mode & 0o111 == 0 {
            return Err(Error::BinaryNotExecutable(binary.display().to_string()));
        }
    }

    Ok(path)
}

/// Run the harness, returning the process exit code
///
/// Single-test mode exits 0 whatever the verdict; batch mode exits 1 if any
/// test failed or errored. Errors that abort the run are returned to the
/// caller.
pub async fn run(args: Args) -> Result<i32> {
    let binary = validate_binary(&args.binary)?;
    let config = HarnessConfig::load(args.config.as_deref())?;
    let runner = Runner::new(&binary, config, args.verbose);

    match args.file {
        Some(file) => {
            let file = paths::absolutize(&file)?;
            runner.run_one(&file).await?;
            Ok(0)
        }
        None => {
            let dir = args.dir.as_deref().map(paths::absolutize).transpose()?;
            let summary = runner.run_all(dir.as_deref()).await?;
            Ok(summary.exit_code())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary() {
        let err = validate_binary(Path::new("/nonexistent/bftpd")).unwrap_err();
        assert!(matches!(err, Error::BinaryNotFound(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_binary() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = validate_binary(file.path()).unwrap_err();
        assert!(matches!(err, Error::BinaryNotExecutable(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_binary() {
        use std::os::unix::fs::PermissionsExt;
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

        let path = validate_binary(file.path()).unwrap();
        assert_eq!(path, file.path());
    }

    #[test]
    fn test_directory_is_not_a_binary() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_binary(dir.path()),
            Err(Error::BinaryNotFound(_))
        ));
    }
}
