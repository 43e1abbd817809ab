//! End-to-end integration tests for the FTP harness
//!
//! These tests run the harness against the bundled `mock_ftpd` binary:
//! 1. Write server configs, test cases and expected outputs to a temp dir
//! 2. Run the harness (as a library or as the CLI binary)
//! 3. Check verdicts, exit codes and that the test port is released
//!
//! All tests are serialized: cleanup kills every `mock_ftpd` of this user.

use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Command;

use ftp_harness::{Error, HarnessConfig, Runner, Verdict};
use serial_test::serial;
use tempfile::TempDir;

/// Test context with an isolated test environment
struct TestContext {
    /// Keeps the temp dir alive
    _temp: TempDir,
    root: PathBuf,
    config_dir: PathBuf,
    testcase_dir: PathBuf,
    harness_config: PathBuf,
    port: u16,
}

impl TestContext {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp.path().to_path_buf();
        let config_dir = root.join("configurations");
        let testcase_dir = root.join("testcases");
        fs::create_dir_all(&config_dir).expect("Failed to create config dir");
        fs::create_dir_all(&testcase_dir).expect("Failed to create testcase dir");

        let port = free_port();
        let harness_config = root.join("harness.toml");

        let ctx = Self {
            _temp: temp,
            root,
            config_dir,
            testcase_dir,
            harness_config,
            port,
        };
        ctx.write_harness_config(2);
        ctx
    }

    fn write_harness_config(&self, read_timeout_secs: u64) {
        let content = format!(
            r#"
[server]
port = {port}
startup_grace_ms = 100

[readiness]
poll_interval_ms = 50
timeout_secs = 5

[session]
connect_attempts = 3
connect_backoff_ms = 100
read_timeout_secs = {read_timeout_secs}

[paths]
config_dir = "{config_dir}"
testcase_dir = "{testcase_dir}"
"#,
            port = self.port,
            read_timeout_secs = read_timeout_secs,
            config_dir = self.config_dir.display(),
            testcase_dir = self.testcase_dir.display(),
        );
        fs::write(&self.harness_config, content).expect("Failed to write harness config");
    }

    /// Write a mock server config; `extra` is appended verbatim
    fn server_config(&self, name: &str, extra: &str) {
        let content = format!("global {{\nPORT=\"{}\"\n{}\n}}\n", self.port, extra);
        fs::write(self.config_dir.join(name), content).expect("Failed to write server config");
    }

    /// Write a test case and its expected output, returning the test case path
    fn test_case(&self, name: &str, input: &str, output: &str) -> PathBuf {
        let input_path = self.testcase_dir.join(format!("{}_input.txt", name));
        let output_path = self.testcase_dir.join(format!("{}_output.txt", name));
        fs::write(&input_path, input).expect("Failed to write test case");
        fs::write(&output_path, output).expect("Failed to write expected output");
        input_path
    }

    fn config(&self) -> HarnessConfig {
        HarnessConfig::load(Some(&self.harness_config)).expect("Failed to load harness config")
    }

    fn runner(&self, verbose: bool) -> Runner {
        Runner::new(&mock_ftpd(), self.config(), verbose)
    }

    /// Run the harness CLI
    fn run_harness(&self, args: &[&str]) -> HarnessOutput {
        let output = Command::new(env!("CARGO_BIN_EXE_ftp-harness"))
            .arg("-c")
            .arg(&self.harness_config)
            .args(args)
            .current_dir(&self.root)
            .output()
            .expect("Failed to run harness");

        HarnessOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            code: output.status.code(),
        }
    }

    fn assert_port_free(&self) {
        assert!(
            TcpListener::bind(("127.0.0.1", self.port)).is_ok(),
            "Port {} still bound after the test",
            self.port
        );
    }
}

/// Output from a harness run
#[derive(Debug)]
struct HarnessOutput {
    stdout: String,
    stderr: String,
    code: Option<i32>,
}

fn mock_ftpd() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mock_ftpd"))
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind ephemeral port");
    listener.local_addr().unwrap().port()
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("Non UTF-8 temp path")
}

// ============== Library-level tests ==============

#[tokio::test]
#[serial]
async fn test_login_scenario_passes() {
    let ctx = TestContext::new();
    ctx.server_config("bftpd.conf", "GREETING=\"220 Welcome\"");
    let case = ctx.test_case(
        "login",
        "bftpd.conf\n1:USER anonymous\n",
        "220 Welcome\n230 Login successful\n",
    );

    let result = ctx.runner(false).run_one(&case).await.unwrap();

    assert_eq!(result.verdict, Verdict::Pass);
    assert_eq!(result.actual, ["220 Welcome", "230 Login successful"]);
    ctx.assert_port_free();
}

#[tokio::test]
#[serial]
async fn test_transcript_length_is_commands_plus_greeting() {
    let ctx = TestContext::new();
    ctx.server_config("bftpd.conf", "");
    let case = ctx.test_case(
        "multi",
        "bftpd.conf\n1:USER alice\n1:PASS secret\n1:SYST\n1:BOGUS\n1:QUIT\n",
        "220 mock_ftpd ready.\n331 Password please.\n230 User logged in.\n215 UNIX Type: L8\n500 Unknown command.\n221 Goodbye.\n",
    );

    let result = ctx.runner(false).run_one(&case).await.unwrap();

    assert_eq!(result.actual.len(), 5 + 1);
    assert_eq!(result.verdict, Verdict::Pass, "mismatch: {:?}", result.mismatch);
    ctx.assert_port_free();
}

#[tokio::test]
#[serial]
async fn test_mismatch_fails() {
    let ctx = TestContext::new();
    ctx.server_config("bftpd.conf", "");
    let case = ctx.test_case(
        "wrong",
        "bftpd.conf\n1:NOOP\n1:SYST\n",
        "220 mock_ftpd ready.\n215 UNIX Type: L8\n200 OK\n",
    );

    let result = ctx.runner(true).run_one(&case).await.unwrap();

    assert_eq!(result.verdict, Verdict::Fail);
    assert!(result.mismatch.is_some());
    ctx.assert_port_free();
}

#[tokio::test]
#[serial]
async fn test_expected_header_line_is_dropped() {
    let ctx = TestContext::new();
    ctx.server_config("bftpd.conf", "");
    // First line lacks the 220 code, so it is not part of the expectation
    let case = ctx.test_case(
        "header",
        "bftpd.conf\n1:NOOP\n",
        "# captured from bftpd\n220 mock_ftpd ready.\n200 OK\n",
    );

    let result = ctx.runner(false).run_one(&case).await.unwrap();
    assert_eq!(result.verdict, Verdict::Pass);
}

#[tokio::test]
#[serial]
async fn test_slow_startup_is_awaited() {
    let ctx = TestContext::new();
    ctx.server_config("slow.conf", "STARTUP_DELAY_MS=\"700\"");
    let case = ctx.test_case("slow", "slow.conf\n1:NOOP\n", "220 mock_ftpd ready.\n200 OK\n");

    let result = ctx.runner(false).run_one(&case).await.unwrap();
    assert_eq!(result.verdict, Verdict::Pass);
    ctx.assert_port_free();
}

#[tokio::test]
#[serial]
async fn test_startup_failure() {
    let ctx = TestContext::new();
    ctx.server_config("broken.conf", "FAIL_ON_START=\"yes\"");
    let case = ctx.test_case("broken", "broken.conf\n1:NOOP\n", "220 x\n200 OK\n");

    let err = ctx.runner(false).run_one(&case).await.unwrap_err();
    // Exit is normally seen after the grace period, but a slow spawn may only
    // be noticed by the readiness poll
    assert!(
        matches!(err, Error::ServerExited { .. } | Error::ServerNotReady { .. }),
        "got {:?}",
        err
    );
    ctx.assert_port_free();
}

#[tokio::test]
#[serial]
async fn test_read_timeout_aborts_and_cleans_up() {
    let ctx = TestContext::new();
    ctx.write_harness_config(1);
    ctx.server_config("bftpd.conf", "");
    let case = ctx.test_case(
        "hang",
        "bftpd.conf\n1:NOOP\n1:HANG\n1:NOOP\n",
        "220 mock_ftpd ready.\n200 OK\n200 OK\n200 OK\n",
    );

    let started = std::time::Instant::now();
    let err = ctx.runner(false).run_one(&case).await.unwrap_err();

    assert!(matches!(err, Error::ReadTimeout(1)), "got {:?}", err);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    ctx.assert_port_free();
}

#[tokio::test]
#[serial]
async fn test_run_all_continues_past_errors() {
    let ctx = TestContext::new();
    ctx.server_config("bftpd.conf", "");
    ctx.test_case("a_pass", "bftpd.conf\n1:NOOP\n", "220 mock_ftpd ready.\n200 OK\n");
    ctx.test_case("b_missing_conf", "nope.conf\n1:NOOP\n", "220 mock_ftpd ready.\n200 OK\n");
    ctx.test_case("c_fail", "bftpd.conf\n1:NOOP\n", "220 mock_ftpd ready.\n500 Nope\n");
    ctx.test_case("d_empty", "bftpd.conf\n", "220 mock_ftpd ready.\n");
    ctx.test_case("e_pass", "bftpd.conf\n1:SYST\n", "220 mock_ftpd ready.\n215 UNIX Type: L8\n");

    let summary = ctx.runner(false).run_all(None).await.unwrap();

    assert_eq!(summary.passed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errored, 2);
    assert_eq!(summary.exit_code(), 1);
    ctx.assert_port_free();
}

#[cfg(unix)]
#[tokio::test]
#[serial]
async fn test_leftover_server_is_cleaned_before_start() {
    use std::os::unix::process::ExitStatusExt;

    let ctx = TestContext::new();
    ctx.server_config("stale.conf", "GREETING=\"220 stale instance\"");
    ctx.server_config("bftpd.conf", "GREETING=\"220 Welcome\"");

    // A server from an earlier run still holds the test port
    let mut leftover = Command::new(mock_ftpd())
        .arg("-c")
        .arg(ctx.config_dir.join("stale.conf"))
        .stdout(std::process::Stdio::null())
        .spawn()
        .expect("Failed to spawn leftover server");
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while std::net::TcpStream::connect(("127.0.0.1", ctx.port)).is_err() {
        assert!(std::time::Instant::now() < deadline, "leftover server never listened");
        std::thread::sleep(std::time::Duration::from_millis(20));
    }

    let case = ctx.test_case(
        "fresh",
        "bftpd.conf\n1:USER anonymous\n",
        "220 Welcome\n230 Login successful\n",
    );
    let result = ctx.runner(false).run_one(&case).await.unwrap();

    assert_eq!(result.verdict, Verdict::Pass, "actual: {:?}", result.actual);
    let status = leftover.wait().expect("Failed to reap leftover server");
    assert_eq!(status.signal(), Some(libc::SIGKILL));
    ctx.assert_port_free();
}

// ============== CLI tests ==============

#[test]
#[serial]
fn test_cli_single_pass() {
    let ctx = TestContext::new();
    ctx.server_config("bftpd.conf", "GREETING=\"220 Welcome\"");
    let case = ctx.test_case(
        "login",
        "bftpd.conf\n1:USER anonymous\n",
        "220 Welcome\n230 Login successful\n",
    );

    let output = ctx.run_harness(&["-p", path_str(&mock_ftpd()), "-f", path_str(&case)]);

    assert_eq!(output.code, Some(0), "{:?}", output);
    assert!(output.stdout.contains("PASS"), "{:?}", output);
    ctx.assert_port_free();
}

#[test]
#[serial]
fn test_cli_single_fail_verbose_dumps_transcripts() {
    let ctx = TestContext::new();
    ctx.server_config("bftpd.conf", "");
    let case = ctx.test_case(
        "fail",
        "bftpd.conf\n1:NOOP\n",
        "220 mock_ftpd ready.\n202 Not what happens\n",
    );

    let output = ctx.run_harness(&["-p", path_str(&mock_ftpd()), "-f", path_str(&case), "-v"]);

    // A failing verdict is not an error in single-test mode
    assert_eq!(output.code, Some(0), "{:?}", output);
    assert!(output.stdout.contains("FAIL"));
    assert!(output.stdout.contains("Expected:"));
    assert!(output.stdout.contains("202 Not what happens"));
    assert!(output.stdout.contains("Actual:"));
    assert!(output.stdout.contains("200 OK"));
    // Verbose dumps transcripts only; server output stays out of the report
    assert!(!output.stdout.contains("mock_ftpd: listening"), "{:?}", output);
}

#[test]
#[serial]
fn test_cli_inherit_output_forwards_server_output() {
    let ctx = TestContext::new();
    let config = fs::read_to_string(&ctx.harness_config).unwrap();
    fs::write(
        &ctx.harness_config,
        config.replace("startup_grace_ms = 100", "startup_grace_ms = 100\ninherit_output = true"),
    )
    .unwrap();
    ctx.server_config("bftpd.conf", "");
    let case = ctx.test_case("noop", "bftpd.conf\n1:NOOP\n", "220 mock_ftpd ready.\n200 OK\n");

    let output = ctx.run_harness(&["-p", path_str(&mock_ftpd()), "-f", path_str(&case)]);

    assert_eq!(output.code, Some(0), "{:?}", output);
    assert!(output.stdout.contains("mock_ftpd: listening"), "{:?}", output);
}

#[test]
#[serial]
fn test_cli_batch_runs_in_lexical_order() {
    let ctx = TestContext::new();
    ctx.server_config("bftpd.conf", "");
    ctx.test_case("t2", "bftpd.conf\n1:SYST\n", "220 mock_ftpd ready.\n215 UNIX Type: L8\n");
    ctx.test_case("t1", "bftpd.conf\n1:NOOP\n", "220 mock_ftpd ready.\n200 OK\n");
    ctx.test_case("t3", "bftpd.conf\n1:QUIT\n", "220 mock_ftpd ready.\n221 Goodbye.\n");

    let output = ctx.run_harness(&["-p", path_str(&mock_ftpd())]);

    assert_eq!(output.code, Some(0), "{:?}", output);
    let first = output.stdout.find("t1_input.txt").expect("t1 missing");
    let second = output.stdout.find("t2_input.txt").expect("t2 missing");
    let third = output.stdout.find("t3_input.txt").expect("t3 missing");
    assert!(first < second && second < third);
    assert!(output.stdout.contains("3 passed, 0 failed, 0 errored"));
}

#[test]
#[serial]
fn test_cli_batch_failure_exits_one() {
    let ctx = TestContext::new();
    ctx.server_config("bftpd.conf", "");
    ctx.test_case("t1", "bftpd.conf\n1:NOOP\n", "220 mock_ftpd ready.\n500 nope\n");

    let output = ctx.run_harness(&["-p", path_str(&mock_ftpd())]);
    assert_eq!(output.code, Some(1), "{:?}", output);
}

#[test]
#[serial]
fn test_cli_errors_exit_two() {
    let ctx = TestContext::new();
    ctx.server_config("bftpd.conf", "");
    ctx.server_config("broken.conf", "FAIL_ON_START=\"yes\"");
    let missing_conf = ctx.test_case("missing", "absent.conf\n1:NOOP\n", "220 x\n");
    let empty = ctx.test_case("empty", "bftpd.conf\n1:\n", "220 x\n");
    let broken = ctx.test_case("broken", "broken.conf\n1:NOOP\n", "220 x\n");
    let mock = mock_ftpd();

    for case in [&missing_conf, &empty, &broken] {
        let output = ctx.run_harness(&["-p", path_str(&mock), "-f", path_str(case)]);
        assert_eq!(output.code, Some(2), "{:?}", output);
        assert!(output.stderr.contains("Error:"), "{:?}", output);
    }
    ctx.assert_port_free();
}

#[test]
#[serial]
fn test_cli_usage_errors_exit_two() {
    let ctx = TestContext::new();

    // -p is required
    let output = ctx.run_harness(&[]);
    assert_eq!(output.code, Some(2), "{:?}", output);

    let output = ctx.run_harness(&["-p", "/nonexistent/bftpd"]);
    assert_eq!(output.code, Some(2), "{:?}", output);
    assert!(output.stderr.contains("not found"));
}
