//! Mock FTP daemon binary for integration testing
//!
//! Accepts the same invocation as the real daemon (`-c <config> [-D]`) and
//! speaks just enough of the control protocol to exercise the harness
//! without a real FTP server.
//!
//! Recognized config keys (`KEY="value"`, one per line):
//! - `PORT` - port to listen on (default 10566)
//! - `GREETING` - greeting line (default `220 mock_ftpd ready.`)
//! - `FAIL_ON_START` - `yes` to exit with status 1 immediately
//! - `STARTUP_DELAY_MS` - sleep before binding the listener

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::time::Duration;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.iter().position(|a| a == "-c").and_then(|i| args.get(i + 1)) {
        Some(path) => path.clone(),
        None => {
            eprintln!("usage: mock_ftpd -c <config> [-D]");
            std::process::exit(2);
        }
    };

    let config = match std::fs::read_to_string(&config_path) {
        Ok(content) => parse_config(&content),
        Err(e) => {
            eprintln!("mock_ftpd: cannot read {}: {}", config_path, e);
            std::process::exit(1);
        }
    };

    if config.get("FAIL_ON_START").map(String::as_str) == Some("yes") {
        eprintln!("mock_ftpd: configured to fail on start");
        std::process::exit(1);
    }

    if let Some(delay) = config.get("STARTUP_DELAY_MS").and_then(|v| v.parse().ok()) {
        std::thread::sleep(Duration::from_millis(delay));
    }

    let port: u16 = config
        .get("PORT")
        .and_then(|v| v.parse().ok())
        .unwrap_or(10566);
    let greeting = config
        .get("GREETING")
        .cloned()
        .unwrap_or_else(|| "220 mock_ftpd ready.".to_string());

    let listener = match TcpListener::bind(("127.0.0.1", port)) {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("mock_ftpd: bind 127.0.0.1:{} failed: {}", port, e);
            std::process::exit(1);
        }
    };

    println!("mock_ftpd: listening on 127.0.0.1:{}", port);

    for stream in listener.incoming().flatten() {
        let greeting = greeting.clone();
        std::thread::spawn(move || serve(stream, &greeting));
    }
}

/// Parse `KEY="value"` / `KEY=value` lines, ignoring anything else
fn parse_config(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter_map(|line| line.trim().split_once('='))
        .map(|(key, value)| {
            (
                key.trim().to_string(),
                value.trim().trim_matches('"').to_string(),
            )
        })
        .collect()
}

fn serve(stream: TcpStream, greeting: &str) {
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(_) => return,
    };
    let mut reader = BufReader::new(stream);
    let mut state = MockState::default();

    if send_line(&mut writer, greeting).is_err() {
        return;
    }

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        let reply = state.process_command(line.trim_end());
        if let Some(reply) = reply {
            if send_line(&mut writer, &reply).is_err() {
                break;
            }
        }
        if state.quit {
            break;
        }
    }
}

fn send_line<W: Write>(writer: &mut W, line: &str) -> std::io::Result<()> {
    writer.write_all(format!("{}\r\n", line).as_bytes())?;
    writer.flush()
}

#[derive(Default)]
struct MockState {
    pending_user: Option<String>,
    logged_in: bool,
    quit: bool,
}

impl MockState {
    fn process_command(&mut self, command: &str) -> Option<String> {
        let (verb, arg) = match command.split_once(' ') {
            Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.trim()),
            None => (command.to_ascii_uppercase(), ""),
        };

        let reply = match verb.as_str() {
            "USER" if arg == "anonymous" => {
                self.logged_in = true;
                "230 Login successful".to_string()
            }
            "USER" if arg.is_empty() => "501 Syntax error in parameters.".to_string(),
            "USER" => {
                self.pending_user = Some(arg.to_string());
                "331 Password please.".to_string()
            }
            "PASS" => match self.pending_user.take() {
                Some(_) => {
                    self.logged_in = true;
                    "230 User logged in.".to_string()
                }
                None => "503 Login with USER first.".to_string(),
            },
            "SYST" => "215 UNIX Type: L8".to_string(),
            "NOOP" => "200 OK".to_string(),
            "PWD" if self.logged_in => "257 \"/\" is the current directory.".to_string(),
            "PWD" => "530 Please login with USER and PASS.".to_string(),
            "QUIT" => {
                self.quit = true;
                "221 Goodbye.".to_string()
            }
            // Never answers, for read-timeout tests
            "HANG" => return None,
            _ => "500 Unknown command.".to_string(),
        };

        Some(reply)
    }
}
