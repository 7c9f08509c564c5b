use std::fs;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_cmd::Command;
use tempfile::TempDir;

/// An isolated `webchanges-rs` config directory for a single test (§10.7).
/// All commands run against this instead of the real `~/.config/`.
pub struct TestEnv {
    /// Root temporary directory (kept alive for the duration of the test).
    pub root: TempDir,
    pub config_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let config_dir = root.path().join("webchanges-rs");
        fs::create_dir_all(&config_dir).unwrap();
        Self { root, config_dir }
    }

    pub fn write_jobs(&self, yaml: &str) -> PathBuf {
        let path = self.config_dir.join("jobs.yaml");
        fs::write(&path, yaml).unwrap();
        path
    }

    pub fn write_config(&self, yaml: &str) -> PathBuf {
        let path = self.config_dir.join("config.yaml");
        fs::write(&path, yaml).unwrap();
        path
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("webchanges-rs").unwrap();
        cmd.env("WEBCHANGES_CONFIG_DIR", self.config_dir.display().to_string());
        cmd
    }
}

/// Serve a single fixed response body over plain HTTP on 127.0.0.1, bumping
/// the body on each call after the first so tests can exercise "changed"
/// without standing up a real web server (§10.7).
///
/// Not a full HTTP server: reads one request, ignores it, writes one
/// `200 OK` response, then waits for the next connection. Good enough for
/// a `url-simple` job pointed at `http://127.0.0.1:<port>/`.
pub struct HttpFixture {
    pub port: u16,
}

impl HttpFixture {
    /// Spawn a background thread serving `bodies` in order, repeating the
    /// last entry once exhausted.
    pub fn spawn(bodies: Vec<&'static str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let counter = AtomicUsize::new(0);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                use std::io::{Read, Write};
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);

                let index = counter.fetch_add(1, Ordering::SeqCst).min(bodies.len() - 1);
                let body = bodies[index];
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        Self { port }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }
}
