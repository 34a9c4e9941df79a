//! Background server process management.
//!
//! The server runs detached; its PID is recorded in a file so later
//! invocations can check on it or stop it.

use anyhow::{Context, Result};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

const READY_POLL: Duration = Duration::from_millis(100);

pub struct Supervisor {
    pid_file: PathBuf,
    server_bin: PathBuf,
}

impl Supervisor {
    pub fn new(pid_file: impl Into<PathBuf>, server_bin: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: pid_file.into(),
            server_bin: server_bin.into(),
        }
    }

    /// PID file under the local data dir; server binary next to this one,
    /// falling back to `salsa-server` on PATH.
    pub fn default_location() -> Self {
        let pid_file = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("salsa")
            .join("salsa-server.pid");

        let server_bin = std::env::current_exe()
            .ok()
            .map(|exe| exe.with_file_name("salsa-server"))
            .filter(|path| path.exists())
            .unwrap_or_else(|| PathBuf::from("salsa-server"));

        Self::new(pid_file, server_bin)
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// PID recorded by a previous start, if the file holds one.
    pub fn recorded_pid(&self) -> Option<i32> {
        std::fs::read_to_string(&self.pid_file)
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// Whether the recorded process is alive (checked with signal 0).
    pub fn is_server_running(&self) -> bool {
        match self.recorded_pid() {
            Some(pid) if pid > 0 => kill(Pid::from_raw(pid), None).is_ok(),
            _ => false,
        }
    }

    /// Spawn the server detached with null stdio and record its PID.
    pub fn start_server(&self, port: u16) -> Result<u32> {
        let mut command = Command::new(&self.server_bin);
        command
            .arg("--port")
            .arg(port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        // Own process group: Ctrl-C in the client's terminal must not reach it
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);

        let child = command
            .spawn()
            .with_context(|| format!("can't start {}", self.server_bin.display()))?;

        let pid = child.id();
        if let Some(dir) = self.pid_file.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("can't create {}", dir.display()))?;
        }
        std::fs::write(&self.pid_file, pid.to_string())
            .with_context(|| format!("can't write {}", self.pid_file.display()))?;

        tracing::debug!(pid, bin = %self.server_bin.display(), "Started server");
        Ok(pid)
    }

    /// Send SIGTERM to the recorded server and forget it.
    /// Returns `false` when no live server was recorded.
    pub fn stop_server(&self) -> Result<bool> {
        let pid = match self.recorded_pid() {
            Some(pid) if self.is_server_running() => pid,
            _ => {
                self.clear_pid_file();
                return Ok(false);
            }
        };

        kill(Pid::from_raw(pid), Signal::SIGTERM)
            .with_context(|| format!("can't signal server process {pid}"))?;
        self.clear_pid_file();
        Ok(true)
    }

    fn clear_pid_file(&self) {
        let _ = std::fs::remove_file(&self.pid_file);
    }
}

/// Poll until something accepts TCP connections on `host:port`.
pub async fn wait_until_ready(host: &str, port: u16, deadline: Duration) -> Result<()> {
    let started = tokio::time::Instant::now();
    loop {
        match tokio::net::TcpStream::connect((host, port)).await {
            Ok(_) => return Ok(()),
            Err(e) if started.elapsed() >= deadline => {
                return Err(e).with_context(|| {
                    format!("server at {host}:{port} not reachable after {deadline:?}")
                });
            }
            Err(_) => tokio::time::sleep(READY_POLL).await,
        }
    }
}
