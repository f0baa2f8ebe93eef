//! Subprocess adapter running the CollateX command-line jar
//!
//! The engine input is written to a temporary file in the configured
//! directory and the jar is run as `java -jar <jar> -f json <input>`.
//! Standard output and error go to temporary files so a chatty engine can
//! never block on a full pipe while we wait for it. On Unix the child leads
//! its own process group, and timeout or cancellation kills the whole group.

use crate::collatex_http::truncate_detail;
use crate::started_at;
use collation_core::{
    AlignmentEngine, CancelFlag, EngineError, EngineInput, EngineRun, RunDetails,
};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const ENGINE_NAME: &str = "collatex-process";
const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub struct CollatexProcess {
    java: PathBuf,
    jar: PathBuf,
    temp_dir: PathBuf,
    timeout: Duration,
}

/// Kills the child and its process group if still running when dropped.
struct ChildGuard(Child);

impl ChildGuard {
    fn kill(&mut self) {
        #[cfg(unix)]
        {
            let _ = Command::new("kill")
                .args(["-KILL", "--", &format!("-{}", self.0.id())])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Ok(None) = self.0.try_wait() {
            self.kill();
        }
    }
}

fn read_all(file: &mut File) -> Result<String, EngineError> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn describe_exit(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl CollatexProcess {
    pub fn new(java: &Path, jar: &Path, temp_dir: &Path, timeout: Duration) -> Self {
        Self {
            java: java.to_path_buf(),
            jar: jar.to_path_buf(),
            temp_dir: temp_dir.to_path_buf(),
            timeout,
        }
    }

    fn wait_for_exit(
        &self,
        guard: &mut ChildGuard,
        cancel: &CancelFlag,
    ) -> Result<ExitStatus, EngineError> {
        let start = Instant::now();
        loop {
            if let Some(status) = guard.0.try_wait()? {
                return Ok(status);
            }
            if cancel.is_cancelled() {
                info!(engine = ENGINE_NAME, "Alignment cancelled, killing process");
                guard.kill();
                return Err(EngineError::Cancelled);
            }
            if start.elapsed() >= self.timeout {
                warn!(engine = ENGINE_NAME, timeout = ?self.timeout, "Killing alignment process");
                guard.kill();
                return Err(EngineError::Timeout(self.timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl AlignmentEngine for CollatexProcess {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn check_environment(&self) -> Result<(), EngineError> {
        if !self.java.is_file() {
            return Err(EngineError::Unavailable(format!(
                "java executable not found at {}",
                self.java.display()
            )));
        }
        if !self.jar.is_file() {
            return Err(EngineError::Unavailable(format!(
                "CollateX jar not found at {}",
                self.jar.display()
            )));
        }
        if !self.temp_dir.is_dir() {
            return Err(EngineError::Unavailable(format!(
                "temporary directory {} does not exist",
                self.temp_dir.display()
            )));
        }
        tempfile::tempfile_in(&self.temp_dir).map_err(|e| {
            EngineError::Unavailable(format!(
                "temporary directory {} is not writable: {}",
                self.temp_dir.display(),
                e
            ))
        })?;
        Ok(())
    }

    fn align(&self, input: &EngineInput, cancel: &CancelFlag) -> Result<EngineRun, EngineError> {
        self.check_environment()?;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let started = started_at();
        let start = Instant::now();

        let mut input_file = tempfile::Builder::new()
            .prefix("collatex-input-")
            .suffix(".json")
            .tempfile_in(&self.temp_dir)?;
        serde_json::to_writer(&mut input_file, input).map_err(std::io::Error::other)?;
        input_file.flush()?;

        let mut stdout_file = tempfile::tempfile_in(&self.temp_dir)?;
        let mut stderr_file = tempfile::tempfile_in(&self.temp_dir)?;

        debug!(engine = ENGINE_NAME, input = %input_file.path().display(), "Starting alignment process");
        let mut command = Command::new(&self.java);
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);
        let child = command
            .arg("-jar")
            .arg(&self.jar)
            .arg("-f")
            .arg("json")
            .arg(input_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file.try_clone()?))
            .stderr(Stdio::from(stderr_file.try_clone()?))
            .spawn()
            .map_err(|e| {
                EngineError::Unavailable(format!("cannot start {}: {}", self.java.display(), e))
            })?;
        let mut guard = ChildGuard(child);
        let status = self.wait_for_exit(&mut guard, cancel)?;

        let stdout = read_all(&mut stdout_file)?;
        if !status.success() {
            let stderr = read_all(&mut stderr_file)?;
            warn!(engine = ENGINE_NAME, status = %describe_exit(&status), "Alignment process failed");
            return Err(EngineError::Failed {
                status: describe_exit(&status),
                detail: truncate_detail(&stderr),
            });
        }
        if stdout.trim().is_empty() {
            return Err(EngineError::InvalidResponse(
                "engine produced no output".to_string(),
            ));
        }

        let output: serde_json::Value = serde_json::from_str(&stdout)
            .map_err(|e| EngineError::InvalidResponse(format!("{}: {}", e, truncate_detail(&stdout))))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            engine = ENGINE_NAME,
            witnesses = input.witness_count(),
            duration_ms,
            "Alignment finished"
        );

        Ok(EngineRun {
            output,
            details: RunDetails {
                engine: ENGINE_NAME.to_string(),
                started_at: started,
                duration_ms,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_environment_missing_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let engine = CollatexProcess::new(
            &dir.path().join("no-java"),
            &dir.path().join("no.jar"),
            dir.path(),
            Duration::from_secs(1),
        );
        let err = engine.check_environment().unwrap_err();
        assert!(err.is_environment());
        assert!(err.to_string().contains("java"));
    }

    #[test]
    fn test_check_environment_missing_jar() {
        let dir = tempfile::TempDir::new().unwrap();
        let java = dir.path().join("java");
        std::fs::write(&java, "").unwrap();
        let engine = CollatexProcess::new(
            &java,
            &dir.path().join("no.jar"),
            dir.path(),
            Duration::from_secs(1),
        );
        let err = engine.check_environment().unwrap_err();
        assert!(err.to_string().contains("jar"));
    }

    #[test]
    fn test_check_environment_missing_temp_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let java = dir.path().join("java");
        let jar = dir.path().join("collatex.jar");
        std::fs::write(&java, "").unwrap();
        std::fs::write(&jar, "").unwrap();
        let engine = CollatexProcess::new(&java, &jar, &dir.path().join("gone"), Duration::from_secs(1));
        assert!(matches!(
            engine.check_environment(),
            Err(EngineError::Unavailable(_))
        ));

        let engine = CollatexProcess::new(&java, &jar, dir.path(), Duration::from_secs(1));
        assert!(engine.check_environment().is_ok());
    }
}
