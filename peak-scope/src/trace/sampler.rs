use std::{
    io::{self, BufRead, BufReader, Read},
    process::{Child, Command, Stdio},
    sync::mpsc::{self, Receiver, SyncSender, TryRecvError},
    thread,
    time::{Duration, Instant},
};

use nix::{
    errno::Errno,
    sys::signal::{Signal, kill},
    unistd::Pid,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    model::cli::SamplerCommand,
    trace::{LineStatus, SampleSource, SamplerLauncher},
};

/// Lines buffered between the reader thread and the consumer.
const LINE_BUFFER: usize = 4096;
const EXIT_POLL: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("failed to start sampler `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("sampler stdout was not captured")]
    NoStdout,

    #[error("sampler i/o: {0}")]
    Io(#[from] io::Error),

    #[error("signalling sampler: {0}")]
    Signal(#[from] Errno),
}

/// Launches the configured sampler as a child process.
pub struct ProcessLauncher {
    cmd: SamplerCommand,
    grace: Duration,
}

impl ProcessLauncher {
    pub fn new(cmd: SamplerCommand, grace: Duration) -> Self {
        Self { cmd, grace }
    }
}

impl SamplerLauncher for ProcessLauncher {
    type Source = SamplerProcess;

    fn launch(&mut self) -> Result<SamplerProcess, SamplerError> {
        SamplerProcess::spawn(&self.cmd, self.grace)
    }
}

/// A sampler child plus the thread forwarding its stdout.
///
/// Each process gets its own channel, so once the handle is dropped nothing
/// it printed can be seen by anyone else.
pub struct SamplerProcess {
    child: Child,
    lines: Receiver<String>,
    grace: Duration,
    terminated: bool,
}

impl SamplerProcess {
    pub fn spawn(cmd: &SamplerCommand, grace: Duration) -> Result<Self, SamplerError> {
        let mut child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SamplerError::Spawn {
                program: cmd.program.clone(),
                source,
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SamplerError::NoStdout);
        };

        let (tx, rx) = mpsc::sync_channel(LINE_BUFFER);
        let pid = child.id();
        let spawned = thread::Builder::new()
            .name(format!("sampler-{pid}"))
            .spawn(move || forward_lines(stdout, tx));
        if let Err(e) = spawned {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e.into());
        }

        debug!(pid, cmd = %cmd.display(), "sampler started");

        Ok(Self {
            child,
            lines: rx,
            grace,
            terminated: false,
        })
    }
}

fn forward_lines<R: Read>(stdout: R, tx: SyncSender<String>) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                if tx.send(line).is_err() {
                    // consumer dropped the handle
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!(error = %e, "sampler stdout read failed");
                break;
            }
        }
    }
}

impl SampleSource for SamplerProcess {
    fn try_next_line(&mut self) -> LineStatus {
        match self.lines.try_recv() {
            Ok(line) => LineStatus::Line(line),
            Err(TryRecvError::Empty) => LineStatus::Pending,
            Err(TryRecvError::Disconnected) => LineStatus::Closed,
        }
    }

    /// SIGTERM, wait up to the grace period, then SIGKILL.
    fn terminate(&mut self) -> Result<(), SamplerError> {
        if self.terminated {
            return Ok(());
        }

        // the flag is only set once the child is reaped, so a failed attempt
        // is retried by Drop
        let pid = self.child.id();
        if let Some(status) = self.child.try_wait()? {
            debug!(pid, %status, "sampler already exited");
            self.terminated = true;
            return Ok(());
        }

        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => return Err(e.into()),
        }

        let deadline = Instant::now() + self.grace;
        loop {
            if let Some(status) = self.child.try_wait()? {
                debug!(pid, %status, "sampler terminated");
                self.terminated = true;
                return Ok(());
            }
            if Instant::now() >= deadline {
                break;
            }
            thread::sleep(EXIT_POLL);
        }

        warn!(pid, grace_ms = self.grace.as_millis() as u64, "sampler ignored SIGTERM, killing");
        self.child.kill()?;
        self.child.wait()?;
        self.terminated = true;
        Ok(())
    }

    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }
}

impl Drop for SamplerProcess {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            warn!(error = %e, "failed to stop sampler");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> SamplerCommand {
        SamplerCommand {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    fn collect_until_closed(p: &mut SamplerProcess) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while Instant::now() < deadline {
            match p.try_next_line() {
                LineStatus::Line(l) => out.push(l),
                LineStatus::Pending => thread::sleep(Duration::from_millis(5)),
                LineStatus::Closed => return out,
            }
        }
        panic!("sampler output never closed");
    }

    #[test]
    fn forwards_stdout_lines() {
        let mut p = SamplerProcess::spawn(&sh("printf 'one\\ntwo\\n'"), Duration::from_secs(1))
            .unwrap();
        assert_eq!(collect_until_closed(&mut p), vec!["one", "two"]);
        p.terminate().unwrap();
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let cmd = SamplerCommand {
            program: "/nonexistent/peak-scope-sampler".to_string(),
            args: Vec::new(),
        };
        let err = SamplerProcess::spawn(&cmd, Duration::from_millis(10)).err().unwrap();
        assert!(matches!(err, SamplerError::Spawn { .. }));
    }

    #[test]
    fn terminate_stops_long_running_sampler() {
        let mut p = SamplerProcess::spawn(&sh("while true; do sleep 1; done"), Duration::from_secs(2))
            .unwrap();
        p.terminate().unwrap();
        assert!(p.child.try_wait().unwrap().is_some());
        // second call is a no-op
        p.terminate().unwrap();
    }

    #[test]
    fn marked_terminated_only_once_reaped() {
        let mut p = SamplerProcess::spawn(&sh("exec sleep 5"), Duration::from_secs(1)).unwrap();
        assert!(!p.terminated);
        p.terminate().unwrap();
        assert!(p.terminated);
        assert!(p.child.try_wait().unwrap().is_some());
    }

    #[test]
    fn unread_lines_die_with_their_sampler() {
        let mut launcher = ProcessLauncher::new(sh("echo old; exec sleep 5"), Duration::from_secs(1));
        let mut first = launcher.launch().unwrap();
        // let the line reach the channel, then drop it unread
        thread::sleep(Duration::from_millis(200));
        first.terminate().unwrap();
        drop(first);

        let mut launcher = ProcessLauncher::new(sh("echo new"), Duration::from_secs(1));
        let mut second = launcher.launch().unwrap();
        assert_eq!(collect_until_closed(&mut second), vec!["new"]);
    }

    #[test]
    fn stubborn_sampler_is_killed_after_grace() {
        let mut p = SamplerProcess::spawn(
            &sh("trap '' TERM; while true; do sleep 1; done"),
            Duration::from_millis(100),
        )
        .unwrap();
        // give the shell time to install the trap
        thread::sleep(Duration::from_millis(200));
        let started = Instant::now();
        p.terminate().unwrap();
        assert!(p.child.try_wait().unwrap().is_some());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
