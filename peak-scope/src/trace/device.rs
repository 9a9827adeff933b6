use std::{
    io::{self, BufRead},
    sync::mpsc::Sender,
    thread::{self, JoinHandle},
};

use tracing::warn;

/// Everything the windowed main loop waits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceInput {
    Line(String),
    /// The device stream hit end-of-input.
    Closed,
    /// SIGINT / SIGTERM.
    Interrupted,
}

/// Forward device lines from `reader` until end-of-input.
///
/// Runs on its own thread so the interrupt handler can post into the same
/// channel while a read is blocked.
pub fn spawn_device_reader<R>(mut reader: R, tx: Sender<DeviceInput>) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("device-reader".to_string())
        .spawn(move || {
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                        if tx.send(DeviceInput::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!(error = %e, "device stream read failed");
                        break;
                    }
                }
            }
            let _ = tx.send(DeviceInput::Closed);
        })
}
