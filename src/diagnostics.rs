use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessesToUpdate, System};

const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Optional run instrumentation: a background resident-memory sampler plus
/// labeled event durations, written out as two CSV files.
///
/// An explicit context object rather than process-wide state; a disabled
/// instance records nothing and writes nothing.
pub struct Diagnostics {
    memory_samples: Arc<Mutex<Vec<f64>>>,
    events: Mutex<Vec<(String, f64)>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    enabled: bool,
}

impl Diagnostics {
    /// Start the memory sampler when enabled; a disabled context is inert.
    pub fn new(enabled: bool) -> Self {
        let memory_samples = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = if enabled {
            let samples = Arc::clone(&memory_samples);
            let stop_flag = Arc::clone(&stop);
            Some(std::thread::spawn(move || {
                let pid = Pid::from_u32(std::process::id());
                let mut system = System::new();
                while !stop_flag.load(Ordering::Relaxed) {
                    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                    if let Some(process) = system.process(pid) {
                        let megabytes = process.memory() as f64 / 1024.0 / 1024.0;
                        if let Ok(mut samples) = samples.lock() {
                            samples.push(megabytes);
                        }
                    }
                    std::thread::sleep(SAMPLE_INTERVAL);
                }
            }))
        } else {
            None
        };

        Self {
            memory_samples,
            events: Mutex::new(Vec::new()),
            stop,
            handle,
            enabled,
        }
    }

    /// Record the duration of an event started at `start`.
    pub fn record_event(&self, label: &str, start: Instant) {
        if !self.enabled {
            return;
        }
        if let Ok(mut events) = self.events.lock() {
            events.push((label.to_string(), start.elapsed().as_secs_f64()));
        }
    }

    /// Write `memory_usage.csv` and `timestamps.csv` into `dir`.
    pub fn write_reports(&self, dir: &Path) -> std::io::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let samples = self
            .memory_samples
            .lock()
            .map(|samples| samples.clone())
            .unwrap_or_default();
        let memory_rows: Vec<Vec<String>> = samples
            .iter()
            .enumerate()
            .map(|(index, megabytes)| vec![index.to_string(), format!("{megabytes:.2}")])
            .collect();
        write_csv(
            &dir.join("memory_usage.csv"),
            &["Time (s)", "Memory Usage (MB)"],
            &memory_rows,
        )?;

        let events = self
            .events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default();
        let event_rows: Vec<Vec<String>> = events
            .iter()
            .map(|(label, seconds)| vec![label.clone(), format!("{seconds:.6}")])
            .collect();
        write_csv(
            &dir.join("timestamps.csv"),
            &["Label", "Duration (s)"],
            &event_rows,
        )
    }
}

impl Drop for Diagnostics {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Write a header plus rows as comma-separated values.
pub fn write_csv(path: &Path, header: &[&str], rows: &[Vec<String>]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", header.join(","))?;
    for row in rows {
        writeln!(writer, "{}", row.join(","))?;
    }
    Ok(())
}
