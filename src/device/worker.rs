//! device/worker — periodic dedup scanning on a background thread.
//!
//! The worker sleeps on a condvar for the interval, runs one scan_once() with the
//! device's current budget, and repeats. stop() (or Drop) wakes it and joins.
//! Once the device starts tearing down the worker exits on its own.

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::DeviceError;

use super::core::Device;

struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

pub struct ScanWorker {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl ScanWorker {
    /// Start scanning `device` every `interval`.
    pub fn spawn(device: Arc<Device>, interval: Duration) -> std::io::Result<Self> {
        let signal = Arc::new(StopSignal {
            stopped: Mutex::new(false),
            cv: Condvar::new(),
        });
        let sig = Arc::clone(&signal);
        let handle = std::thread::Builder::new()
            .name("srd-scan".to_string())
            .spawn(move || run(device, interval, sig))?;
        info!("srd: scan worker started (every {} ms)", interval.as_millis());
        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Ask the worker to stop and wait for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        {
            let mut stopped = self.signal.stopped.lock();
            *stopped = true;
        }
        self.signal.cv.notify_all();
        if let Some(h) = self.handle.take() {
            if h.join().is_err() {
                warn!("srd: scan worker panicked");
            }
        }
    }
}

impl Drop for ScanWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(device: Arc<Device>, interval: Duration, signal: Arc<StopSignal>) {
    loop {
        {
            let mut stopped = signal.stopped.lock();
            if !*stopped {
                signal.cv.wait_for(&mut stopped, interval);
            }
            if *stopped {
                break;
            }
        }
        match device.scan_once(device.scan_window_budget()) {
            Ok(r) => debug!(
                "srd: periodic scan: {} merged, cursor {}",
                r.merged, r.cursor
            ),
            Err(DeviceError::ShuttingDown) => break,
            Err(e) => warn!("srd: periodic scan failed: {}", e),
        }
    }
    debug!("srd: scan worker exiting");
}

impl Device {
    /// Start the periodic scanner if `scan_interval_ms` is non-zero.
    pub fn start_scan_worker(self: &Arc<Self>) -> std::io::Result<Option<ScanWorker>> {
        let ms = self.cfg.scan_interval_ms;
        if ms == 0 {
            return Ok(None);
        }
        ScanWorker::spawn(Arc::clone(self), Duration::from_millis(ms)).map(Some)
    }
}
