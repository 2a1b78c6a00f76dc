// tests/stress_concurrent.rs
//
// Run only this file:
//   cargo test --test stress_concurrent -- --nocapture
//
// Dispatchers and scanners on separate threads against one device:
// - each writer owns a disjoint set of slots and fills them from a tiny palette,
//   so merges across writers happen constantly;
// - a scanner thread and the periodic ScanWorker run concurrently;
// - afterwards every slot must hold its writer's last value and all counters
//   must agree with the table.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use oorandom::Rand64;

use srd::{Device, DeviceBuilder, Privilege, ScanWorker};

const PS: usize = 4096;
const WRITERS: usize = 4;
const SLOTS_PER_WRITER: usize = 8;

#[test]
fn writers_and_scanners_keep_invariants() -> Result<()> {
    let pages = (WRITERS * SLOTS_PER_WRITER) as u64;
    let cfg = DeviceBuilder::from_default().page_size(PS as u32).pages(pages).build();
    let dev = Arc::new(Device::new(cfg)?);
    let stop = Arc::new(AtomicBool::new(false));

    let worker = ScanWorker::spawn(Arc::clone(&dev), Duration::from_millis(1))?;

    let scanner = {
        let dev = Arc::clone(&dev);
        let stop = Arc::clone(&stop);
        thread::spawn(move || -> srd::Result<u64> {
            let mut runs = 0u64;
            while !stop.load(Ordering::Relaxed) {
                dev.trigger_merge(Privilege::Admin)?;
                runs += 1;
            }
            Ok(runs)
        })
    };

    let mut writers = Vec::new();
    for w in 0..WRITERS {
        let dev = Arc::clone(&dev);
        writers.push(thread::spawn(move || -> srd::Result<Vec<u8>> {
            let mut rng = Rand64::new(1000 + w as u128);
            let mut last = vec![0u8; SLOTS_PER_WRITER];
            let mut page = vec![0u8; PS];
            for _ in 0..600 {
                let k = rng.rand_range(0..SLOTS_PER_WRITER as u64) as usize;
                let slot = w * SLOTS_PER_WRITER + k;
                let v = [0x10u8, 0x20, 0x30][rng.rand_range(0..3) as usize];
                page.fill(v);
                dev.write((slot * PS) as u64, &page)?;
                last[k] = v;

                // read back something this writer owns
                let k2 = rng.rand_range(0..SLOTS_PER_WRITER as u64) as usize;
                let mut buf = vec![0u8; PS];
                dev.read(((w * SLOTS_PER_WRITER + k2) * PS) as u64, &mut buf)?;
                assert!(buf.iter().all(|&b| b == last[k2]), "writer {w} slot {k2} torn");
            }
            Ok(last)
        }));
    }

    let mut expected = Vec::new();
    for h in writers {
        let last = h.join().expect("writer panicked")?;
        expected.push(last);
    }
    stop.store(true, Ordering::Relaxed);
    let runs = scanner.join().expect("scanner panicked")?;
    worker.stop();
    assert!(runs > 0);

    dev.check_invariants()?;

    let mut buf = vec![0u8; PS];
    for (w, last) in expected.iter().enumerate() {
        for (k, &v) in last.iter().enumerate() {
            let slot = w * SLOTS_PER_WRITER + k;
            dev.read((slot * PS) as u64, &mut buf)?;
            assert!(buf.iter().all(|&b| b == v), "slot {slot}: expected {v:#x}");
        }
    }

    // Fully merged: at most one page per distinct value (0 for never-written slots).
    dev.scan_once(pages as u32)?;
    assert!(dev.allocated_pages() <= 4);
    assert_eq!(dev.allocated_pages() + dev.merged_pages(), pages);

    let rep = dev.shutdown();
    assert!(rep.freed <= 4);
    assert_eq!(dev.allocated_pages(), 0);
    Ok(())
}

#[test]
fn scan_worker_merges_in_background() -> Result<()> {
    let cfg = DeviceBuilder::from_default()
        .page_size(PS as u32)
        .pages(4)
        .scan_interval_ms(5)
        .build();
    let dev = Arc::new(Device::new(cfg)?);
    let fill = vec![0x99u8; PS];
    for i in 0..4 {
        dev.write((i * PS) as u64, &fill)?;
    }

    let worker = dev.start_scan_worker()?.expect("interval is non-zero");
    let mut waited = 0;
    while dev.allocated_pages() > 1 && waited < 400 {
        thread::sleep(Duration::from_millis(5));
        waited += 1;
    }
    worker.stop();
    assert_eq!(dev.allocated_pages(), 1);
    assert_eq!(dev.merged_pages(), 3);
    Ok(())
}

#[test]
fn scan_worker_exits_when_device_closes() -> Result<()> {
    let cfg = DeviceBuilder::from_default().page_size(PS as u32).pages(2).build();
    let dev = Arc::new(Device::new(cfg)?);
    assert!(dev.start_scan_worker()?.is_none(), "interval 0 starts nothing");

    let worker = ScanWorker::spawn(Arc::clone(&dev), Duration::from_millis(1))?;
    dev.write(0, &[1, 2, 3])?;
    dev.shutdown();
    thread::sleep(Duration::from_millis(20));
    // The worker has seen ShuttingDown by now; stop() just joins.
    worker.stop();
    assert!(dev.is_closing());
    Ok(())
}
