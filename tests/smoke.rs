// tests/smoke.rs
//
// Run only this file:
//   cargo test --test smoke -- --nocapture
//
// Covers:
// 1) Two identical pages, one merge, one single-byte write (counters after each step).
// 2) Unwritten ranges read as zeros.
// 3) Debug text / JSON surfaces.

use anyhow::Result;

use srd::{Device, DeviceBuilder, Privilege};

fn device(pages: u64) -> Result<Device> {
    let cfg = DeviceBuilder::from_default().page_size(4096).pages(pages).build();
    Ok(Device::new(cfg)?)
}

#[test]
fn merge_then_cow_scenario() -> Result<()> {
    let dev = device(4)?;
    let fill = vec![0xAAu8; 4096];

    dev.write(0, &fill)?;
    dev.write(4096, &fill)?;
    assert_eq!(dev.allocated_pages(), 2);
    assert_eq!(dev.merged_pages(), 0);

    let r = dev.trigger_merge(Privilege::Admin)?;
    assert_eq!(r.merged, 1);
    assert_eq!(dev.allocated_pages(), 1);
    assert_eq!(dev.merged_pages(), 1);

    dev.write(0, &[0x01])?;
    assert_eq!(dev.allocated_pages(), 2);
    assert_eq!(dev.merged_pages(), 0);

    let mut back = vec![0u8; 4096];
    dev.read(4096, &mut back)?;
    assert!(back.iter().all(|&b| b == 0xAA), "page 1 must be untouched");

    dev.read(0, &mut back)?;
    assert_eq!(back[0], 0x01);
    assert!(back[1..].iter().all(|&b| b == 0xAA));

    dev.check_invariants()?;
    let rep = dev.shutdown();
    assert_eq!(rep.freed, 2);
    assert_eq!(dev.allocated_pages(), 0);
    Ok(())
}

#[test]
fn fresh_device_reads_zeros() -> Result<()> {
    let dev = device(4)?;
    assert_eq!(dev.device_size(), 4 * 4096);
    assert_eq!(dev.page_count(), 4);

    let mut buf = vec![0xEEu8; 3 * 4096];
    let n = dev.read(2048, &mut buf)?;
    assert_eq!(n, buf.len());
    assert!(buf.iter().all(|&b| b == 0));

    // Read misses allocate zero pages.
    assert_eq!(dev.allocated_pages(), 4);
    assert_eq!(dev.check_invariants()?.occupied_slots, 4);
    Ok(())
}

#[test]
fn debug_snapshot_text_and_json() -> Result<()> {
    let dev = device(4)?;
    dev.write(0, &[1, 2, 3])?;

    let snap = dev.debug_snapshot();
    assert_eq!(snap.allocated_pages, 1);
    assert_eq!(snap.merged_pages, 0);
    assert_eq!(snap.scan_cursor, 0);

    let text = dev.debug_text();
    assert_eq!(text, "allocated pages: 1\nmerged pages: 0\nscan cursor: 0\n");

    let v: serde_json::Value = serde_json::to_value(snap)?;
    assert_eq!(v["allocated_pages"], 1);
    assert_eq!(v["merged_pages"], 0);
    assert_eq!(v["scan_cursor"], 0);

    // Observing has no side effect.
    assert_eq!(dev.debug_snapshot(), snap);
    Ok(())
}
