// tests/metamorphic_roundtrip.rs
//
// Run only this file:
//   cargo test --test metamorphic_roundtrip -- --nocapture
//
// Two metamorphic checks over random workloads:
// 1) The device behaves like a flat byte array no matter when merges run
//    (model comparison after every read and at the end).
// 2) Two devices fed the same writes, one merged aggressively and one never,
//    read back identical images; merging only changes the counters.

use anyhow::Result;

use oorandom::Rand64;

use srd::{Device, DeviceBuilder};

const PS: usize = 4096;
const PALETTE: [u8; 3] = [0x00, 0xAB, 0xCD];

fn device(pages: u64) -> Result<Device> {
    let cfg = DeviceBuilder::from_default().page_size(PS as u32).pages(pages).build();
    Ok(Device::new(cfg)?)
}

/// (offset, bytes) for one random write. Half are whole palette pages so that
/// duplicates are common.
fn random_write(rng: &mut Rand64, size: usize) -> (usize, Vec<u8>) {
    if rng.rand_range(0..2) == 0 {
        let page = rng.rand_range(0..(size / PS) as u64) as usize;
        let fill = PALETTE[rng.rand_range(0..PALETTE.len() as u64) as usize];
        (page * PS, vec![fill; PS])
    } else {
        let len = rng.rand_range(1..(2 * PS) as u64) as usize;
        let off = rng.rand_range(0..(size - len) as u64) as usize;
        let data = (0..len).map(|_| rng.rand_u64() as u8).collect();
        (off, data)
    }
}

#[test]
fn device_matches_flat_model_under_merges() -> Result<()> {
    let pages = 16u64;
    let dev = device(pages)?;
    let size = dev.device_size() as usize;
    let mut model = vec![0u8; size];
    let mut rng = Rand64::new(0x5eed_1234);

    for step in 0..3000u32 {
        match rng.rand_range(0..10) {
            0..=5 => {
                let (off, data) = random_write(&mut rng, size);
                dev.write(off as u64, &data)?;
                model[off..off + data.len()].copy_from_slice(&data);
            }
            6..=8 => {
                let len = rng.rand_range(1..(3 * PS) as u64) as usize;
                let off = rng.rand_range(0..(size - len) as u64) as usize;
                let mut buf = vec![0u8; len];
                dev.read(off as u64, &mut buf)?;
                assert_eq!(buf[..], model[off..off + len], "step {step}: read mismatch at {off}");
            }
            _ => {
                let budget = rng.rand_range(0..pages + 4) as u32;
                dev.scan_once(budget)?;
            }
        }
        if step % 250 == 0 {
            dev.check_invariants()?;
        }
    }

    let mut all = vec![0u8; size];
    dev.read(0, &mut all)?;
    assert!(all == model, "final image differs from the model");
    dev.check_invariants()?;
    Ok(())
}

#[test]
fn merging_changes_counters_not_content() -> Result<()> {
    let merged = device(12)?;
    let plain = device(12)?;
    let size = merged.device_size() as usize;
    let mut rng = Rand64::new(42);

    for round in 0..400u32 {
        let (off, data) = random_write(&mut rng, size);
        merged.write(off as u64, &data)?;
        plain.write(off as u64, &data)?;
        if round % 7 == 0 {
            merged.scan_once(12)?;
        }
    }
    merged.scan_once(12)?;

    let mut a = vec![0u8; size];
    let mut b = vec![0u8; size];
    merged.read(0, &mut a)?;
    plain.read(0, &mut b)?;
    assert!(a == b, "merge altered device content");

    let im = merged.check_invariants()?;
    let ip = plain.check_invariants()?;
    assert_eq!(im.occupied_slots, ip.occupied_slots);
    assert_eq!(plain.merged_pages(), 0);
    assert!(merged.allocated_pages() <= plain.allocated_pages());
    assert_eq!(
        merged.allocated_pages() + merged.merged_pages(),
        im.occupied_slots as u64
    );
    Ok(())
}
