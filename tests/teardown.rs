// tests/teardown.rs
//
// Run only this file:
//   cargo test --test teardown -- --nocapture
//
// Covers:
// 1) Teardown releases every slot and brings allocated_pages to 0, shared pages included.
// 2) After teardown starts, new operations are refused with ShuttingDown.
// 3) Teardown is idempotent; Drop tears down a device nobody shut down.
// 4) Teardown waits for in-flight work started on other threads.

use anyhow::Result;
use std::sync::Arc;
use std::thread;

use srd::{Device, DeviceBuilder, DeviceError, Privilege};

const PS: usize = 4096;

fn device(pages: u64) -> Result<Device> {
    let cfg = DeviceBuilder::from_default().page_size(PS as u32).pages(pages).build();
    Ok(Device::new(cfg)?)
}

#[test]
fn teardown_frees_shared_and_private_pages() -> Result<()> {
    let dev = device(5)?;
    let same = vec![0x0Fu8; PS];
    for i in 0..3 {
        dev.write((i * PS) as u64, &same)?;
    }
    dev.write((4 * PS) as u64, b"odd one")?;
    dev.scan_once(5)?;
    assert_eq!(dev.allocated_pages(), 2);
    assert_eq!(dev.merged_pages(), 2);

    let rep = dev.shutdown();
    assert_eq!(rep.freed, 2);
    assert_eq!(rep.unshared, 2);
    assert_eq!(dev.allocated_pages(), 0);
    assert_eq!(dev.merged_pages(), 0);
    Ok(())
}

#[test]
fn operations_after_teardown_are_refused() -> Result<()> {
    let dev = device(2)?;
    dev.write(0, b"x")?;
    dev.shutdown();
    assert!(dev.is_closing());

    let mut buf = [0u8; 4];
    assert!(matches!(dev.read(0, &mut buf), Err(DeviceError::ShuttingDown)));
    assert!(matches!(dev.write(0, b"y"), Err(DeviceError::ShuttingDown)));
    assert!(matches!(dev.scan_once(2), Err(DeviceError::ShuttingDown)));
    assert!(matches!(
        dev.trigger_merge(Privilege::Admin),
        Err(DeviceError::ShuttingDown)
    ));
    assert_eq!(dev.allocated_pages(), 0);

    // Inspection still works.
    let snap = dev.debug_snapshot();
    assert_eq!(snap.allocated_pages, 0);
    dev.check_invariants()?;
    Ok(())
}

#[test]
fn teardown_is_idempotent_and_drop_is_safe() -> Result<()> {
    let dev = device(2)?;
    dev.write(0, &vec![1u8; 2 * PS])?;
    let first = dev.shutdown();
    assert_eq!(first.freed, 2);
    let second = dev.shutdown();
    assert_eq!(second.freed, 0);
    assert_eq!(second.unshared, 0);
    drop(dev);

    // Never shut down explicitly: Drop does it.
    let dev = device(3)?;
    dev.write(0, &vec![7u8; 3 * PS])?;
    dev.scan_once(3)?;
    drop(dev);
    Ok(())
}

#[test]
fn teardown_waits_for_in_flight_writers() -> Result<()> {
    let dev = Arc::new(device(64)?);
    let mut handles = Vec::new();
    for t in 0..4u8 {
        let dev = Arc::clone(&dev);
        handles.push(thread::spawn(move || {
            let page = vec![t; PS];
            let mut done = 0u32;
            for i in 0.. {
                let slot = (i * 4 + t as usize) % 64;
                match dev.write((slot * PS) as u64, &page) {
                    Ok(_) => done += 1,
                    Err(e) => {
                        assert!(
                            matches!(e.root_cause(), DeviceError::ShuttingDown),
                            "unexpected error {e}"
                        );
                        break;
                    }
                }
            }
            done
        }));
    }

    while dev.allocated_pages() < 8 {
        thread::yield_now();
    }
    dev.shutdown();
    let total: u32 = handles
        .into_iter()
        .map(|h| h.join().expect("writer panicked"))
        .sum();
    assert!(total > 0);
    assert_eq!(dev.allocated_pages(), 0);
    assert_eq!(dev.merged_pages(), 0);
    Ok(())
}
