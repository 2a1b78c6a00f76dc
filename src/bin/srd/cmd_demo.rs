use anyhow::{bail, Result};
use serde_json::json;

use srd::{DebugSnapshot, Device, DeviceBuilder, Privilege};

/// Step name + counters after it.
fn show(step: &str, snap: DebugSnapshot, json_out: bool, steps: &mut Vec<serde_json::Value>) {
    if json_out {
        steps.push(json!({ "step": step, "snapshot": snap }));
    } else {
        println!("== {}", step);
        print!("{}", snap);
    }
}

pub fn exec(json_out: bool) -> Result<()> {
    let cfg = DeviceBuilder::from_default().pages(4).build();
    let dev = Device::new(cfg)?;
    let ps = dev.page_size();
    let mut steps = Vec::new();

    let fill = vec![0xAAu8; ps];
    dev.write(0, &fill)?;
    dev.write(ps as u64, &fill)?;
    show("write 0xAA to pages 0 and 1", dev.debug_snapshot(), json_out, &mut steps);

    let r = dev.trigger_merge(Privilege::Admin)?;
    show(
        &format!("merge ({} pair(s) merged)", r.merged),
        dev.debug_snapshot(),
        json_out,
        &mut steps,
    );

    dev.write(0, &[0x55])?;
    show("write 1 byte to page 0", dev.debug_snapshot(), json_out, &mut steps);

    let mut back = vec![0u8; ps];
    dev.read(ps as u64, &mut back)?;
    if back != fill {
        bail!("page 1 changed after writing page 0");
    }
    dev.check_invariants()?;

    let report = dev.shutdown();
    if json_out {
        let obj = json!({
            "steps": steps,
            "page1_intact": true,
            "teardown": { "freed": report.freed, "unshared": report.unshared },
        });
        println!("{}", serde_json::to_string_pretty(&obj)?);
    } else {
        println!("== page 1 still reads 0xAA");
        println!(
            "== teardown: {} page(s) freed, {} shared handle(s) dropped",
            report.freed, report.unshared
        );
    }
    Ok(())
}
