use anyhow::{anyhow, bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use srd::{metrics, Device, DeviceConfig, Privilege};

// A small palette keeps identical pages common, so merges actually happen.
const PALETTE: [u8; 4] = [0x00, 0xAA, 0x55, 0xFF];

pub fn exec(pages: Option<u64>, ops: u64, seed: u64, merge_every: u64, json_out: bool) -> Result<()> {
    let mut cfg = DeviceConfig::from_env();
    if let Some(n) = pages {
        cfg = cfg.with_pages(n);
    }
    let dev = Device::new(cfg)?;
    let size = dev.device_size() as usize;
    let ps = dev.page_size();
    let mut model = vec![0u8; size];
    let mut rng = StdRng::seed_from_u64(seed);

    let (mut writes, mut reads, mut merges) = (0u64, 0u64, 0u64);
    let mut merged_pairs = 0u64;

    for i in 0..ops {
        let roll: u32 = rng.gen_range(0..100);
        if roll < 35 {
            // whole page from the palette
            let page = rng.gen_range(0..dev.page_count());
            let fill = PALETTE[rng.gen_range(0..PALETTE.len())];
            let off = page * ps;
            model[off..off + ps].fill(fill);
            dev.write(off as u64, &model[off..off + ps])?;
            writes += 1;
        } else if roll < 60 {
            // short unaligned write, possibly crossing a page boundary
            let len = rng.gen_range(1..=ps.min(size));
            let off = rng.gen_range(0..=size - len);
            for b in &mut model[off..off + len] {
                *b = rng.gen();
            }
            dev.write(off as u64, &model[off..off + len])?;
            writes += 1;
        } else {
            let len = rng.gen_range(1..=(2 * ps).min(size));
            let off = rng.gen_range(0..=size - len);
            let mut buf = vec![0u8; len];
            dev.read(off as u64, &mut buf)?;
            if buf[..] != model[off..off + len] {
                bail!("op {}: read [{}, +{}) does not match the model", i, off, len);
            }
            reads += 1;
        }

        if merge_every > 0 && (i + 1) % merge_every == 0 {
            let r = dev.trigger_merge(Privilege::Admin)?;
            merged_pairs += r.merged;
            merges += 1;
        }
    }

    // final full compare
    let mut all = vec![0u8; size];
    dev.read(0, &mut all)?;
    if all != model {
        let at = all
            .iter()
            .zip(&model)
            .position(|(a, b)| a != b)
            .ok_or_else(|| anyhow!("length mismatch"))?;
        bail!("final image differs from the model at byte {}", at);
    }
    let inv = dev.check_invariants()?;
    let snap = dev.debug_snapshot();
    let m = metrics::snapshot();

    if json_out {
        let obj = json!({
            "ops": ops,
            "seed": seed,
            "writes": writes,
            "reads": reads,
            "merges": merges,
            "merged_pairs": merged_pairs,
            "device": snap,
            "invariants": inv,
            "metrics": m,
        });
        println!("{}", serde_json::to_string_pretty(&obj)?);
    } else {
        println!("exercise: {} op(s), seed {:#x}", ops, seed);
        println!("  writes={} reads={} merge runs={} pairs merged={}", writes, reads, merges, merged_pairs);
        println!(
            "  slots occupied={} distinct pages={} shared pages={}",
            inv.occupied_slots, inv.distinct_pages, inv.shared_pages
        );
        print!("{}", snap);
        println!(
            "  cow splits={} checksum collisions={}",
            m.cow_splits, m.checksum_collisions
        );
        println!("OK");
    }

    dev.shutdown();
    Ok(())
}
