use anyhow::Result;
use serde_json::json;

use srd::DeviceConfig;

pub fn exec(json_out: bool) -> Result<()> {
    let cfg = DeviceConfig::from_env();
    cfg.validate()?;

    if json_out {
        let obj = json!({
            "device_size": cfg.device_size,
            "page_size": cfg.page_size,
            "pages": cfg.page_count(),
            "scan_window_budget": cfg.scan_window_budget,
            "scan_interval_ms": cfg.scan_interval_ms,
            "trace": cfg.trace,
            "checksum_kind": cfg.checksum_kind,
        });
        println!("{}", serde_json::to_string_pretty(&obj)?);
        return Ok(());
    }

    println!("{}", cfg);
    Ok(())
}
