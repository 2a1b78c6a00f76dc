use anyhow::{anyhow, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use log::{error, info, warn};
use tiny_http::{Header, Method, Request, Response, Server};

use std::io::Read;
use std::sync::Arc;

use srd::consts::ENV_ADMIN_TOKEN;
use srd::{metrics, Device, DeviceConfig, DeviceError, Privilege};

#[derive(Parser, Debug)]
#[command(
    name = "srd_metrics",
    version,
    about = "Hosts one srd device and exports its counters (Prometheus)"
)]
struct Opt {
    #[arg(long, default_value = "127.0.0.1:9899")]
    addr: String,
    /// Device size in pages (overrides SRD_SIZE)
    #[arg(long)]
    pages: Option<u64>,
}

fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run() {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let opt = Opt::parse();

    let mut cfg = DeviceConfig::from_env();
    if let Some(n) = opt.pages {
        cfg = cfg.with_pages(n);
    }
    let dev = Arc::new(Device::new(cfg)?);
    let _worker = dev.start_scan_worker()?;
    let admin_token = std::env::var(ENV_ADMIN_TOKEN).ok().filter(|t| !t.is_empty());
    if admin_token.is_none() {
        warn!("srd_metrics: {} not set, POST /merge is disabled", ENV_ADMIN_TOKEN);
    }

    let server = Server::http(&opt.addr)
        .map_err(|e| anyhow!("bind http at {}: {}", opt.addr, e))?;
    info!("srd_metrics listening on {}", opt.addr);

    loop {
        let rq = match server.recv() {
            Ok(rq) => rq,
            Err(e) => {
                warn!("http recv error: {}", e);
                continue;
            }
        };
        handle(&dev, admin_token.as_deref(), rq);
    }
}

fn text(body: impl Into<String>, code: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body.into()).with_status_code(code)
}

fn handle(dev: &Device, admin_token: Option<&str>, mut rq: Request) {
    let url = rq.url().to_string();
    let (path, query) = match url.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (url.clone(), String::new()),
    };
    let method = rq.method().clone();

    let resp = match (&method, path.as_str()) {
        (Method::Get, "/") | (Method::Get, "/health") => text("OK\n", 200),

        (Method::Get, "/debug") => {
            if query_param(&query, "format") == Some("json") {
                match serde_json::to_string(&dev.debug_snapshot()) {
                    Ok(s) => text(s, 200),
                    Err(e) => text(format!("{}\n", e), 500),
                }
            } else {
                text(dev.debug_text(), 200)
            }
        }

        (Method::Get, "/metrics") => {
            let mut resp = text(build_metrics(dev), 200);
            if let Ok(ct) = Header::from_bytes(b"Content-Type", b"text/plain; version=0.0.4") {
                resp.add_header(ct);
            }
            resp
        }

        (Method::Post, "/merge") => {
            let who = if is_admin(&rq, admin_token) {
                Privilege::Admin
            } else {
                Privilege::User
            };
            match dev.trigger_merge(who) {
                Ok(r) => match serde_json::to_string(&r) {
                    Ok(s) => text(s, 200),
                    Err(e) => text(format!("{}\n", e), 500),
                },
                Err(e) => error_response(&e),
            }
        }

        (Method::Get, "/block") => {
            match (
                query_param(&query, "offset").and_then(|v| v.parse::<u64>().ok()),
                query_param(&query, "len").and_then(|v| v.parse::<usize>().ok()),
            ) {
                (Some(offset), Some(len)) => match dev.check_range(offset, len as u64) {
                    Ok(()) => {
                        let mut buf = vec![0u8; len];
                        match dev.read(offset, &mut buf) {
                            Ok(_) => Response::from_data(buf).with_status_code(200),
                            Err(e) => error_response(&e),
                        }
                    }
                    Err(e) => error_response(&e),
                },
                _ => text("offset and len are required\n", 400),
            }
        }

        (Method::Put, "/block") => {
            match query_param(&query, "offset").and_then(|v| v.parse::<u64>().ok()) {
                Some(offset) => {
                    let declared = rq.body_length();
                    match read_block_body(dev, offset, declared, rq.as_reader()) {
                        Ok(body) => match dev.write(offset, &body) {
                            Ok(n) => text(format!("{}\n", n), 200),
                            Err(e) => error_response(&e),
                        },
                        Err(e) => match e.downcast_ref::<DeviceError>() {
                            Some(de) => error_response(de),
                            None => text(format!("read body: {}\n", e), 400),
                        },
                    }
                }
                None => text("offset is required\n", 400),
            }
        }

        _ => text("not found\n", 404),
    };

    let _ = rq.respond(resp);
}

/// Read a PUT body destined for `offset`, never buffering past the device end.
/// A declared length is range-checked before anything is read; a body without
/// one is cut off one byte past the room left, which check_range then refuses.
fn read_block_body<R: Read>(
    dev: &Device,
    offset: u64,
    declared: Option<usize>,
    body: R,
) -> Result<Vec<u8>> {
    dev.check_range(offset, declared.unwrap_or(0) as u64)?;
    let room = dev.device_size() - offset;

    let mut buf = Vec::new();
    body.take(room.saturating_add(1)).read_to_end(&mut buf)?;
    dev.check_range(offset, buf.len() as u64)?;
    Ok(buf)
}

fn is_admin(rq: &Request, admin_token: Option<&str>) -> bool {
    let Some(token) = admin_token else {
        return false;
    };
    rq.headers()
        .iter()
        .any(|h| h.field.equiv("X-Srd-Admin") && h.value.as_str() == token)
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

fn error_response(e: &DeviceError) -> Response<std::io::Cursor<Vec<u8>>> {
    let code = match e.root_cause() {
        DeviceError::Permission => 403,
        DeviceError::OutOfRange { .. } => 416,
        DeviceError::OutOfMemory { .. } => 507,
        DeviceError::ShuttingDown => 503,
        _ => 500,
    };
    text(format!("{}\n", e), code)
}

fn build_metrics(dev: &Device) -> String {
    let m = metrics::snapshot();
    let d = dev.debug_snapshot();
    let mut out = String::new();

    let ver = env!("CARGO_PKG_VERSION");
    out.push_str("# HELP srd_build_info Build info.\n");
    out.push_str("# TYPE srd_build_info gauge\n");
    out.push_str(&format!("srd_build_info{{version=\"{}\"}} 1\n", ver));

    // --- Device ---
    out.push_str("# HELP srd_device_size_bytes Device capacity (bytes).\n");
    out.push_str("# TYPE srd_device_size_bytes gauge\n");
    out.push_str(&format!("srd_device_size_bytes {}\n", dev.device_size()));

    out.push_str("# HELP srd_page_size_bytes Page size (bytes).\n");
    out.push_str("# TYPE srd_page_size_bytes gauge\n");
    out.push_str(&format!("srd_page_size_bytes {}\n", dev.page_size()));

    out.push_str("# HELP srd_allocated_pages Physical pages alive.\n");
    out.push_str("# TYPE srd_allocated_pages gauge\n");
    out.push_str(&format!("srd_allocated_pages {}\n", d.allocated_pages));

    out.push_str("# HELP srd_merged_pages Slots served by a page another slot already holds.\n");
    out.push_str("# TYPE srd_merged_pages gauge\n");
    out.push_str(&format!("srd_merged_pages {}\n", d.merged_pages));

    out.push_str("# HELP srd_scan_cursor Next head slot of the dedup scanner.\n");
    out.push_str("# TYPE srd_scan_cursor gauge\n");
    out.push_str(&format!("srd_scan_cursor {}\n", d.scan_cursor));

    // --- Dispatcher ---
    out.push_str("# HELP srd_reads_total Page-sized read units served.\n");
    out.push_str("# TYPE srd_reads_total counter\n");
    out.push_str(&format!("srd_reads_total {}\n", m.reads_total));

    out.push_str("# HELP srd_writes_total Page-sized write units served.\n");
    out.push_str("# TYPE srd_writes_total counter\n");
    out.push_str(&format!("srd_writes_total {}\n", m.writes_total));

    out.push_str("# HELP srd_bytes_read Bytes read.\n");
    out.push_str("# TYPE srd_bytes_read counter\n");
    out.push_str(&format!("srd_bytes_read {}\n", m.bytes_read));

    out.push_str("# HELP srd_bytes_written Bytes written.\n");
    out.push_str("# TYPE srd_bytes_written counter\n");
    out.push_str(&format!("srd_bytes_written {}\n", m.bytes_written));

    out.push_str("# HELP srd_cow_splits_total Writes that split a shared page.\n");
    out.push_str("# TYPE srd_cow_splits_total counter\n");
    out.push_str(&format!("srd_cow_splits_total {}\n", m.cow_splits));

    out.push_str("# HELP srd_requests_rejected_total Requests refused by the bounds check.\n");
    out.push_str("# TYPE srd_requests_rejected_total counter\n");
    out.push_str(&format!("srd_requests_rejected_total {}\n", m.requests_rejected));

    // --- Allocator ---
    out.push_str("# HELP srd_pages_created_total Physical pages created.\n");
    out.push_str("# TYPE srd_pages_created_total counter\n");
    out.push_str(&format!("srd_pages_created_total {}\n", m.pages_created));

    out.push_str("# HELP srd_pages_freed_total Physical pages destroyed.\n");
    out.push_str("# TYPE srd_pages_freed_total counter\n");
    out.push_str(&format!("srd_pages_freed_total {}\n", m.pages_freed));

    // --- Scanner ---
    out.push_str("# HELP srd_scan_runs_total Dedup scan invocations.\n");
    out.push_str("# TYPE srd_scan_runs_total counter\n");
    out.push_str(&format!("srd_scan_runs_total {}\n", m.scan_runs));

    out.push_str("# HELP srd_scan_iterations_avg Average outer iterations per scan.\n");
    out.push_str("# TYPE srd_scan_iterations_avg gauge\n");
    out.push_str(&format!("srd_scan_iterations_avg {:.2}\n", m.avg_iterations_per_scan()));

    out.push_str("# HELP srd_merges_total Slot pairs merged.\n");
    out.push_str("# TYPE srd_merges_total counter\n");
    out.push_str(&format!("srd_merges_total {}\n", m.merges_total));

    out.push_str("# HELP srd_checksum_collisions_total Equal checksums with different content.\n");
    out.push_str("# TYPE srd_checksum_collisions_total counter\n");
    out.push_str(&format!("srd_checksum_collisions_total {}\n", m.checksum_collisions));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn device() -> Device {
        let cfg = DeviceConfig::default().with_page_size(4096).with_pages(2);
        Device::new(cfg).unwrap()
    }

    fn out_of_range(e: &anyhow::Error) -> bool {
        matches!(e.downcast_ref::<DeviceError>(), Some(DeviceError::OutOfRange { .. }))
    }

    #[test]
    fn declared_length_past_end_is_refused_before_reading() {
        let dev = device();
        // A reader that would fail if touched.
        struct Untouchable;
        impl Read for Untouchable {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                panic!("body read before the range check");
            }
        }
        let err = read_block_body(&dev, 4096, Some(4097), Untouchable).unwrap_err();
        assert!(out_of_range(&err));
        let err = read_block_body(&dev, 8193, None, Untouchable).unwrap_err();
        assert!(out_of_range(&err));
    }

    #[test]
    fn undeclared_oversized_body_is_cut_off() {
        let dev = device();
        let big = Cursor::new(vec![0x5Au8; 1 << 20]);
        let err = read_block_body(&dev, 4096, None, big).unwrap_err();
        assert!(out_of_range(&err));
        assert_eq!(dev.allocated_pages(), 0);
    }

    #[test]
    fn body_that_fits_is_returned_whole() {
        let dev = device();
        let body = read_block_body(&dev, 4000, Some(4192), Cursor::new(vec![7u8; 4192])).unwrap();
        assert_eq!(body.len(), 4192);
        assert_eq!(dev.write(4000, &body).unwrap(), 4192);

        let body = read_block_body(&dev, 8192, None, Cursor::new(Vec::new())).unwrap();
        assert!(body.is_empty());
    }
}
