//! Drives a small allocate/free sequence and logs the block list after every
//! step. Run it with `RUST_LOG=debug` to also see what the allocator does
//! internally, or `RUST_LOG=trace` for the first-fit walk and the merges.

use bufalloc::{Allocator, AllocatorConfig, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn log_layout(allocator: &Allocator, step: &str) {
    for block in allocator.blocks() {
        info!("{step:>6}: {block}");
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let source = std::fs::read_to_string(&path)?;
            AllocatorConfig::from_toml_str(&source)?
        }
        None => AllocatorConfig::default(),
    };

    let mut allocator = Allocator::from_config(&config)?;
    log_layout(&allocator, "init");

    let a = allocator.allocate(1)?;
    let b = allocator.allocate(1)?;
    log_layout(&allocator, "+a +b");

    allocator.free(a)?;
    log_layout(&allocator, "-a");

    let c = allocator.allocate(8)?;
    allocator.write(&c, "greeting".as_bytes())?;
    log_layout(&allocator, "+c");
    info!("c holds {:?}", String::from_utf8_lossy(allocator.read(&c)?));

    allocator.free(b)?;
    log_layout(&allocator, "-b");

    let _d = allocator.allocate(6)?;
    let e = allocator.allocate(0)?;
    log_layout(&allocator, "+d +e");

    allocator.free(e)?;
    log_layout(&allocator, "-e");

    let f = allocator.allocate(2)?;
    allocator.write(&f, b"ok")?;
    log_layout(&allocator, "+f");

    if let Err(err) = allocator.write(&f, b"too long") {
        info!("rejected write: {err}");
    }

    if let Err(err) = allocator.allocate(64) {
        info!("rejected allocation: {err}");
    }

    info!(stats = ?allocator.stats(), "done");

    Ok(())
}
