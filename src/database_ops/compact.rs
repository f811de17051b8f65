//! Final packaging: rewrite the store without free pages, then gzip a copy of it.
use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::Connection;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const CHUNK_SIZE: usize = 1024 * 1024;
const PROGRESS_EVERY_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_GZIP_LEVEL: u32 = 9;

/// Full rewrite of the store file. Must run outside any open transaction.
pub fn vacuum(conn: &Connection) -> Result<()> {
    info!("vacuuming store (full rewrite)");
    conn.execute_batch("VACUUM").context("VACUUM")?;
    // Fold the WAL back into the main file so the file on disk is the whole store.
    conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
        .context("wal checkpoint")?;
    info!("vacuum complete");
    Ok(())
}

/// `<store>.gz` next to the store.
pub fn artifact_path(store: &Path) -> PathBuf {
    let mut name = store.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompressionReport {
    pub input_bytes: u64,
    pub output_bytes: u64,
}

impl CompressionReport {
    /// Percentage saved relative to the input; 0 for an empty input.
    pub fn reduction_percent(&self) -> f64 {
        if self.input_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.output_bytes as f64 / self.input_bytes as f64) * 100.0
    }
}

/// Stream `src` through gzip into `dst` in fixed-size chunks. The source is left in place.
/// Output goes to `<dst>.partial` first and is renamed only once the stream is finished.
pub fn compress_file(src: &Path, dst: &Path, level: u32) -> Result<CompressionReport> {
    let mut partial = dst.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    let mut input =
        File::open(src).with_context(|| format!("failed to open {}", src.display()))?;
    let out = File::create(&partial)
        .with_context(|| format!("failed to create {}", partial.display()))?;
    let mut encoder = GzEncoder::new(BufWriter::new(out), Compression::new(level.min(9)));

    info!(src = %src.display(), dst = %dst.display(), level, "compressing store");
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut input_bytes = 0u64;
    let mut next_report = PROGRESS_EVERY_BYTES;
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        encoder.write_all(&buf[..n])?;
        input_bytes += n as u64;
        if input_bytes >= next_report {
            info!(mb = input_bytes / (1024 * 1024), "compression progress");
            next_report += PROGRESS_EVERY_BYTES;
        }
    }
    let mut writer = encoder.finish().context("finishing gzip stream")?;
    writer.flush()?;
    writer
        .get_ref()
        .sync_all()
        .context("syncing compressed artifact")?;
    drop(writer);

    fs::rename(&partial, dst)
        .with_context(|| format!("moving {} into place", partial.display()))?;
    let output_bytes = fs::metadata(dst)?.len();
    let report = CompressionReport {
        input_bytes,
        output_bytes,
    };
    let reduction = format!("{:.1}%", report.reduction_percent());
    info!(
        input_mb = input_bytes / (1024 * 1024),
        output_mb = output_bytes / (1024 * 1024),
        reduction = %reduction,
        "compression complete"
    );
    Ok(report)
}
