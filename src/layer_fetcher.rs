//! Streaming layer download with resume, and gunzip-to-disk: a streamed
//! `reqwest` body written to a `.gz` checkpoint, Range-resumed on restart,
//! then decompressed through `flate2::read::GzDecoder` and verified
//! against the expected diff id.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use futures_util::StreamExt;

use crate::digest::DigestUtils;
use crate::error::{PusherError, Result};
use crate::progress::{ProgressSink, ProgressStage};
use crate::registry::RegistryClient;

const DOWNLOAD_CHUNK: usize = 8 * 1024;
const EXTRACT_CHUNK: usize = 128 * 1024;

/// Downloads `layer_digest` into `target_path`, verifying the result
/// against `expected_diff_id`. Resumable: a partially-downloaded
/// `target_path.gz` is continued via `Range`, and an already-complete
/// `target_path` short-circuits the whole fetch.
pub async fn fetch_layer(
    client: &RegistryClient,
    layer_digest: &str,
    expected_diff_id: &str,
    target_path: &Path,
    progress: &dyn ProgressSink,
) -> Result<()> {
    let expected_hex = DigestUtils::extract_hex_part(expected_diff_id)?;

    if target_path.exists() {
        let actual = DigestUtils::compute_file_digest(target_path)?;
        if actual == expected_diff_id || actual.trim_start_matches("sha256:") == expected_hex {
            progress.on_layer_done(layer_digest, "already complete");
            return Ok(());
        }
    }

    let gz_path = gz_path_for(target_path);
    let (mut gz_file, range_start) = open_gz_for_resume(&gz_path)?;

    let response = client.get_blob_stream(layer_digest, range_start).await?;

    if response.status() != reqwest::StatusCode::RANGE_NOT_SATISFIABLE {
        let content_length = response.content_length().unwrap_or(0);
        let mut done = range_start.unwrap_or(0);
        let mut pending = Vec::with_capacity(DOWNLOAD_CHUNK);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            pending.extend_from_slice(&chunk);
            done += chunk.len() as u64;

            while pending.len() >= DOWNLOAD_CHUNK {
                let rest = pending.split_off(DOWNLOAD_CHUNK);
                gz_file.write_all(&pending)?;
                pending = rest;
            }
            progress.on_progress(ProgressStage::Download, layer_digest, done, content_length);
        }
        if !pending.is_empty() {
            gz_file.write_all(&pending)?;
        }
        gz_file.flush()?;
    }
    drop(gz_file);

    let isize = read_gzip_isize(&gz_path)?;
    decompress_to(&gz_path, target_path, isize, layer_digest, progress)?;

    std::fs::remove_file(&gz_path)?;

    let actual = DigestUtils::compute_file_digest(target_path)?;
    if actual != expected_diff_id {
        return Err(PusherError::DigestMismatch {
            expected: expected_diff_id.to_string(),
            actual,
        });
    }

    progress.on_layer_done(layer_digest, "downloaded");
    Ok(())
}

fn gz_path_for(target_path: &Path) -> std::path::PathBuf {
    let mut name = target_path.as_os_str().to_owned();
    name.push(".gz");
    std::path::PathBuf::from(name)
}

/// Opens the `.gz` checkpoint file, returning the file handle positioned
/// for writing and the byte offset to resume from (`None` for a fresh
/// download).
fn open_gz_for_resume(gz_path: &Path) -> Result<(File, Option<u64>)> {
    if gz_path.exists() {
        let existing_size = std::fs::metadata(gz_path)?.len();
        let file = OpenOptions::new().append(true).open(gz_path)?;
        Ok((file, Some(existing_size)))
    } else {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(gz_path)?;
        Ok((file, None))
    }
}

/// RFC1952: the last 4 bytes of a gzip stream are the little-endian
/// uncompressed size (mod 2^32).
fn read_gzip_isize(gz_path: &Path) -> Result<u64> {
    let mut file = File::open(gz_path)?;
    let len = file.metadata()?.len();
    if len < 8 {
        return Ok(0);
    }
    file.seek(SeekFrom::End(-4))?;
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf) as u64)
}

fn decompress_to(
    gz_path: &Path,
    target_path: &Path,
    isize: u64,
    layer_digest: &str,
    progress: &dyn ProgressSink,
) -> Result<()> {
    let gz_file = File::open(gz_path)?;
    let mut decoder = flate2::read::GzDecoder::new(gz_file);
    let mut out = File::create(target_path)?;

    let mut buf = vec![0u8; EXTRACT_CHUNK];
    let mut done = 0u64;
    loop {
        let n = decoder.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.write_all(&buf[..n])?;
        done += n as u64;
        progress.on_progress(ProgressStage::Extract, layer_digest, done, isize);
    }
    out.flush()?;
    Ok(())
}
