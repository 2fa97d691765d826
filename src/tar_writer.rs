//! Deterministic USTAR archive writer, built on `tar::Builder` with
//! manually constructed `Header::new_ustar()` entries (never
//! `Builder::append_path`, which would read real filesystem metadata and
//! break reproducibility) normalized for a bit-reproducible
//! Docker-load archive.
//!
//! Member enumeration is depth-first over the staging tree, each
//! directory's entries sorted byte-wise by filename, so that archiving
//! the same staging contents twice produces byte-identical output.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tar::{EntryType, Header};

use crate::error::{PusherError, Result};

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// `manifest.json` and `repositories` get mtime 0 regardless of the
/// image's creation time; every other member gets `image_created_unix`.
const ZERO_MTIME_NAMES: [&str; 2] = ["manifest.json", "repositories"];

/// Packs `staging_root`'s contents into a USTAR archive at `out_path`.
/// `image_created_unix` is the image config's `created` timestamp,
/// applied as the mtime of every member except the two top-level
/// bookkeeping files. On any I/O error mid-write, the partial output file
/// is left in place without end-of-archive blocks and the staging tree is
/// untouched — callers must not delete staging on an `Err` return.
pub fn write_archive(staging_root: &Path, out_path: &Path, image_created_unix: i64) -> Result<()> {
    let out_file = File::create(out_path)?;
    let mut builder = tar::Builder::new(out_file);

    let result = append_dir_contents(&mut builder, staging_root, Path::new(""), image_created_unix);

    match result {
        Ok(()) => {
            builder.finish()?;
            Ok(())
        }
        Err(e) => Err(PusherError::ArchiveAborted(e.to_string())),
    }
}

fn append_dir_contents(
    builder: &mut tar::Builder<File>,
    fs_dir: &Path,
    archive_prefix: &Path,
    image_created_unix: i64,
) -> Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(fs_dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    for entry_path in entries {
        let file_name = entry_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PusherError::ArchiveAborted("non-UTF-8 staging entry name".to_string()))?
            .to_string();
        let archive_path = archive_prefix.join(&file_name);

        if entry_path.is_dir() {
            append_directory_header(builder, &archive_path, mtime_for(&file_name, image_created_unix))?;
            append_dir_contents(builder, &entry_path, &archive_path, image_created_unix)?;
        } else {
            append_file(builder, &entry_path, &archive_path, mtime_for(&file_name, image_created_unix))?;
        }
    }

    Ok(())
}

fn mtime_for(file_name: &str, image_created_unix: i64) -> u64 {
    if ZERO_MTIME_NAMES.contains(&file_name) {
        0
    } else {
        image_created_unix.max(0) as u64
    }
}

fn append_directory_header(
    builder: &mut tar::Builder<File>,
    archive_path: &Path,
    mtime: u64,
) -> Result<()> {
    let mut header = Header::new_ustar();
    let mut name = archive_path.to_string_lossy().into_owned();
    name.push('/');
    header.set_path(&name)?;
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    normalize(&mut header, mtime, DIR_MODE);
    header.set_cksum();
    builder.append(&header, std::io::empty())?;
    Ok(())
}

fn append_file(
    builder: &mut tar::Builder<File>,
    fs_path: &Path,
    archive_path: &Path,
    mtime: u64,
) -> Result<()> {
    let mut data = Vec::new();
    File::open(fs_path)?.read_to_end(&mut data)?;

    let mut header = Header::new_ustar();
    header.set_path(archive_path)?;
    header.set_entry_type(EntryType::Regular);
    header.set_size(data.len() as u64);
    normalize(&mut header, mtime, FILE_MODE);
    header.set_cksum();
    builder.append(&header, data.as_slice())?;
    Ok(())
}

/// uid/gid zeroed, numeric (blank) owner names, normalized mtime. ctime
/// cannot be set by a portable tar header and is left as a documented
/// caveat; atime has no field in plain USTAR, so there is nothing to set.
fn normalize(header: &mut Header, mtime: u64, mode: u32) {
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(mtime);
    header.set_mode(mode);
    // Falls back to "root" only if the platform ever refuses a blank
    // uname for uid 0; the `tar` crate's writer does not.
    let _ = header.set_username("");
    let _ = header.set_groupname("");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_staging(root: &Path) {
        std::fs::write(root.join("cfg123.json"), b"{}").unwrap();
        std::fs::write(root.join("manifest.json"), b"[]\n").unwrap();
        std::fs::write(root.join("repositories"), b"{}\n").unwrap();
        let layer_dir = root.join("abc");
        std::fs::create_dir(&layer_dir).unwrap();
        std::fs::write(layer_dir.join("layer.tar"), b"tarbytes").unwrap();
        std::fs::write(layer_dir.join("json"), b"{\"id\":\"abc\"}").unwrap();
        std::fs::write(layer_dir.join("VERSION"), b"1.0").unwrap();
    }

    #[test]
    fn archive_contains_expected_members() {
        let dir = tempfile::tempdir().unwrap();
        build_staging(dir.path());
        let out = dir.path().with_file_name("out.tar");

        write_archive(dir.path(), &out, 1_600_000_000).unwrap();

        let data = std::fs::read(&out).unwrap();
        let mut archive = tar::Archive::new(std::io::Cursor::new(data));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();

        assert!(names.contains(&"abc/".to_string()));
        assert!(names.contains(&"abc/layer.tar".to_string()));
        assert!(names.contains(&"abc/json".to_string()));
        assert!(names.contains(&"abc/VERSION".to_string()));
        assert!(names.contains(&"manifest.json".to_string()));
        assert!(names.contains(&"repositories".to_string()));
        assert!(names.contains(&"cfg123.json".to_string()));
    }

    #[test]
    fn manifest_and_repositories_get_zero_mtime() {
        let dir = tempfile::tempdir().unwrap();
        build_staging(dir.path());
        let out = dir.path().with_file_name("out2.tar");
        write_archive(dir.path(), &out, 1_600_000_000).unwrap();

        let data = std::fs::read(&out).unwrap();
        let mut archive = tar::Archive::new(std::io::Cursor::new(data));
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            if path == "manifest.json" || path == "repositories" {
                assert_eq!(entry.header().mtime().unwrap(), 0);
            } else if path == "cfg123.json" {
                assert_eq!(entry.header().mtime().unwrap(), 1_600_000_000);
            }
        }
    }

    #[test]
    fn archiving_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        build_staging(dir.path());
        let out_a = dir.path().with_file_name("a.tar");
        let out_b = dir.path().with_file_name("b.tar");

        write_archive(dir.path(), &out_a, 42).unwrap();
        write_archive(dir.path(), &out_b, 42).unwrap();

        assert_eq!(std::fs::read(&out_a).unwrap(), std::fs::read(&out_b).unwrap());
    }

    #[test]
    fn headers_have_zeroed_ownership() {
        let dir = tempfile::tempdir().unwrap();
        build_staging(dir.path());
        let out = dir.path().with_file_name("c.tar");
        write_archive(dir.path(), &out, 42).unwrap();

        let data = std::fs::read(&out).unwrap();
        let mut archive = tar::Archive::new(std::io::Cursor::new(data));
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            assert_eq!(entry.header().uid().unwrap(), 0);
            assert_eq!(entry.header().gid().unwrap(), 0);
        }
    }

    #[test]
    fn missing_staging_root_aborts_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let out = dir.path().with_file_name("d.tar");
        assert!(write_archive(&missing, &out, 0).is_err());
    }

    #[test]
    fn directory_members_are_writable() {
        // Guards against a writer that silently fails on zero-length
        // directory bodies (std::io::empty()).
        let dir = tempfile::tempdir().unwrap();
        build_staging(dir.path());
        let out = dir.path().with_file_name("e.tar");
        let mut buf = Vec::new();
        write_archive(dir.path(), &out, 0).unwrap();
        File::open(&out).unwrap().read_to_end(&mut buf).unwrap();
        assert!(!buf.is_empty());
    }
}
