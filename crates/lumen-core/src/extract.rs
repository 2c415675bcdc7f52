//! Archive extraction for runtime acquisition.
//!
//! Blocking; runtime acquisition wraps these in `spawn_blocking`.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use zip::ZipArchive;

use crate::error::UpdateError;

/// Extract a zip archive into `dest_dir`.
pub(crate) fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<(), UpdateError> {
    let file = File::open(archive_path)?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| UpdateError::Format(format!("zip archive: {e}")))?;

    fs::create_dir_all(dest_dir)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| UpdateError::Format(format!("zip entry: {e}")))?;
        // enclosed_name rejects absolute paths and `..` components
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

/// Extract a tar.gz archive into `dest_dir`.
pub(crate) fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<(), UpdateError> {
    let file = File::open(archive_path)?;
    let decoder = flate2::read::GzDecoder::new(BufReader::new(file));

    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(decoder);
    for entry in archive
        .entries()
        .map_err(|e| UpdateError::Format(format!("tar archive: {e}")))?
    {
        let mut entry = entry.map_err(|e| UpdateError::Format(format!("tar entry: {e}")))?;
        // unpack_in sanitizes the entry path against escapes
        entry
            .unpack_in(dest_dir)
            .map_err(|e| UpdateError::Format(format!("tar entry: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_zip(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("runtime.zip");
        let file = File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let opts = zip::write::SimpleFileOptions::default();
        writer.add_directory("jdk-17/bin/", opts).unwrap();
        writer.start_file("jdk-17/bin/java", opts).unwrap();
        writer.write_all(b"#!/bin/sh\n").unwrap();
        writer.finish().unwrap();
        path
    }

    fn make_tar_gz(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("runtime.tar.gz");
        let file = File::create(&path).unwrap();
        let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(enc);
        let mut header = tar::Header::new_gnu();
        header.set_size(9);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, "jdk-17/bin/java", &b"#!/bin/sh"[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    #[test]
    fn zip_roundtrip_preserves_layout() {
        let dir = tempfile::tempdir().unwrap();
        let archive = make_zip(dir.path());
        let out = dir.path().join("out");
        extract_zip(&archive, &out).unwrap();
        assert!(out.join("jdk-17/bin/java").is_file());
    }

    #[test]
    fn tar_gz_roundtrip_preserves_layout() {
        let dir = tempfile::tempdir().unwrap();
        let archive = make_tar_gz(dir.path());
        let out = dir.path().join("out");
        extract_tar_gz(&archive, &out).unwrap();
        assert!(out.join("jdk-17/bin/java").is_file());
    }

    #[test]
    fn garbage_zip_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.zip");
        std::fs::write(&bogus, b"not an archive").unwrap();
        let err = extract_zip(&bogus, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, UpdateError::Format(_)));
    }
}
