//! Zip extraction and packaging of suite files.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use zip::{CompressionMethod, ZipArchive, ZipWriter, write::SimpleFileOptions};

/// Unpacks every entry of `archive` into `dest`.
pub fn unpack(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).with_context(|| format!("Opening archive {archive:?}"))?;
    let mut zip = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("Reading archive {archive:?}"))?;
    zip.extract(dest)
        .with_context(|| format!("Extracting {archive:?} into {dest:?}"))
}

/// Writes a new archive at `output` holding exactly `files`, each stored
/// under its base name.
pub fn pack(files: &[&Path], output: &Path) -> Result<()> {
    let out = File::create(output).with_context(|| format!("Creating archive {output:?}"))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("No file name in {path:?}"))?;
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Adding {name} to {output:?}"))?;
        let mut src = File::open(path).with_context(|| format!("Opening {path:?}"))?;
        io::copy(&mut src, &mut zip).with_context(|| format!("Compressing {path:?}"))?;
    }
    zip.finish()
        .with_context(|| format!("Finishing archive {output:?}"))?;
    Ok(())
}

/// Copies the named files from `src_dir` into `dest_dir`.
pub fn replicate(src_dir: &Path, dest_dir: &Path, names: &[&str]) -> Result<()> {
    for name in names {
        let src = src_dir.join(name);
        let dest = dest_dir.join(name);
        fs::copy(&src, &dest).with_context(|| format!("Copying {src:?} to {dest:?}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pack_then_unpack_restores_files_by_base_name() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("work");
        fs::create_dir_all(&nested).unwrap();
        let a = nested.join("takeoff.testcase.csv");
        let b = nested.join("landing.testcase.csv");
        fs::write(&a, "gw\n1\n").unwrap();
        fs::write(&b, "gw\n2\n").unwrap();

        let zip_path = dir.path().join("suite.zip");
        pack(&[a.as_path(), b.as_path()], &zip_path).unwrap();

        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        unpack(&zip_path, &out).unwrap();
        assert_eq!(fs::read_to_string(out.join("takeoff.testcase.csv")).unwrap(), "gw\n1\n");
        assert_eq!(fs::read_to_string(out.join("landing.testcase.csv")).unwrap(), "gw\n2\n");
    }

    #[test]
    fn unpack_rejects_non_archives() {
        let dir = tempdir().unwrap();
        let bogus = dir.path().join("suite.zip");
        fs::write(&bogus, "not a zip").unwrap();
        assert!(unpack(&bogus, dir.path()).is_err());
    }

    #[test]
    fn replicate_requires_every_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dest = dir.path().join("dest");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dest).unwrap();
        fs::write(src.join("a"), "1").unwrap();
        replicate(&src, &dest, &["a"]).unwrap();
        assert_eq!(fs::read_to_string(dest.join("a")).unwrap(), "1");
        assert!(replicate(&src, &dest, &["a", "b"]).is_err());
    }
}
