#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};
use zip::{ZipWriter, write::SimpleFileOptions};

pub const TAKEOFF_CSV: &str = "\
mds,mode,gw,[outext]Vr,[out]Vr,[outext]Vto,[out]Vto
0,EWO,250000,0,141,1,150
1,MIN,300000,0,150,0,162
2,TRT,200000,1,132,0,140
";

pub const LANDING_CSV: &str = "\
gw,rcr,flaps,[outext]Vref,[out]Vref
200000,DRY,30,0,120
210000,WET,30,0,125
220000,DRY,40,1,128
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Builds a zip archive with the given `(entry name, contents)` pairs.
    pub fn zip(&self, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let file = File::create(&path).expect("create archive");
        let mut writer = ZipWriter::new(file);
        for (entry, contents) in entries {
            writer
                .start_file(*entry, SimpleFileOptions::default())
                .expect("start zip entry");
            writer
                .write_all(contents.as_bytes())
                .expect("write zip entry");
        }
        writer.finish().expect("finish archive");
        path
    }

    /// The standard two-file suite archive.
    pub fn suite(&self, name: &str) -> PathBuf {
        self.zip(
            name,
            &[
                ("takeoff.testcase.csv", TAKEOFF_CSV),
                ("landing.testcase.csv", LANDING_CSV),
            ],
        )
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.path().join(name)).expect("read workspace file")
    }
}
