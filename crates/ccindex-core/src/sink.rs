//! Output sink: gzip-compressed CDXJ file writer with atomic tmp→rename

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

/// Extension of finished index files
pub const CDXJ_EXTENSION: &str = "cdxj.gz";

/// Final path of the index file for an archive base name
pub fn output_path(output_dir: &Path, base_name: &str) -> PathBuf {
    output_dir.join(format!("{base_name}.{CDXJ_EXTENSION}"))
}

/// Buffered gzip writer; the final file only appears once `finalize` succeeds.
/// Dropping an unfinished sink removes its tmp file.
pub struct CdxjSink {
    /// `None` only once `finalize` has taken it
    writer: Option<GzEncoder<BufWriter<File>>>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    line_count: usize,
    finished: bool,
}

impl std::fmt::Debug for CdxjSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdxjSink")
            .field("final_path", &self.final_path)
            .field("line_count", &self.line_count)
            .finish_non_exhaustive()
    }
}

impl CdxjSink {
    /// Create a new sink writing to a temporary file next to the final one
    pub fn new(output_dir: &Path, base_name: &str, level: u32) -> io::Result<Self> {
        let final_path = output_path(output_dir, base_name);
        let tmp_path = output_dir.join(format!("{base_name}.{CDXJ_EXTENSION}.tmp"));

        // Clean up stale tmp file
        if tmp_path.exists() {
            fs::remove_file(&tmp_path)?;
        }

        let file = File::create(&tmp_path)?;
        let writer = GzEncoder::new(BufWriter::new(file), Compression::new(level.min(9)));

        Ok(Self {
            writer: Some(writer),
            tmp_path,
            final_path,
            line_count: 0,
            finished: false,
        })
    }

    /// Write one newline-terminated index line
    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("sink already finalized"))?;
        self.line_count += 1;
        writer.write_all(line.as_bytes())
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Finalize: flush gzip trailer and atomically rename tmp → final
    pub fn finalize(mut self) -> io::Result<usize> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| io::Error::other("sink already finalized"))?;
        let buffered = writer.finish()?;
        let file = buffered.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.tmp_path, &self.final_path)?;
        self.finished = true;
        Ok(self.line_count)
    }
}

impl Drop for CdxjSink {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        drop(self.writer.take());
        if let Err(e) = fs::remove_file(&self.tmp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {e}", self.tmp_path.display());
            }
        }
    }
}

/// Remove stale .tmp files in the output directory
pub fn cleanup_tmp_files(output_dir: &Path) -> io::Result<()> {
    for entry in fs::read_dir(output_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "tmp") {
            log::warn!("Removing stale tmp file: {}", path.display());
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::MultiGzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn read_gz(path: &Path) -> String {
        let mut out = String::new();
        MultiGzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn finalize_renames_and_compresses() {
        let dir = TempDir::new().unwrap();
        let mut sink = CdxjSink::new(dir.path(), "CC-NEWS-0001", 6).unwrap();
        sink.write_line("a 1 {}\n").unwrap();
        sink.write_line("b 2 {}\n").unwrap();

        let tmp = dir.path().join("CC-NEWS-0001.cdxj.gz.tmp");
        assert!(tmp.exists());
        let final_path = sink.final_path().to_path_buf();
        assert!(!final_path.exists());

        assert_eq!(sink.finalize().unwrap(), 2);
        assert!(!tmp.exists());
        assert_eq!(read_gz(&final_path), "a 1 {}\nb 2 {}\n");
    }

    #[test]
    fn dropped_sink_leaves_no_final_file() {
        let dir = TempDir::new().unwrap();
        {
            let mut sink = CdxjSink::new(dir.path(), "x", 1).unwrap();
            sink.write_line("a 1 {}\n").unwrap();
            assert!(dir.path().join("x.cdxj.gz.tmp").exists());
        }
        assert!(!output_path(dir.path(), "x").exists());
        assert!(!dir.path().join("x.cdxj.gz.tmp").exists());
    }

    #[test]
    fn failed_finalize_removes_tmp() {
        let dir = TempDir::new().unwrap();
        let mut sink = CdxjSink::new(dir.path(), "blocked", 6).unwrap();
        sink.write_line("a 1 {}\n").unwrap();
        // A non-empty directory at the final path makes the rename fail
        let final_path = sink.final_path().to_path_buf();
        fs::create_dir(&final_path).unwrap();
        fs::write(final_path.join("occupied"), b"x").unwrap();

        assert!(sink.finalize().is_err());
        assert!(!dir.path().join("blocked.cdxj.gz.tmp").exists());
    }

    #[test]
    fn empty_sink_is_valid_gzip() {
        let dir = TempDir::new().unwrap();
        let sink = CdxjSink::new(dir.path(), "empty", 6).unwrap();
        assert_eq!(sink.finalize().unwrap(), 0);
        assert_eq!(read_gz(&output_path(dir.path(), "empty")), "");
    }

    #[test]
    fn cleanup_tmp_files_removes_only_tmp() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.cdxj.gz.tmp"), b"stale").unwrap();
        std::fs::write(dir.path().join("b.cdxj.gz"), b"keep").unwrap();
        std::fs::write(dir.path().join("c.tmp"), b"stale2").unwrap();

        cleanup_tmp_files(dir.path()).unwrap();

        assert!(!dir.path().join("a.cdxj.gz.tmp").exists());
        assert!(dir.path().join("b.cdxj.gz").exists());
        assert!(!dir.path().join("c.tmp").exists());
    }
}
