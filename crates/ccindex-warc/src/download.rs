//! Raw object download into the output directory

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use ccindex_core::progress::upgrade_to_bar;
use ccindex_core::{FetchError, ObjectError, ObjectFetcher};
use indicatif::ProgressBar;

/// Local path mirroring the object key under `output_dir`
pub fn download_path(output_dir: &Path, key: &str) -> PathBuf {
    output_dir.join(key.trim_start_matches('/'))
}

/// Copy one object to `<output_dir>/<key>` via a `.tmp` sibling.
///
/// No retry; the first error is returned.
pub fn download_object(
    key: &str,
    fetcher: &dyn ObjectFetcher,
    output_dir: &Path,
    pb: &ProgressBar,
) -> Result<(PathBuf, u64), ObjectError> {
    let final_path = download_path(output_dir, key);
    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent).map_err(ObjectError::Output)?;
    }
    let mut tmp_name = final_path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut stream = fetcher.get(key, None)?;
    if let Some(total) = stream.total_bytes {
        upgrade_to_bar(pb, total);
    }
    let counter = stream.counter.clone();

    let mut out = BufWriter::new(File::create(&tmp_path).map_err(ObjectError::Output)?);
    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ObjectError::Fetch(FetchError::Io(e))),
        };
        out.write_all(&buf[..n]).map_err(ObjectError::Output)?;
        pb.set_position(counter.load(Ordering::Relaxed));
    }

    let file = out
        .into_inner()
        .map_err(|e| ObjectError::Output(e.into_error()))?;
    file.sync_all().map_err(ObjectError::Output)?;
    fs::rename(&tmp_path, &final_path).map_err(ObjectError::Output)?;

    Ok((final_path, counter.load(Ordering::Relaxed)))
}
