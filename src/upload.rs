use std::io::{self, Read, Write};

use log::debug;
use tempfile::{Builder, NamedTempFile};

/// Copies an uploaded database into a temporary `.db` file.
///
/// The file is deleted when the returned handle is dropped, whether or not
/// the analysis succeeded.
pub fn stage_upload<R: Read>(mut upload: R) -> io::Result<NamedTempFile> {
    let mut file = Builder::new()
        .prefix("chat_cloud_upload_")
        .suffix(".db")
        .tempfile()?;
    let bytes = io::copy(&mut upload, &mut file)?;
    file.flush()?;
    debug!("Staged {bytes} bytes at {}", file.path().display());
    Ok(file)
}
