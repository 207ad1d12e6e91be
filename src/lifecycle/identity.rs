/*!
 * Device Identifier File
 * Acquiring the identifier is the host platform's job; this only persists it
 */

use crate::core::limits::DEVICE_ID_FILE_NAME;
use std::io;
use std::path::{Path, PathBuf};

/// Write `device_id` as a single line to `<data_dir>/machine_id.txt`,
/// replacing any previous content
pub fn write_device_id(data_dir: &Path, device_id: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(data_dir)?;
    let path = data_dir.join(DEVICE_ID_FILE_NAME);
    std::fs::write(&path, format!("{}\n", device_id.trim()))?;
    Ok(path)
}
