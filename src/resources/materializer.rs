/*!
 * Resource Materializer
 *
 * Copies a bundled payload into the host's private writable directory and
 * marks it executable. The copy is staged next to the target and renamed into
 * place, so an older copy that is still executing is replaced, not rewritten.
 */

use super::store::ResourceStore;
use crate::core::errors::{ResourceError, ResourceResult};
use crate::core::limits::{MATERIALIZE_BUFFER_SIZE, STAGING_SUFFIX};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one materialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedResource {
    pub name: String,
    /// Absolute path of the executable
    pub path: PathBuf,
    pub bytes_copied: u64,
    /// Read/write cycles through the copy buffer
    pub cycles: usize,
    /// False when marking the file executable failed
    pub executable: bool,
}

/// Extracts payloads from a [`ResourceStore`] into `target_dir`
#[derive(Clone)]
pub struct Materializer {
    store: Arc<dyn ResourceStore>,
    target_dir: PathBuf,
    buffer_size: usize,
}

impl Materializer {
    pub fn new(store: Arc<dyn ResourceStore>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            target_dir: target_dir.into(),
            buffer_size: MATERIALIZE_BUFFER_SIZE,
        }
    }

    /// Override the copy buffer size (minimum 1 byte)
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    /// Where `name` lands once materialized
    pub fn target_path(&self, name: &str) -> PathBuf {
        absolute(&self.target_dir).join(name)
    }

    /// Copy payload `name` to the target directory and make it executable
    ///
    /// Missing payloads and copy failures are errors. A failure to set the
    /// executable bit is only logged: the filesystem may already allow exec.
    pub fn materialize(&self, name: &str) -> ResourceResult<MaterializedResource> {
        let mut input = self.store.open(name)?;

        fs::create_dir_all(&self.target_dir)
            .map_err(|e| ResourceError::io(&self.target_dir, e))?;

        let path = self.target_path(name);
        let staging = staging_path(&path);

        let copied = File::create(&staging)
            .and_then(|mut output| copy_buffered(&mut input, &mut output, self.buffer_size))
            .and_then(|stats| fs::rename(&staging, &path).map(|_| stats));

        let (bytes_copied, cycles) = match copied {
            Ok(stats) => stats,
            Err(e) => {
                let _ = fs::remove_file(&staging);
                return Err(ResourceError::io(&path, e));
            }
        };

        debug!(
            subprogram = name,
            bytes = bytes_copied,
            cycles,
            buffer = self.buffer_size,
            "Payload copied"
        );

        let executable = match mark_executable(&path) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    subprogram = name,
                    path = %path.display(),
                    error = %e,
                    "Could not mark payload executable, spawning anyway"
                );
                false
            }
        };

        info!(subprogram = name, path = %path.display(), bytes = bytes_copied, "Materialized subprogram");

        Ok(MaterializedResource {
            name: name.to_string(),
            path,
            bytes_copied,
            cycles,
            executable,
        })
    }
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materializer")
            .field("target_dir", &self.target_dir)
            .field("buffer_size", &self.buffer_size)
            .finish_non_exhaustive()
    }
}

/// Copy through a fixed buffer until end of input
///
/// Each cycle fills the buffer completely unless input ends first, so the
/// cycle count only depends on the payload and buffer sizes.
/// Returns (bytes copied, cycles).
pub fn copy_buffered<R, W>(input: &mut R, output: &mut W, buffer_size: usize) -> io::Result<(u64, usize)>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    let mut cycles = 0usize;

    loop {
        let filled = fill_buffer(input, &mut buffer)?;
        if filled == 0 {
            break;
        }
        output.write_all(&buffer[..filled])?;
        total += filled as u64;
        cycles += 1;
        if filled < buffer.len() {
            break;
        }
    }

    output.flush()?;
    Ok((total, cycles))
}

fn fill_buffer<R: Read + ?Sized>(input: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match input.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(STAGING_SUFFIX);
    PathBuf::from(staged)
}

fn absolute(dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        return dir.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(dir))
        .unwrap_or_else(|_| dir.to_path_buf())
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> io::Result<()> {
    use crate::core::limits::EXECUTABLE_MODE;
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(EXECUTABLE_MODE))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
