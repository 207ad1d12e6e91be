/*!
 * Process Executor
 * Launches supervised subprograms as OS processes
 */

use super::traits::{ChildHandle, ProcessLauncher};
use crate::core::errors::{ProcessError, ProcessResult};
use crate::environment::EnvironmentSet;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info, warn};

/// Spawns children with `std::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsLauncher;

impl OsLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for OsLauncher {
    fn launch(&self, executable: &Path, env: &EnvironmentSet) -> ProcessResult<Box<dyn ChildHandle>> {
        let mut cmd = Command::new(executable);

        // The environment set is complete; nothing else leaks through
        cmd.env_clear();
        cmd.envs(env.iter());

        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
            path: executable.to_path_buf(),
            source,
        })?;

        info!(
            executable = %executable.display(),
            os_pid = child.id(),
            "Spawned OS process"
        );

        Ok(Box::new(OsChild::new(child)))
    }
}

/// Handle to a running OS child
///
/// Dropping a handle that was never terminated kills the child, so children
/// do not outlive their supervisor.
#[derive(Debug)]
pub struct OsChild {
    child: Child,
    reaped: bool,
}

impl OsChild {
    pub fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }
}

impl ChildHandle for OsChild {
    fn id(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn is_alive(&mut self) -> ProcessResult<bool> {
        if self.reaped {
            return Ok(false);
        }
        match self.child.try_wait() {
            Ok(None) => Ok(true),
            Ok(Some(status)) => {
                self.reaped = true;
                debug!(os_pid = self.child.id(), status = %status, "Child exited");
                Ok(false)
            }
            Err(source) => Err(ProcessError::PollFailed {
                pid: self.child.id(),
                source,
            }),
        }
    }

    fn terminate(&mut self) -> ProcessResult<()> {
        if self.reaped {
            return Ok(());
        }
        let pid = self.child.id();

        match self.child.kill() {
            Ok(()) => {}
            // Already exited but not yet reaped
            Err(e) if e.kind() == ErrorKind::InvalidInput => {}
            Err(source) => return Err(ProcessError::TerminateFailed { pid, source }),
        }

        self.child
            .wait()
            .map_err(|source| ProcessError::TerminateFailed { pid, source })?;
        self.reaped = true;
        info!(os_pid = pid, "Killed OS process");
        Ok(())
    }
}

impl Drop for OsChild {
    fn drop(&mut self) {
        if !self.reaped {
            if let Err(e) = self.terminate() {
                warn!(error = %e, "Failed to kill child on drop");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::environment::EnvironmentBuilder;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn wait_until_dead(child: &mut Box<dyn ChildHandle>) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if !child.is_alive().unwrap() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_launch_and_exit() {
        let env = EnvironmentBuilder::new().build();
        let mut child = OsLauncher::new()
            .launch(Path::new("/bin/true"), &env)
            .unwrap();

        assert!(child.id().is_some());
        assert!(wait_until_dead(&mut child));
        // Terminating an exited child is fine
        assert!(child.terminate().is_ok());
    }

    #[test]
    fn test_terminate_running_child() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sleeper");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let env = EnvironmentBuilder::new().var("PATH", "/bin:/usr/bin").build();
        let mut child = OsLauncher::new().launch(&script, &env).unwrap();
        assert!(child.is_alive().unwrap());

        child.terminate().unwrap();
        assert!(!child.is_alive().unwrap());
    }

    #[test]
    fn test_launch_missing_executable() {
        let env = EnvironmentBuilder::new().build();
        let result = OsLauncher::new().launch(&PathBuf::from("/nonexistent/server_webgui"), &env);
        assert!(matches!(result, Err(ProcessError::SpawnFailed { .. })));
    }
}
