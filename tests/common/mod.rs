/*!
 * Shared test doubles
 * Scripted launcher standing in for real OS processes
 */

#![allow(dead_code)]

use loci_kernel::core::errors::{ProcessError, ProcessResult};
use loci_kernel::environment::EnvironmentSet;
use loci_kernel::process::{ChildHandle, ProcessLauncher};
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Child whose liveness is decided by the launcher's script
pub struct ScriptedChild {
    pid: u32,
    alive: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
    released: bool,
}

impl ScriptedChild {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl ChildHandle for ScriptedChild {
    fn id(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn is_alive(&mut self) -> ProcessResult<bool> {
        Ok(self.alive.load(Ordering::SeqCst))
    }

    fn terminate(&mut self) -> ProcessResult<()> {
        self.alive.store(false, Ordering::SeqCst);
        self.release();
        Ok(())
    }
}

impl Drop for ScriptedChild {
    fn drop(&mut self) {
        self.release();
    }
}

/// Launcher driven by a small script:
/// - the first `failed_launches` attempts fail
/// - the first `immediate_exits` successful children exit at once
/// - every later child stays up until terminated
#[derive(Default)]
pub struct ScriptedLauncher {
    failed_launches: u64,
    immediate_exits: u64,
    attempts: AtomicU64,
    spawns: AtomicU64,
    live: Arc<AtomicUsize>,
    max_live: AtomicUsize,
    environments: Mutex<Vec<EnvironmentSet>>,
    executables: Mutex<Vec<PathBuf>>,
    spawned_at: Mutex<Vec<tokio::time::Instant>>,
    last_alive: Mutex<Option<Arc<AtomicBool>>>,
}

impl ScriptedLauncher {
    pub fn new(immediate_exits: u64) -> Self {
        Self {
            immediate_exits,
            ..Default::default()
        }
    }

    pub fn failing(failed_launches: u64) -> Self {
        Self {
            failed_launches,
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn spawns(&self) -> u64 {
        self.spawns.load(Ordering::SeqCst)
    }

    /// Children launched and not yet terminated or dropped
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn environments(&self) -> Vec<EnvironmentSet> {
        self.environments.lock().clone()
    }

    pub fn executables(&self) -> Vec<PathBuf> {
        self.executables.lock().clone()
    }

    /// Runtime clock reading at each successful launch
    pub fn spawned_at(&self) -> Vec<tokio::time::Instant> {
        self.spawned_at.lock().clone()
    }

    /// Make the most recent child exit on its own
    pub fn exit_current(&self) {
        if let Some(alive) = self.last_alive.lock().as_ref() {
            alive.store(false, Ordering::SeqCst);
        }
    }
}

impl ProcessLauncher for ScriptedLauncher {
    fn launch(&self, executable: &Path, env: &EnvironmentSet) -> ProcessResult<Box<dyn ChildHandle>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failed_launches {
            return Err(ProcessError::SpawnFailed {
                path: executable.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "scripted failure"),
            });
        }

        self.environments.lock().push(env.clone());
        self.executables.lock().push(executable.to_path_buf());
        self.spawned_at.lock().push(tokio::time::Instant::now());

        let spawn = self.spawns.fetch_add(1, Ordering::SeqCst) + 1;
        let alive = Arc::new(AtomicBool::new(spawn > self.immediate_exits));
        *self.last_alive.lock() = Some(alive.clone());

        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(ScriptedChild {
            pid: 1000 + spawn as u32,
            alive,
            live: Arc::clone(&self.live),
            released: false,
        }))
    }
}

/// Poll `condition` until it holds, panicking after a few seconds
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
