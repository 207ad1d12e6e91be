/*!
 * Supervision Limits and Constants
 *
 * Centralized location for timing defaults, buffer sizes, and the names that
 * supervised subprograms depend on. Grouped by domain.
 *
 * Values marked [COMPAT] are read by the supervised binaries themselves and
 * must not change without updating them.
 */

use std::time::Duration;

// =============================================================================
// SUPERVISION TIMING
// =============================================================================

/// Liveness poll interval while a child is running (250ms)
pub const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Delay between a child's exit and the next spawn (250ms)
/// Keeps a crashing child from turning into a restart storm
pub const RESTART_BACKOFF: Duration = Duration::from_millis(250);

/// Head start given to supervised servers before readiness is signalled (250ms)
/// Approximate only: nothing guarantees the server has bound its port by then
pub const STARTUP_HEAD_START: Duration = Duration::from_millis(250);

/// Upper bound for the optional TCP readiness probe (5s)
pub const READINESS_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between readiness probe connection attempts (50ms)
pub const READINESS_PROBE_INTERVAL: Duration = Duration::from_millis(50);

// =============================================================================
// MATERIALIZATION
// =============================================================================

/// Copy buffer used when materializing payloads (16,000 bytes)
pub const MATERIALIZE_BUFFER_SIZE: usize = 16_000;

/// Mode applied to materialized executables: rwx for owner, r for group/other
#[cfg(unix)]
pub const EXECUTABLE_MODE: u32 = 0o744;

/// Suffix of the staging file written before the rename into place
pub const STAGING_SUFFIX: &str = ".materializing";

// =============================================================================
// APPLICATION NAMES
// =============================================================================

/// Data directory handed to subprograms [COMPAT]
pub const DATA_DIR_ENV_KEY: &str = "LOCI_DATA_DIR";

/// Install directory handed to subprograms [COMPAT]
pub const INSTALL_DIR_ENV_KEY: &str = "LOCI_INSTALL_DIR";

/// Legacy comma separated list of subprograms that must not be started
pub const DISABLED_SUBPROGRAMS_ENV_KEY: &str = "DISABLED_SUBPROGRAMS";

/// Prefix for host configuration overrides
pub const CONFIG_ENV_PREFIX: &str = "LOCI_KERNEL_";

/// Subprogram supervised when nothing else is configured
pub const DEFAULT_SUBPROGRAM: &str = "server_webgui";

/// Address the UI surface connects to once the server is up
pub const DEFAULT_UI_ADDRESS: &str = "127.0.0.1:7010";

/// Device identifier file written into the data directory root
pub const DEVICE_ID_FILE_NAME: &str = "machine_id.txt";
