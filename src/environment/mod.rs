/*!
 * Environment Builder
 *
 * Composes the variable set handed to every spawned subprogram: the host's
 * inherited environment overlaid with the application's own keys. The result
 * is frozen and shared read-only by all spawns of a run.
 */

use crate::core::limits::{DATA_DIR_ENV_KEY, INSTALL_DIR_ENV_KEY};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Immutable key/value environment passed to child processes
///
/// Keys are unique and iterate in a stable order. Values are opaque OS strings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvironmentSet {
    vars: BTreeMap<OsString, OsString>,
}

impl EnvironmentSet {
    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(key.as_ref()).map(OsString::as_os_str)
    }

    pub fn contains_key(&self, key: impl AsRef<OsStr>) -> bool {
        self.vars.contains_key(key.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Shareable handle for supervisors
    pub fn into_shared(self) -> Arc<EnvironmentSet> {
        Arc::new(self)
    }
}

/// Builder for [`EnvironmentSet`]
///
/// Later insertions overwrite earlier ones, so application keys always win
/// over inherited ones.
#[derive(Debug, Default)]
pub struct EnvironmentBuilder {
    vars: BTreeMap<OsString, OsString>,
}

impl EnvironmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with every variable visible to the host process
    pub fn inherit_host(mut self) -> Self {
        self.vars.extend(std::env::vars_os());
        self
    }

    pub fn var(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn data_dir(self, dir: &Path) -> Self {
        self.var(DATA_DIR_ENV_KEY, dir.as_os_str())
    }

    pub fn install_dir(self, dir: &Path) -> Self {
        self.var(INSTALL_DIR_ENV_KEY, dir.as_os_str())
    }

    pub fn build(self) -> EnvironmentSet {
        EnvironmentSet { vars: self.vars }
    }
}

/// Host environment plus `LOCI_DATA_DIR` and `LOCI_INSTALL_DIR`
pub fn build_environment(data_dir: &Path, install_dir: &Path) -> EnvironmentSet {
    let env = EnvironmentBuilder::new()
        .inherit_host()
        .data_dir(data_dir)
        .install_dir(install_dir)
        .build();

    info!(
        data_dir = %data_dir.display(),
        install_dir = %install_dir.display(),
        vars = env.len(),
        "Subprogram environment built"
    );
    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_application_keys_present() {
        let dir = Path::new("/data/user/0/loci");
        let env = build_environment(dir, dir);

        assert_eq!(env.get("LOCI_DATA_DIR"), Some(OsStr::new("/data/user/0/loci")));
        assert_eq!(env.get("LOCI_INSTALL_DIR"), Some(OsStr::new("/data/user/0/loci")));
    }

    #[test]
    fn test_idempotent() {
        let dir = Path::new("/tmp/loci");
        assert_eq!(build_environment(dir, dir), build_environment(dir, dir));
    }

    #[test]
    fn test_application_keys_override_inherited() {
        let env = EnvironmentBuilder::new()
            .var("LOCI_DATA_DIR", "/stale")
            .data_dir(Path::new("/fresh"))
            .build();

        assert_eq!(env.len(), 1);
        assert_eq!(env.get("LOCI_DATA_DIR"), Some(OsStr::new("/fresh")));
    }

    #[test]
    fn test_independent_install_dir() {
        let env = EnvironmentBuilder::new()
            .data_dir(Path::new("/var/lib/loci"))
            .install_dir(Path::new("/opt/loci"))
            .build();

        assert_eq!(env.get("LOCI_DATA_DIR"), Some(OsStr::new("/var/lib/loci")));
        assert_eq!(env.get("LOCI_INSTALL_DIR"), Some(OsStr::new("/opt/loci")));
    }

    #[test]
    fn test_iteration_order_is_stable() {
        let env = EnvironmentBuilder::new()
            .var("B", "2")
            .var("A", "1")
            .build();
        let keys: Vec<&OsStr> = env.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![OsStr::new("A"), OsStr::new("B")]);
    }
}
