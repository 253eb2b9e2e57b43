//! Harness configuration.

use std::{path::PathBuf, time::Duration};

use crate::{job::DEFAULT_JOBS, sys};

/// Settings shared by the console tools.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Vendor Bluetooth library to load.
    pub library: String,
    /// Symbol of the base interface table.
    pub symbol: String,
    /// How long startup waits for the adapter to report being switched on.
    pub enable_timeout: Duration,
    /// Number of background jobs that may run at the same time.
    pub jobs: usize,
    /// File removed when the library cannot be loaded.
    pub pid_file: PathBuf,
    /// Switch to the Bluetooth service user before loading.
    pub drop_privileges: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: sys::BLUETOOTH_LIBRARY_NAME.to_string(),
            symbol: sys::BLUETOOTH_INTERFACE_STRING.to_string(),
            enable_timeout: Duration::from_secs(5),
            jobs: DEFAULT_JOBS,
            pid_file: PathBuf::from("/data/.bdt_pid"),
            drop_privileges: false,
        }
    }
}
