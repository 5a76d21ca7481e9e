//! Process-table lookups backing the shell-container heuristics.

use std::sync::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Name lookups over the running process table.
pub trait ProcessIndex: Send + Sync {
    /// Executable name for a process id, e.g. `firefox.exe`.
    fn name_of(&self, pid: u32) -> Option<String>;

    /// Names of all running processes, lowercased.
    fn running_names(&self) -> Vec<String>;
}

/// `sysinfo`-backed process index.
pub struct SystemProcessIndex {
    system: Mutex<System>,
}

impl SystemProcessIndex {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
        }
    }
}

impl Default for SystemProcessIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessIndex for SystemProcessIndex {
    fn name_of(&self, pid: u32) -> Option<String> {
        let mut system = self.system.lock().ok()?;
        let pid = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|p| p.name().to_string_lossy().to_lowercase())
    }

    fn running_names(&self) -> Vec<String> {
        let Ok(mut system) = self.system.lock() else {
            return Vec::new();
        };
        system.refresh_processes(ProcessesToUpdate::All, true);
        system
            .processes()
            .values()
            .map(|p| p.name().to_string_lossy().to_lowercase())
            .collect()
    }
}
