//! Liveness checks for the process writing a log file.

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, System};
use wt_core::ProcessHandle;

/// A running OS process, identified by pid and start time.
///
/// The start time guards against the pid being reused after the original
/// process exits.
pub struct SystemProcess {
    pid: Pid,
    start_time: u64,
    system: System,
}

impl SystemProcess {
    /// Looks up a process by pid.
    pub fn from_pid(pid: u32) -> Option<Self> {
        let mut system = System::new();
        let sys_pid = Pid::from_u32(pid);
        system.refresh_process_specifics(sys_pid, ProcessRefreshKind::new());
        let start_time = system.process(sys_pid)?.start_time();
        Some(Self {
            pid: sys_pid,
            start_time,
            system,
        })
    }

    /// Finds the first process whose executable name is exactly `name`.
    pub fn find_by_name(name: &str) -> Option<Self> {
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessRefreshKind::new());
        let (pid, start_time) = system
            .processes_by_exact_name(name)
            .next()
            .map(|process| (process.pid(), process.start_time()))?;
        Some(Self {
            pid,
            start_time,
            system,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid.as_u32()
    }
}

impl ProcessHandle for SystemProcess {
    fn is_running(&mut self) -> bool {
        if !self
            .system
            .refresh_process_specifics(self.pid, ProcessRefreshKind::new())
        {
            return false;
        }
        self.system.process(self.pid).is_some_and(|process| {
            process.start_time() == self.start_time && process.status() != ProcessStatus::Zombie
        })
    }
}
