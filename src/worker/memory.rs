//! Process memory sampling for the loop's memory ceiling.

use sysinfo::{Pid, System};

/// Reports current memory usage in bytes.
pub trait MemorySampler: Send {
    fn sample(&mut self) -> u64;
}

impl<F> MemorySampler for F
where
    F: FnMut() -> u64 + Send,
{
    fn sample(&mut self) -> u64 {
        self()
    }
}

/// Resident set size of the current process.
pub struct ProcessMemory {
    system: System,
    pid: Pid,
}

impl ProcessMemory {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(std::process::id()),
        }
    }
}

impl Default for ProcessMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler for ProcessMemory {
    fn sample(&mut self) -> u64 {
        if !self.system.refresh_process(self.pid) {
            return 0;
        }
        self.system
            .process(self.pid)
            .map(|process| process.memory())
            .unwrap_or(0)
    }
}
