use super::{ProcessCensus, ProcessSnapshot};
use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};
use tracing::debug;

/// Finds client processes by marker substrings in their name or executable
/// path and reads their cumulative I/O read counters through `sysinfo`.
pub struct SysinfoCensus {
    system: System,
    markers: Vec<String>,
}

impl SysinfoCensus {
    pub fn new(markers: &[String]) -> Self {
        Self {
            system: System::new(),
            markers: markers
                .iter()
                .map(|m| m.trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

impl ProcessCensus for SysinfoCensus {
    fn discover(&mut self) -> Vec<u32> {
        self.system.refresh_processes();
        let mut pids: Vec<u32> = self
            .system
            .processes()
            .iter()
            .filter(|(_, proc_)| {
                let exe = proc_.exe().to_string_lossy();
                matches_markers(&self.markers, proc_.name(), &exe)
            })
            .map(|(pid, _)| pid.as_u32())
            .collect();
        pids.sort_unstable();
        debug!(count = pids.len(), "найдены процессы клиента");
        pids
    }

    fn sample(&mut self, pids: &[u32]) -> Vec<ProcessSnapshot> {
        let mut out = Vec::with_capacity(pids.len());
        for &raw in pids {
            let pid = Pid::from_u32(raw);
            if !self.system.refresh_process(pid) {
                continue;
            }
            if let Some(proc_) = self.system.process(pid) {
                out.push(ProcessSnapshot {
                    pid: raw,
                    io_read_bytes: proc_.disk_usage().total_read_bytes,
                });
            }
        }
        out
    }
}

fn matches_markers(markers: &[String], name: &str, exe: &str) -> bool {
    let name = name.to_lowercase();
    let exe = exe.to_lowercase();
    markers
        .iter()
        .any(|m| name.contains(m.as_str()) || exe.contains(m.as_str()))
}
