use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[derive(Debug, Clone)]
pub struct ResourceSample {
    pub memory_mb: u64,
    pub peak_memory_mb: u64,
    pub cpu_usage: f32,
}

/// 記錄每個階段（fetch / classify / apply）的耗時與記憶體
pub struct RunMonitor {
    enabled: bool,
    started: Instant,
    phase_started: Instant,
    phases: Vec<(String, Duration)>,
    #[cfg(feature = "cli")]
    system: System,
    #[cfg(feature = "cli")]
    pid: Option<Pid>,
    peak_memory_mb: u64,
}

impl RunMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            enabled,
            started: now,
            phase_started: now,
            phases: Vec::new(),
            #[cfg(feature = "cli")]
            system: System::new(),
            #[cfg(feature = "cli")]
            pid: sysinfo::get_current_pid().ok(),
            peak_memory_mb: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 結束目前階段並開始計時下一個
    pub fn finish_phase(&mut self, phase: &str) {
        let elapsed = self.phase_started.elapsed();
        self.phases.push((phase.to_string(), elapsed));
        self.phase_started = Instant::now();

        if !self.enabled {
            return;
        }

        match self.sample() {
            Some(sample) => tracing::info!(
                "📊 {} took {:?} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB",
                phase,
                elapsed,
                sample.cpu_usage,
                sample.memory_mb,
                sample.peak_memory_mb
            ),
            None => tracing::info!("📊 {} took {:?}", phase, elapsed),
        }
    }

    pub fn phases(&self) -> &[(String, Duration)] {
        &self.phases
    }

    pub fn log_final_stats(&self) {
        if self.enabled {
            tracing::info!(
                "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
                self.started.elapsed(),
                self.peak_memory_mb
            );
        }
    }

    #[cfg(feature = "cli")]
    fn sample(&mut self) -> Option<ResourceSample> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        let process = self.system.process(pid)?;
        let memory_mb = process.memory() / 1024 / 1024;
        self.peak_memory_mb = self.peak_memory_mb.max(memory_mb);

        Some(ResourceSample {
            memory_mb,
            peak_memory_mb: self.peak_memory_mb,
            cpu_usage: process.cpu_usage(),
        })
    }

    // 非 CLI 建置沒有 sysinfo，只記錄耗時
    #[cfg(not(feature = "cli"))]
    fn sample(&mut self) -> Option<ResourceSample> {
        None
    }
}

impl Default for RunMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_are_recorded_even_when_disabled() {
        let mut monitor = RunMonitor::new(false);
        monitor.finish_phase("classify");
        monitor.finish_phase("apply");

        let names: Vec<&str> = monitor.phases().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["classify", "apply"]);
        assert!(!monitor.is_enabled());
    }
}
