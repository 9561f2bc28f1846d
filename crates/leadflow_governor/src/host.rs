//! Host resource sampling.
//!
//! The governor watches host CPU and memory; when either crosses its
//! threshold the pause bit is asserted. The sampler is a trait so tests
//! drive the governor with fixed readings.

use sysinfo::System;

/// One CPU/memory reading, both in percent of the host total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostSample {
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

pub trait HostSampler: Send {
    fn sample(&mut self) -> HostSample;
}

/// Real sampler over `sysinfo`.
///
/// CPU usage is computed between consecutive refreshes, so the first
/// reading after construction reports 0%; the governor's sampling period
/// is well above `sysinfo`'s minimum update interval.
pub struct SysinfoSampler {
    system: System,
}

impl SysinfoSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSampler for SysinfoSampler {
    fn sample(&mut self) -> HostSample {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        let total = self.system.total_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            (self.system.used_memory() as f64 / total as f64 * 100.0) as f32
        };
        HostSample {
            cpu_percent: self.system.global_cpu_usage(),
            memory_percent,
        }
    }
}

/// Deterministic sampler for tests.
pub struct FixedSampler {
    pub reading: HostSample,
}

impl FixedSampler {
    pub fn new(cpu_percent: f32, memory_percent: f32) -> Self {
        Self {
            reading: HostSample {
                cpu_percent,
                memory_percent,
            },
        }
    }
}

impl HostSampler for FixedSampler {
    fn sample(&mut self) -> HostSample {
        self.reading
    }
}
