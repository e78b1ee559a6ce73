//! Telemetry provider consumed by the system-info builtin
//!
//! Collection itself is out of the engine's scope; the default
//! implementation is a thin procfs reader with graceful fallbacks.

use crate::core::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub hostname: String,
    pub uptime_secs: u64,
    pub load_average: Option<f64>,
    pub mem_total_kb: Option<u64>,
    pub mem_available_kb: Option<u64>,
}

impl TelemetrySnapshot {
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("host {}", self.hostname)];
        parts.push(format!("up {}m", self.uptime_secs / 60));
        if let Some(load) = self.load_average {
            parts.push(format!("load {:.2}", load));
        }
        if let (Some(total), Some(avail)) = (self.mem_total_kb, self.mem_available_kb) {
            let used_pct = 100.0 * (total.saturating_sub(avail)) as f64 / total.max(1) as f64;
            parts.push(format!("mem {:.0}% used", used_pct));
        }
        parts.join(", ")
    }
}

pub trait TelemetryProvider: Send + Sync {
    fn snapshot(&self) -> Result<TelemetrySnapshot>;
}

/// procfs-backed provider; fields the platform cannot supply stay `None`
#[derive(Debug, Default)]
pub struct ProcTelemetry;

impl TelemetryProvider for ProcTelemetry {
    fn snapshot(&self) -> Result<TelemetrySnapshot> {
        let hostname = std::fs::read_to_string("/etc/hostname")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "localhost".to_string());

        let uptime_secs = std::fs::read_to_string("/proc/uptime")
            .ok()
            .and_then(|s| s.split_whitespace().next().map(str::to_string))
            .and_then(|s| s.parse::<f64>().ok())
            .map(|s| s as u64)
            .unwrap_or(0);

        let load_average = std::fs::read_to_string("/proc/loadavg")
            .ok()
            .and_then(|s| s.split_whitespace().next().map(str::to_string))
            .and_then(|s| s.parse::<f64>().ok());

        let meminfo = std::fs::read_to_string("/proc/meminfo").unwrap_or_default();
        let mem_total_kb = parse_meminfo_field(&meminfo, "MemTotal:");
        let mem_available_kb = parse_meminfo_field(&meminfo, "MemAvailable:");

        Ok(TelemetrySnapshot {
            hostname,
            uptime_secs,
            load_average,
            mem_total_kb,
            mem_available_kb,
        })
    }
}

fn parse_meminfo_field(meminfo: &str, field: &str) -> Option<u64> {
    meminfo
        .lines()
        .find(|line| line.starts_with(field))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo_field() {
        let meminfo = "MemTotal:       16301204 kB\nMemFree:         1093344 kB\nMemAvailable:    8042160 kB\n";
        assert_eq!(parse_meminfo_field(meminfo, "MemTotal:"), Some(16301204));
        assert_eq!(parse_meminfo_field(meminfo, "MemAvailable:"), Some(8042160));
        assert_eq!(parse_meminfo_field(meminfo, "SwapTotal:"), None);
    }

    #[test]
    fn test_summary_formats_memory_percentage() {
        let snapshot = TelemetrySnapshot {
            hostname: "box".into(),
            uptime_secs: 3600,
            load_average: Some(0.42),
            mem_total_kb: Some(1000),
            mem_available_kb: Some(250),
        };
        let summary = snapshot.summary();
        assert!(summary.contains("host box"));
        assert!(summary.contains("up 60m"));
        assert!(summary.contains("mem 75% used"));
    }
}
