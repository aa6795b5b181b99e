use std::{fs::File, io::Write, path::Path};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::capture_loop::CaptureSummary;
use crate::lifecycle::ProbeVersions;
use crate::stats::CaptureStats;

#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub metadata: ReportMetadata,
    pub summary: CaptureSummary,
    pub stats: Option<CaptureStats>,
    pub tracepoint_hits: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub duration_seconds: u64,
    pub engine: String,
    pub api_version: String,
    pub schema_version: String,
    pub num_cpus: u32,
    pub version: String,
}

impl CaptureReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct ReportGenerator {
    engine: String,
    versions: ProbeVersions,
    num_cpus: u32,
    start_time: DateTime<Utc>,
}

impl ReportGenerator {
    pub fn new(engine: &str, versions: ProbeVersions, num_cpus: u32) -> Self {
        Self {
            engine: engine.to_string(),
            versions,
            num_cpus,
            start_time: Utc::now(),
        }
    }

    pub fn finalize(
        &self,
        summary: CaptureSummary,
        stats: Option<CaptureStats>,
        tracepoint_hits: Option<u64>,
    ) -> CaptureReport {
        let duration = Utc::now()
            .signed_duration_since(self.start_time)
            .num_seconds()
            .max(0) as u64;
        CaptureReport {
            metadata: ReportMetadata {
                timestamp: self.start_time.to_rfc3339(),
                duration_seconds: duration,
                engine: self.engine.clone(),
                api_version: self.versions.api.to_string(),
                schema_version: self.versions.schema.to_string(),
                num_cpus: self.num_cpus,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            summary,
            stats,
            tracepoint_hits,
        }
    }

    pub fn save_json(report: &CaptureReport, path: &Path) -> Result<()> {
        let json_content = report.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json_content.as_bytes())?;
        Ok(())
    }

    pub fn print_summary(report: &CaptureReport) {
        println!("\nCapture Summary");
        println!("===============");
        println!("Engine: {}", report.metadata.engine);
        println!("Duration: {} seconds", report.metadata.duration_seconds);
        println!("Events: {}", report.summary.events);
        for (cpu, count) in &report.summary.events_per_cpu {
            println!("  cpu {}: {}", cpu, count);
        }
        if let Some(stats) = &report.stats {
            println!("Kernel events: {}", stats.n_evts);
            println!("Drops: {}", stats.n_drops);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_engine_common::Version;
    use tempfile::NamedTempFile;

    fn generator() -> ReportGenerator {
        let versions = ProbeVersions {
            api: Version::new(3, 0, 0),
            schema: Version::new(2, 1, 0),
        };
        ReportGenerator::new("modern_bpf", versions, 4)
    }

    #[test]
    fn should_render_versions_as_dotted_strings() {
        let report = generator().finalize(CaptureSummary::default(), None, None);

        assert_eq!(report.metadata.api_version, "3.0.0");
        assert_eq!(report.metadata.schema_version, "2.1.0");
        assert_eq!(report.metadata.num_cpus, 4);
    }

    #[test]
    fn should_save_report_as_json() {
        let mut summary = CaptureSummary::default();
        summary.events = 2;
        summary.events_per_cpu.insert(1, 2);
        let stats = CaptureStats {
            n_evts: 9,
            ..CaptureStats::default()
        };
        let report = generator().finalize(summary, Some(stats), Some(9));
        let file = NamedTempFile::new().unwrap();

        ReportGenerator::save_json(&report, file.path()).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        assert_eq!(saved["metadata"]["engine"], "modern_bpf");
        assert_eq!(saved["summary"]["events"], 2);
        assert_eq!(saved["summary"]["events_per_cpu"]["1"], 2);
        assert_eq!(saved["stats"]["n_evts"], 9);
        assert_eq!(saved["tracepoint_hits"], 9);
    }
}
