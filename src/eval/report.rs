//! Report types for comparison results.
//!
//! An [`AnalysisReport`] is built once per comparison by
//! [`analyze`](crate::eval::session::analyze) and never modified afterwards.
//! It serializes to JSON (heat maps excluded), exports one CSV row per
//! metric, and renders a plain-text summary through [`std::fmt::Display`].

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::path::Path;

use imgref::ImgVec;
use rgb::RGB8;
use serde::{Deserialize, Serialize};

use crate::analysis::artifacts::ArtifactAssessment;
use crate::analysis::edges::EdgeComparison;
use crate::analysis::histogram::HistogramComparison;
use crate::analysis::noise::NoiseEstimate;
use crate::buffer::{Precision, Shape};
use crate::error::Result;
use crate::metrics::{MetricKind, MetricResult, QualityLevel};

/// Edge and sharpness details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSection {
    /// Gradient comparison.
    pub comparison: EdgeComparison,
    /// Laplacian variance of the reference.
    pub sharpness_reference: f64,
    /// Laplacian variance of the candidate.
    pub sharpness_candidate: f64,
}

/// Noise details. Estimates are `None` when the buffer is too small.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSection {
    /// Residual noise of the reference.
    pub reference: Option<NoiseEstimate>,
    /// Residual noise of the candidate.
    pub candidate: Option<NoiseEstimate>,
    /// Gaussian sigma estimate of the reference.
    pub gaussian_sigma_reference: Option<f64>,
    /// Gaussian sigma estimate of the candidate.
    pub gaussian_sigma_candidate: Option<f64>,
    /// Mean 3x3 luma variance of the reference.
    pub mean_local_variance_reference: f64,
    /// Mean 3x3 luma variance of the candidate.
    pub mean_local_variance_candidate: f64,
    /// Signal-to-noise ratio of the reference in dB. `None` when flat.
    pub snr_reference: Option<f64>,
    /// Signal-to-noise ratio of the candidate in dB. `None` when flat.
    pub snr_candidate: Option<f64>,
}

/// Heat maps kept when the configuration asks for them.
#[derive(Debug, Clone)]
pub struct ReportMaps {
    /// New edges in green, lost edges in red.
    pub edge_difference: ImgVec<RGB8>,
    /// Local SSIM, red where dissimilar. `None` when SSIM was unavailable.
    pub ssim: Option<ImgVec<RGB8>>,
    /// Local variance heat map of the reference.
    pub noise_reference: ImgVec<RGB8>,
    /// Local variance heat map of the candidate.
    pub noise_candidate: ImgVec<RGB8>,
    /// Local variance gained in green, lost in red.
    pub noise_difference: ImgVec<RGB8>,
}

/// Result of comparing a candidate buffer with a reference buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Shape of the reference.
    pub reference: Shape,
    /// Shape of the candidate.
    pub candidate: Shape,
    /// Sample precision of both inputs.
    pub precision: Precision,
    /// Every metric, keyed by kind.
    pub metrics: BTreeMap<MetricKind, MetricResult>,
    /// Edge details.
    pub edges: EdgeSection,
    /// Noise details.
    pub noise: NoiseSection,
    /// Histogram details.
    pub histogram: HistogramComparison,
    /// Artifact details.
    pub artifacts: ArtifactAssessment,
    /// Grade derived from SSIM, when SSIM is available.
    pub quality_level: Option<QualityLevel>,
    /// When this report was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Heat maps, not serialized.
    #[serde(skip)]
    pub maps: Option<ReportMaps>,
}

impl AnalysisReport {
    /// Result for one metric.
    #[must_use]
    pub fn metric(&self, kind: MetricKind) -> Option<&MetricResult> {
        self.metrics.get(&kind)
    }

    /// Value of one metric, if present and valid.
    #[must_use]
    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        self.metric(kind).and_then(MetricResult::value)
    }

    /// Grade derived from SSIM.
    #[must_use]
    pub fn quality_level(&self) -> Option<QualityLevel> {
        self.quality_level
    }

    /// Metrics that could not be computed.
    pub fn unavailable(&self) -> impl Iterator<Item = &MetricResult> {
        self.metrics
            .values()
            .filter(|m| matches!(m.status, crate::metrics::MetricStatus::Unavailable(_)))
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a report written by [`Self::to_json`]. Heat maps are not restored.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write pretty-printed JSON to `path`.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Write one row per metric (`kind,value,status`) to `path`.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(["kind", "value", "status"])?;
        for result in self.metrics.values() {
            let value = result.value().map_or(String::new(), |v| format!("{v:.6}"));
            let status = result.status.to_string();
            wtr.write_record([result.kind.name(), value.as_str(), status.as_str()])?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Human-readable multi-section summary.
    #[must_use]
    pub fn summary_text(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_summary(&mut out);
        out
    }

    fn write_summary(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "=== Image Analysis Report ===")?;
        writeln!(
            out,
            "Reference {} vs candidate {} ({})",
            self.reference, self.candidate, self.precision
        )?;
        writeln!(out, "Generated {}", self.timestamp.to_rfc3339())?;
        writeln!(out)?;

        writeln!(out, "1. EXECUTIVE SUMMARY")?;
        writeln!(out, "{}", "-".repeat(20))?;
        match self.quality_level {
            Some(level) => writeln!(out, "Quality level: {level} ({})", level.code())?,
            None => writeln!(out, "Quality level: unknown (SSIM unavailable)")?,
        }
        let noise_delta = self.value(MetricKind::NoiseDelta).unwrap_or(0.0);
        let sharpness_delta = self.value(MetricKind::SharpnessDelta).unwrap_or(0.0);
        let verdict = if sharpness_delta < 0.0 {
            "softer/blurred"
        } else if noise_delta > 0.0 {
            "degraded (more noise)"
        } else {
            "comparable or improved"
        };
        writeln!(out, "The candidate appears {verdict} compared to the reference.")?;
        writeln!(out, "  Sharpness: {}", trend(sharpness_delta, "Increased", "Decreased"))?;
        writeln!(out, "  Noise:     {}", trend(noise_delta, "Increased", "Decreased"))?;
        writeln!(
            out,
            "  Edges:     {}",
            trend(self.edges.comparison.density_delta, "More detail", "Smoother")
        )?;
        writeln!(out)?;

        writeln!(out, "2. QUALITY METRICS")?;
        writeln!(out, "{}", "-".repeat(20))?;
        for kind in [MetricKind::Psnr, MetricKind::Ssim, MetricKind::Mse] {
            writeln!(out, "  {:<22} {}", kind.name(), self.format_metric(kind))?;
        }
        writeln!(out)?;

        writeln!(out, "3. SIGNAL ANALYSIS")?;
        writeln!(out, "{}", "-".repeat(20))?;
        for kind in [
            MetricKind::NoiseLevel,
            MetricKind::NoiseDelta,
            MetricKind::EdgePreservation,
            MetricKind::SharpnessDelta,
            MetricKind::Oversmoothing,
            MetricKind::Blockiness,
            MetricKind::Snr,
        ] {
            writeln!(out, "  {:<22} {}", kind.name(), self.format_metric(kind))?;
        }
        let a = &self.artifacts;
        writeln!(
            out,
            "  {:<22} {}{}",
            MetricKind::ArtifactScore.name(),
            self.format_metric(MetricKind::ArtifactScore),
            if a.low_confidence { " (low confidence)" } else { "" }
        )?;
        writeln!(
            out,
            "    edge {:.3}, histogram {:.3}, quality {}, blocking {}",
            a.components.edge,
            a.components.histogram,
            a.components.quality.map_or_else(|| "n/a".to_string(), |v| format!("{v:.3}")),
            a.components.blocking.map_or_else(|| "n/a".to_string(), |v| format!("{v:.3}")),
        )?;
        for note in &a.notes {
            writeln!(out, "    note: {note}")?;
        }
        writeln!(out)?;

        writeln!(out, "4. COLOR & TONE")?;
        writeln!(out, "{}", "-".repeat(20))?;
        writeln!(out, "  Brightness delta:  {:.2}", self.histogram.brightness_delta)?;
        writeln!(out, "  Contrast delta:    {:.2}", self.histogram.contrast_delta)?;
        writeln!(out, "  Histogram shift:   {:.2}%", self.histogram.shift_percent)?;
        writeln!(out, "  Histogram distance {}", self.format_metric(MetricKind::HistogramDistance))?;
        Ok(())
    }

    fn format_metric(&self, kind: MetricKind) -> String {
        match self.metric(kind) {
            None => "-".to_string(),
            Some(m) => match m.value() {
                Some(v) if matches!(kind, MetricKind::Psnr | MetricKind::Snr) => {
                    format!("{v:.2} dB")
                }
                Some(v) => format!("{v:.4}"),
                None => m.status.to_string(),
            },
        }
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary_text())
    }
}

fn trend(delta: f64, up: &'static str, down: &'static str) -> &'static str {
    if delta > 0.0 {
        up
    } else if delta < 0.0 {
        down
    } else {
        "Unchanged"
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{PixelBuffer, Precision};
    use crate::eval::config::AnalysisConfig;
    use crate::eval::session::analyze;

    fn report() -> AnalysisReport {
        let reference = PixelBuffer::from_fn(32, 32, 3, Precision::U8, |x, y, c| {
            ((x * 5 + y * 3 + c * 20) % 180) as f32 + 30.0
        })
        .unwrap();
        let candidate = reference.with_pixel(10, 10, &[255.0, 0.0, 0.0]).unwrap();
        analyze(&reference, &candidate, &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn test_lookup() {
        let r = report();
        assert!(r.value(MetricKind::Psnr).is_some());
        assert_eq!(r.metric(MetricKind::Ssim).unwrap().kind, MetricKind::Ssim);
        assert_eq!(r.unavailable().count(), 0);
        assert!(r.quality_level().is_some());
    }

    #[test]
    fn test_json_roundtrip_keeps_metrics() {
        let r = report();
        let json = r.to_json().unwrap();
        assert!(json.contains("\"artifact_score\""));
        let back = AnalysisReport::from_json(&json).unwrap();
        assert_eq!(back.metrics.len(), r.metrics.len());
        for (kind, result) in &r.metrics {
            let restored = &back.metrics[kind];
            assert_eq!(restored.status, result.status);
            assert!((restored.value - result.value).abs() <= 1e-9 * result.value.abs().max(1.0));
        }
        assert_eq!(back.reference, r.reference);
        assert!(back.maps.is_none());
    }

    #[test]
    fn test_write_csv() {
        let r = report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        r.write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("kind,value,status"));
        assert_eq!(lines.count(), r.metrics.len());
        assert!(text.contains("psnr,"));
    }

    #[test]
    fn test_write_json() {
        let r = report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        r.write_json(&path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(value["metrics"]["ssim"]["value"].as_f64().unwrap() > 0.0);
        assert!(value.get("maps").is_none());
    }

    #[test]
    fn test_summary_sections() {
        let r = report();
        let text = r.to_string();
        assert!(text.contains("1. EXECUTIVE SUMMARY"));
        assert!(text.contains("2. QUALITY METRICS"));
        assert!(text.contains("3. SIGNAL ANALYSIS"));
        assert!(text.contains("4. COLOR & TONE"));
        assert!(text.contains(" dB"));
    }
}
