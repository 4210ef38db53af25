use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Measured value of a marker. Qualitative lab flags ("Positive", "Trace")
/// arrive as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkerValue {
    Number(f64),
    Text(String),
}

impl MarkerValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for MarkerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStatus {
    Normal,
    Low,
    High,
    Critical,
}

impl MarkerStatus {
    pub const ALL: [MarkerStatus; 4] = [Self::Normal, Self::Low, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Low => "low",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for MarkerStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("expected one of normal, low, high, critical but got {:?}", s))
    }
}

/// A single named blood-test measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodMarker {
    pub name: String,
    pub value: MarkerValue,
    pub unit: String,
    pub ref_range: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MarkerStatus>,
    /// In `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Text recognized from one upload together with the candidate markers found in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub confidence: f64,
    pub markers: Vec<BloodMarker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub overall_health: String,
    pub key_findings: Vec<String>,
    pub risk_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    pub diet: Vec<String>,
    pub lifestyle: Vec<String>,
    pub follow_up: Vec<String>,
}

/// Locally attached facts about an analysis. Never taken from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub analyzed_at: DateTime<Utc>,
    pub confidence: f64,
    pub model: String,
    pub disclaimer: String,
}

/// Validated model output that is still waiting for its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisDraft {
    pub markers: Vec<BloodMarker>,
    pub summary: HealthSummary,
    pub recommendations: Recommendations,
}

impl AnalysisDraft {
    pub fn finish(self, metadata: AnalysisMetadata) -> AnalysisResult {
        AnalysisResult {
            markers: self.markers,
            summary: self.summary,
            recommendations: self.recommendations,
            metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub markers: Vec<BloodMarker>,
    pub summary: HealthSummary,
    pub recommendations: Recommendations,
    pub metadata: AnalysisMetadata,
}

/// Uniform envelope handed to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisOutcome {
    pub fn success(result: AnalysisResult) -> Self {
        Self {
            success: true,
            data: Some(result),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl From<Result<AnalysisResult>> for AnalysisOutcome {
    fn from(result: Result<AnalysisResult>) -> Self {
        match result {
            Ok(result) => Self::success(result),
            Err(e) => Self::failure(e.user_message()),
        }
    }
}

impl From<AnalysisError> for AnalysisOutcome {
    fn from(error: AnalysisError) -> Self {
        Self::failure(error.user_message())
    }
}
