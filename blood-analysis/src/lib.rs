//! Blood test analysis core.
//!
//! Text recognized from an uploaded report goes through [`extract_markers`],
//! the [`Analyzer`] sends it (or the raw image on the vision path) to the
//! endpoint picked by [`select_provider`], and the model's answer is
//! recovered and checked by [`validate_response`] before local metadata is
//! attached.
//!
//! ```no_run
//! use blood_analysis::{AnalysisConfig, Analyzer, OcrResult, UserPreferences, select_provider};
//!
//! # async fn run() -> blood_analysis::Result<()> {
//! let config = AnalysisConfig::from_env();
//! let ocr = OcrResult::from_text("Hemoglobin 14.5 g/dL (12.0-16.0)", 0.92);
//! let choice = select_provider(&config, &UserPreferences::default());
//! let analyzer: Analyzer = Analyzer::default();
//! let result = analyzer.analyze_text(&ocr, &choice).await?;
//! println!("{}", result.summary.overall_health);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod transport;
pub mod validate;
pub mod vision;

// Re-export commonly used types
pub use analysis::{AnalysisPath, Analyzer, DISCLAIMER};
pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result, ValidationError};
pub use extract::extract_markers;
pub use models::{
    AnalysisDraft, AnalysisMetadata, AnalysisOutcome, AnalysisResult, BloodMarker, HealthSummary,
    MarkerStatus, MarkerValue, OcrResult, Recommendations,
};
pub use provider::{ProviderChoice, ProviderRoute, UserPreferences, select_provider};
pub use transport::{ChatTransport, HttpChatTransport};
pub use validate::{extract_json_payload, validate, validate_response};
pub use vision::ImageInput;
