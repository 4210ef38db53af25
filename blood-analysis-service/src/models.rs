use blood_analysis::error::INVALID_OCR_MESSAGE;
use blood_analysis::extract::PDF_TEXT_CONFIDENCE;
use blood_analysis::{AnalysisError, BloodMarker, OcrResult, UserPreferences};
use serde::{Deserialize, Serialize};

/// OCR output as the upload client reports it. Every field is optional on the
/// wire so that missing pieces become an input error rather than a rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrResultsPayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub markers: Option<Vec<BloodMarker>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub ocr_results: Option<OcrResultsPayload>,
    #[serde(default)]
    pub user_api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl AnalyzeRequest {
    pub fn preferences(&self) -> UserPreferences {
        UserPreferences::new(self.user_api_key.clone(), self.model.clone())
    }

    /// OCR results are required along with their markers and confidence.
    pub fn ocr_result(&self) -> Result<OcrResult, AnalysisError> {
        let invalid = || AnalysisError::InvalidInput(INVALID_OCR_MESSAGE.to_string());

        let payload = self.ocr_results.as_ref().ok_or_else(invalid)?;
        let markers = payload.markers.clone().ok_or_else(invalid)?;
        let confidence = payload
            .confidence
            .filter(|c| c.is_finite())
            .ok_or_else(invalid)?;

        Ok(OcrResult {
            text: payload.text.clone().unwrap_or_default(),
            confidence: confidence.clamp(0.0, 1.0),
            markers,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeImageRequest {
    /// `data:image/...;base64,...`
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub user_api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl AnalyzeImageRequest {
    pub fn preferences(&self) -> UserPreferences {
        UserPreferences::new(self.user_api_key.clone(), self.model.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl ExtractRequest {
    pub fn into_ocr_result(self) -> OcrResult {
        let confidence = self
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(PDF_TEXT_CONFIDENCE);
        OcrResult::from_text(self.text, confidence)
    }
}
