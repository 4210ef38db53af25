//! Analysis orchestration: prompt building, the single provider round trip,
//! payload recovery and metadata stamping.
//!
//! Each call suspends exactly once, on the outbound request. Nothing is
//! retried and no timeout is imposed beyond the transport's own; a failed call
//! is returned to the caller as is.

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AnalysisError, INVALID_OCR_MESSAGE, Result};
use crate::models::{AnalysisMetadata, AnalysisResult, BloodMarker, OcrResult};
use crate::prompt::{SYSTEM_PROMPT, build_image_prompt, build_text_prompt};
use crate::provider::ProviderChoice;
use crate::transport::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ChatTransport, ContentPart,
    HttpChatTransport, ImageUrl,
};
use crate::validate::validate_response;
use crate::vision::ImageInput;

pub const ANALYSIS_TEMPERATURE: f64 = 0.3;
pub const TEXT_MAX_TOKENS: u32 = 2000;
pub const VISION_MAX_TOKENS: u32 = 3000;
/// OCR confidence is discounted by this factor for the model's interpretation.
pub const OCR_CONFIDENCE_FACTOR: f64 = 0.9;
pub const VISION_DEFAULT_CONFIDENCE: f64 = 0.85;
pub const DISCLAIMER: &str = "This analysis is for educational purposes only. Always consult healthcare professionals for medical decisions.";

/// Which input the analysis started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisPath {
    /// Recognized text plus extracted markers.
    Text,
    /// Image sent straight to a vision model.
    Vision,
}

impl AnalysisPath {
    fn unavailable_message(self, personal_key: bool) -> &'static str {
        match (self, personal_key) {
            (Self::Text, true) => {
                "Analysis service temporarily unavailable. Please check your API key."
            }
            (Self::Text, false) => {
                "Analysis service temporarily unavailable. Please try again later."
            }
            (Self::Vision, true) => {
                "Analysis failed. Please check your API key and ensure you're using a vision-capable model."
            }
            (Self::Vision, false) => {
                "Free analysis service temporarily unavailable. Please try again or use your own OpenAI API key."
            }
        }
    }
}

/// Runs analyses over any [`ChatTransport`]. Holds no per-analysis state, so
/// one instance can serve every request.
#[derive(Debug, Clone)]
pub struct Analyzer<T = HttpChatTransport> {
    transport: T,
}

impl Default for Analyzer<HttpChatTransport> {
    fn default() -> Self {
        Self::new(HttpChatTransport::new())
    }
}

impl<T: ChatTransport> Analyzer<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Analyze recognized text and its candidate markers. Confidence is the
    /// OCR confidence discounted by [`OCR_CONFIDENCE_FACTOR`].
    pub async fn analyze(
        &self,
        source_text: &str,
        markers: &[BloodMarker],
        ocr_confidence: f64,
        choice: &ProviderChoice,
    ) -> Result<AnalysisResult> {
        if !ocr_confidence.is_finite() {
            return Err(AnalysisError::InvalidInput(INVALID_OCR_MESSAGE.to_string()));
        }

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_text_prompt(source_text, markers)),
        ];
        let confidence = ocr_confidence.clamp(0.0, 1.0) * OCR_CONFIDENCE_FACTOR;

        self.run(AnalysisPath::Text, messages, TEXT_MAX_TOKENS, confidence, choice)
            .await
    }

    pub async fn analyze_text(
        &self,
        ocr: &OcrResult,
        choice: &ProviderChoice,
    ) -> Result<AnalysisResult> {
        self.analyze(&ocr.text, &ocr.markers, ocr.confidence, choice)
            .await
    }

    /// Vision-only path: the model reads the image itself.
    pub async fn analyze_image(
        &self,
        image: &ImageInput,
        choice: &ProviderChoice,
    ) -> Result<AnalysisResult> {
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user_parts(vec![
                ContentPart::Text {
                    text: build_image_prompt(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.data_url().to_string(),
                        detail: Some("high".to_string()),
                    },
                },
            ]),
        ];

        self.run(
            AnalysisPath::Vision,
            messages,
            VISION_MAX_TOKENS,
            VISION_DEFAULT_CONFIDENCE,
            choice,
        )
        .await
    }

    async fn run(
        &self,
        path: AnalysisPath,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        confidence: f64,
        choice: &ProviderChoice,
    ) -> Result<AnalysisResult> {
        let analysis_id = Uuid::new_v4();
        info!(
            %analysis_id,
            ?path,
            route = ?choice.route,
            model = %choice.model,
            "Starting blood test analysis"
        );

        let request = ChatCompletionRequest {
            model: choice.model.clone(),
            messages,
            temperature: ANALYSIS_TEMPERATURE,
            max_tokens,
        };

        let unavailable = |status: Option<u16>| AnalysisError::ProviderUnavailable {
            message: path
                .unavailable_message(choice.uses_personal_key())
                .to_string(),
            status,
        };

        let response = match self.transport.send(choice, &request).await {
            Ok(response) => response,
            Err(e) => {
                error!(%analysis_id, error = %e, "Chat completion request failed");
                return Err(unavailable(None));
            }
        };

        if !response.is_success() {
            error!(
                %analysis_id,
                status = response.status,
                body = %response.body,
                "Provider returned an error response"
            );
            return Err(unavailable(Some(response.status)));
        }

        let completion: ChatCompletionResponse =
            serde_json::from_str(&response.body).map_err(|e| {
                error!(%analysis_id, error = %e, body = %response.body, "Invalid response format from LLM");
                AnalysisError::Unexpected(format!("Invalid response format from LLM: {}", e))
            })?;

        let analysis_text = completion.first_content().ok_or_else(|| {
            warn!(%analysis_id, "Provider returned no completion content");
            AnalysisError::EmptyCompletion
        })?;

        let draft = validate_response(analysis_text).map_err(|e| {
            error!(
                %analysis_id,
                error = %e,
                raw_response = %analysis_text,
                "Failed to parse analysis result"
            );
            AnalysisError::ResultProcessing(e)
        })?;

        let metadata = AnalysisMetadata {
            analyzed_at: Utc::now(),
            confidence,
            model: choice.model.clone(),
            disclaimer: DISCLAIMER.to_string(),
        };

        info!(
            %analysis_id,
            markers = draft.markers.len(),
            "Blood test analysis completed"
        );
        Ok(draft.finish(metadata))
    }
}
