use axum::{
    Router,
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use blood_analysis::{
    AnalysisConfig, AnalysisError, AnalysisOutcome, AnalysisResult, Analyzer, ImageInput,
    OcrResult, select_provider,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::models::{AnalyzeImageRequest, AnalyzeRequest, ExtractRequest};

/// Report photos arrive base64-encoded inside JSON, a third larger than the file.
pub const MAX_BODY_BYTES: usize = 25 * 1024 * 1024; // 25 MB

const BODY_TOO_LARGE_MESSAGE: &str = "Uploaded file is too large. Please upload an image under 18 MB.";

type OutcomeResponse = (StatusCode, Json<AnalysisOutcome>);
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn outcome_response(result: blood_analysis::Result<AnalysisResult>) -> OutcomeResponse {
    match result {
        Ok(analysis) => (StatusCode::OK, Json(AnalysisOutcome::success(analysis))),
        Err(e) => failure_response(e),
    }
}

fn failure_response(e: AnalysisError) -> OutcomeResponse {
    let status = if e.is_client_error() {
        warn!("Rejected analysis request: {}", e);
        StatusCode::BAD_REQUEST
    } else {
        error!("Analysis failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(AnalysisOutcome::from(e)))
}

fn malformed_body(rejection: JsonRejection, message: &str) -> OutcomeResponse {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Request body over {} bytes: {}", MAX_BODY_BYTES, rejection.body_text());
        return (
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(AnalysisOutcome::failure(BODY_TOO_LARGE_MESSAGE)),
        );
    }
    warn!("Malformed request body: {}", rejection.body_text());
    failure_response(AnalysisError::InvalidInput(message.to_string()))
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AnalysisConfig>,
    pub analyzer: Arc<Analyzer>,
}

impl AppState {
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_analyzer(config, Analyzer::default())
    }

    pub fn with_analyzer(config: AnalysisConfig, analyzer: Analyzer) -> Self {
        Self {
            config: Arc::new(config),
            analyzer: Arc::new(analyzer),
        }
    }
}

pub fn create_app(config: AnalysisConfig) -> Router {
    build_router(AppState::new(config))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/extract", post(extract))
        .route("/api/analyze", post(analyze_text))
        .route("/api/analyze/image", post(analyze_image))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Blood Test Analysis Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "AI-assisted blood test analysis from recognized text or report images",
        "endpoints": {
            "POST /api/extract": "Extract candidate markers from recognized text",
            "POST /api/analyze": "Analyze OCR results and extracted markers",
            "POST /api/analyze/image": "Analyze a blood test image with a vision model",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn extract(
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<OcrResult>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        warn!("Malformed extract request: {}", e.body_text());
        bad_request_error("Request body must be JSON with a `text` field")
    })?;

    let ocr = request.into_ocr_result();
    info!("Extracted {} marker candidates", ocr.markers.len());
    Ok(Json(ocr))
}

async fn analyze_text(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> OutcomeResponse {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return malformed_body(rejection, blood_analysis::error::INVALID_OCR_MESSAGE);
        }
    };

    let ocr = match request.ocr_result() {
        Ok(ocr) => ocr,
        Err(e) => return failure_response(e),
    };

    info!(
        "Starting text analysis with {} extracted markers",
        ocr.markers.len()
    );

    let choice = select_provider(&state.config, &request.preferences());
    outcome_response(state.analyzer.analyze_text(&ocr, &choice).await)
}

async fn analyze_image(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeImageRequest>, JsonRejection>,
) -> OutcomeResponse {
    let unsupported = blood_analysis::error::UNSUPPORTED_FILE_MESSAGE;

    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return malformed_body(rejection, unsupported),
    };

    let image = match request.image.as_deref().map(ImageInput::from_data_url) {
        Some(Ok(image)) => image,
        Some(Err(e)) => return failure_response(e),
        None => return failure_response(AnalysisError::InvalidInput(unsupported.to_string())),
    };

    info!("Starting vision analysis of {:?} image", image.format());

    let choice = select_provider(&state.config, &request.preferences());
    outcome_response(state.analyzer.analyze_image(&image, &choice).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, Uri};
    use blood_analysis::HttpChatTransport;
    use http_body_util::BodyExt;
    use std::sync::Mutex;
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    #[derive(Debug, Clone)]
    struct CapturedCall {
        path: String,
        headers: HeaderMap,
        body: Value,
    }

    /// Stand-in chat completion endpoint serving `/direct` and `/fallback`.
    #[derive(Clone)]
    struct FakeProvider {
        status: StatusCode,
        body: String,
        calls: Arc<Mutex<Vec<CapturedCall>>>,
    }

    async fn fake_completion(
        State(provider): State<FakeProvider>,
        uri: Uri,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, String) {
        provider.calls.lock().unwrap().push(CapturedCall {
            path: uri.path().to_string(),
            headers,
            body,
        });
        (provider.status, provider.body.clone())
    }

    async fn spawn_provider(status: StatusCode, body: String) -> (String, Arc<Mutex<Vec<CapturedCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let provider = FakeProvider {
            status,
            body,
            calls: calls.clone(),
        };
        let app = Router::new()
            .route("/direct", post(fake_completion))
            .route("/fallback", post(fake_completion))
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .with_state(provider);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), calls)
    }

    fn completion_body() -> String {
        let content = json!({
            "markers": [
                {"name": "Hemoglobin", "value": 14.5, "unit": "g/dL", "refRange": "12.0-16.0", "status": "normal"}
            ],
            "summary": {
                "overallHealth": "Values are within reference ranges.",
                "keyFindings": ["Normal hemoglobin"],
                "riskFactors": []
            },
            "recommendations": {
                "diet": ["Iron-rich foods"],
                "lifestyle": ["Regular exercise"],
                "followUp": ["Routine check in a year"]
            }
        });
        json!({
            "choices": [{"message": {"role": "assistant", "content": format!("Sure! {} Hope this helps.", content)}}]
        })
        .to_string()
    }

    fn app_for(base_url: &str) -> Router {
        let config = AnalysisConfig {
            direct_api_url: format!("{}/direct", base_url),
            fallback_api_url: format!("{}/fallback", base_url),
            fallback_api_key: "shared-key".into(),
            ..AnalysisConfig::default()
        };
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let analyzer = Analyzer::new(HttpChatTransport::with_client(client));
        build_router(AppState::with_analyzer(config, analyzer))
    }

    async fn post_json(app: &Router, uri: &str, body: String) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn text_request(user_api_key: Option<&str>) -> String {
        json!({
            "ocrResults": {
                "text": "Hemoglobin 14.5 g/dL (12.0-16.0)",
                "confidence": 0.9,
                "markers": [{"name": "Hemoglobin", "value": 14.5, "unit": "g/dL", "refRange": "12.0-16.0"}]
            },
            "userApiKey": user_api_key,
            "model": "gpt-4o"
        })
        .to_string()
    }

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn png_data_url() -> String {
        ImageInput::from_bytes(&PNG_SIGNATURE)
            .unwrap()
            .data_url()
            .to_string()
    }

    /// A PNG-signed payload of `len` bytes, encoded as a data URL.
    fn large_png_data_url(len: usize) -> String {
        let mut bytes = vec![0u8; len];
        bytes[..PNG_SIGNATURE.len()].copy_from_slice(&PNG_SIGNATURE);
        ImageInput::from_bytes(&bytes).unwrap().data_url().to_string()
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let app = app_for("http://127.0.0.1:9");
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn missing_ocr_results_is_bad_request() {
        let (base, calls) = spawn_provider(StatusCode::OK, completion_body()).await;
        let app = app_for(&base);

        let (status, body) = post_json(&app, "/api/analyze", json!({"userApiKey": null}).to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"success": false, "error": "Invalid OCR results provided"}));

        let (status, _) = post_json(&app, "/api/analyze", "{not json".to_string()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fallback_route_sends_attribution_headers() {
        let (base, calls) = spawn_provider(StatusCode::OK, completion_body()).await;
        let app = app_for(&base);

        let (status, body) = post_json(&app, "/api/analyze", text_request(Some("sk-or-v1-abc"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["markers"][0]["status"], "normal");
        assert_eq!(body["data"]["metadata"]["model"], "openai/gpt-4o-mini");
        assert!(body["data"]["metadata"]["analyzedAt"].is_string());

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.path, "/fallback");
        assert_eq!(call.headers["authorization"], "Bearer shared-key");
        assert_eq!(call.headers["http-referer"], "http://localhost:3000");
        assert_eq!(call.headers["x-title"], "Blood Analysis AI");
        assert_eq!(call.body["model"], "openai/gpt-4o-mini");
        assert_eq!(call.body["temperature"], 0.3);
        assert_eq!(call.body["max_tokens"], 2000);
        assert_eq!(call.body["messages"][0]["role"], "system");
        assert_eq!(call.body["messages"][1]["role"], "user");
    }

    #[tokio::test]
    async fn personal_key_routes_direct_without_attribution() {
        let (base, calls) = spawn_provider(StatusCode::OK, completion_body()).await;
        let app = app_for(&base);

        let (status, body) = post_json(&app, "/api/analyze", text_request(Some("sk-user-key"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["metadata"]["model"], "gpt-4o");

        let calls = calls.lock().unwrap();
        let call = &calls[0];
        assert_eq!(call.path, "/direct");
        assert_eq!(call.headers["authorization"], "Bearer sk-user-key");
        assert!(call.headers.get("http-referer").is_none());
        assert!(call.headers.get("x-title").is_none());
        assert_eq!(call.body["model"], "gpt-4o");
    }

    #[tokio::test]
    async fn provider_failure_hides_raw_body() {
        let (base, _calls) = spawn_provider(
            StatusCode::UNAUTHORIZED,
            r#"{"error":{"message":"No auth credentials found"}}"#.to_string(),
        )
        .await;
        let app = app_for(&base);

        let (status, body) = post_json(&app, "/api/analyze", text_request(None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({
                "success": false,
                "error": "Analysis service temporarily unavailable. Please try again later."
            })
        );
    }

    #[tokio::test]
    async fn unreachable_provider_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let app = app_for(&format!("http://{}", addr));

        let (status, body) = post_json(&app, "/api/analyze", text_request(Some("sk-user-key"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "Analysis service temporarily unavailable. Please check your API key."
        );
    }

    #[tokio::test]
    async fn malformed_model_output_is_single_error() {
        let truncated = json!({
            "choices": [{"message": {"content": "{\"markers\": [{\"name\": \"Hemoglobin\", \"value\": 14.5}"}}]
        })
        .to_string();
        let (base, _calls) = spawn_provider(StatusCode::OK, truncated).await;
        let app = app_for(&base);

        let (status, body) = post_json(&app, "/api/analyze", text_request(None)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body,
            json!({"success": false, "error": "Failed to process analysis results. Please try again."})
        );
    }

    #[tokio::test]
    async fn image_analysis_sends_vision_message() {
        let (base, calls) = spawn_provider(StatusCode::OK, completion_body()).await;
        let app = app_for(&base);
        let image = png_data_url();

        let (status, body) = post_json(
            &app,
            "/api/analyze/image",
            json!({"image": image}).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["metadata"]["confidence"], 0.85);

        let calls = calls.lock().unwrap();
        let content = &calls[0].body["messages"][1]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], image.as_str());
        assert_eq!(content[1]["image_url"]["detail"], "high");
        assert_eq!(calls[0].body["max_tokens"], 3000);
    }

    #[tokio::test]
    async fn phone_sized_image_is_accepted() {
        let (base, calls) = spawn_provider(StatusCode::OK, completion_body()).await;
        let app = app_for(&base);
        let image = large_png_data_url(2_500_000);
        assert!(image.len() > 3_000_000);

        let (status, body) = post_json(
            &app,
            "/api/analyze/image",
            json!({"image": image}).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].body["messages"][1]["content"][1]["image_url"]["url"],
            image.as_str()
        );
    }

    #[tokio::test]
    async fn oversized_body_is_payload_too_large() {
        let (base, calls) = spawn_provider(StatusCode::OK, completion_body()).await;
        let app = app_for(&base);
        let image = large_png_data_url(MAX_BODY_BYTES);

        let (status, body) = post_json(
            &app,
            "/api/analyze/image",
            json!({"image": image}).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body, json!({"success": false, "error": BODY_TOO_LARGE_MESSAGE}));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_image_upload_is_rejected() {
        let (base, calls) = spawn_provider(StatusCode::OK, completion_body()).await;
        let app = app_for(&base);

        for body in [
            json!({"image": "data:application/pdf;base64,JVBERi0xLjc="}),
            json!({}),
        ] {
            let (status, response) = post_json(&app, "/api/analyze/image", body.to_string()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(
                response["error"],
                "Unsupported file type. Please upload an image file (PNG, JPG, JPEG)."
            );
        }
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extract_endpoint_returns_markers() {
        let app = app_for("http://127.0.0.1:9");
        let (status, body) = post_json(
            &app,
            "/api/extract",
            json!({"text": "Hemoglobin 14.5 g/dL (12.0-16.0)\nGlucose: 95 mg/dL Ref: 70-100", "confidence": 0.8})
                .to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["confidence"], 0.8);
        assert_eq!(body["markers"][0]["name"], "Hemoglobin");
        assert_eq!(body["markers"][1]["refRange"], "70-100");
        assert_eq!(body["markers"].as_array().unwrap().len(), 2);
    }
}
