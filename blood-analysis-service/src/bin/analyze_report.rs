use anyhow::{Context, Result, bail};
use blood_analysis::{
    AnalysisConfig, AnalysisOutcome, Analyzer, OcrResult, UserPreferences, select_provider,
};
use clap::Parser;
use std::path::PathBuf;

/// Run marker extraction and a text analysis over OCR output stored in a file.
#[derive(Parser, Debug)]
#[command(name = "analyze_report")]
struct Args {
    /// Text file holding the recognized report text
    path: PathBuf,

    /// Confidence reported by the recognizer, between 0 and 1
    #[arg(long, default_value_t = 0.9)]
    confidence: f64,

    /// Only print the extracted markers, skip the provider call
    #[arg(long)]
    extract_only: bool,

    /// Personal OpenAI key; without it the fallback provider is used
    #[arg(long)]
    api_key: Option<String>,

    /// Model to use with a personal key
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    if !(0.0..=1.0).contains(&args.confidence) {
        bail!("--confidence must be between 0 and 1, got {}", args.confidence);
    }

    println!("Blood Test Report -> Markers -> Analysis");
    println!("========================================");

    let text = tokio::fs::read_to_string(&args.path)
        .await
        .with_context(|| format!("Failed to read {}", args.path.display()))?;

    let ocr = OcrResult::from_text(text, args.confidence);
    println!("Extracted {} marker candidates:", ocr.markers.len());
    for marker in &ocr.markers {
        println!(
            "   - {}: {} {} (ref: {})",
            marker.name, marker.value, marker.unit, marker.ref_range
        );
    }
    println!();

    if args.extract_only {
        return Ok(());
    }

    let config = AnalysisConfig::from_env();
    let choice = select_provider(&config, &UserPreferences::new(args.api_key, args.model));
    println!("Analyzing with {} via {:?} route...", choice.model, choice.route);

    let analyzer: Analyzer = Analyzer::default();
    let outcome = AnalysisOutcome::from(analyzer.analyze_text(&ocr, &choice).await);
    match (&outcome.data, &outcome.error) {
        (Some(result), _) => {
            println!();
            println!("Overall health: {}", result.summary.overall_health);
            println!();
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        (None, error) => {
            eprintln!(
                "Analysis failed: {}",
                error.as_deref().unwrap_or("unknown error")
            );
            std::process::exit(1);
        }
    }

    Ok(())
}
