use crate::models::BloodMarker;

pub const SYSTEM_PROMPT: &str = r#"You are a medical AI assistant that reviews blood test results for educational purposes.

Your responsibilities:
1. Compare each marker value with its reference range
2. Point out possible health concerns or patterns
3. Explain findings in plain, understandable language
4. Suggest general wellness measures
5. Stress that a healthcare professional must be consulted

Rules:
- Interpret conservatively
- Flag critical values that need immediate medical attention
- Do not diagnose specific conditions
- Focus on prevention and general wellness
- Answer with valid JSON only

This is educational information, not medical advice."#;

const RESPONSE_SHAPE: &str = r#"{
  "markers": [
    {
      "name": "string",
      "value": "number or string",
      "unit": "string",
      "refRange": "string",
      "status": "normal|low|high|critical"
    }
  ],
  "summary": {
    "overallHealth": "string describing the general health picture",
    "keyFindings": ["key findings"],
    "riskFactors": ["potential risk factors"]
  },
  "recommendations": {
    "diet": ["dietary recommendations"],
    "lifestyle": ["lifestyle recommendations"],
    "followUp": ["follow-up actions"]
  }
}"#;

const STATUS_RULES: &str = r#"Set each marker's status by comparing its value with the reference range:
- "normal": inside the range
- "low": below the range
- "high": above the range
- "critical": far enough outside the range to need immediate attention"#;

/// Instruction for the text path: recognized text plus the candidate markers
/// found in it.
pub fn build_text_prompt(raw_text: &str, markers: &[BloodMarker]) -> String {
    let markers_json =
        serde_json::to_string_pretty(markers).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"Analyze the following blood test results and give a comprehensive assessment.

RECOGNIZED TEXT:
{raw_text}

EXTRACTED MARKERS:
{markers_json}

Return a JSON response with exactly this structure:
{RESPONSE_SHAPE}

{STATUS_RULES}

Keep recommendations practical and evidence based. Be conservative and always recommend consulting healthcare professionals."#
    )
}

/// Instruction for the vision path, sent next to the image itself.
pub fn build_image_prompt() -> String {
    format!(
        r#"Analyze this blood test image and give a comprehensive assessment. Read every visible blood marker with its value, then analyze the results.

Return a JSON response with exactly this structure:
{RESPONSE_SHAPE}

Instructions:
1. Examine the image carefully
2. Extract every visible marker, value, unit and reference range
3. {STATUS_RULES}
4. Give evidence-based analysis and recommendations
5. Interpret conservatively and always recommend consulting healthcare professionals
6. If the image is unclear or values are unreadable, say so in the summary

Return only valid JSON with no text before or after it."#
    )
}
