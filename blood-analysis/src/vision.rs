use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::ImageFormat;

use crate::error::{AnalysisError, Result, UNSUPPORTED_FILE_MESSAGE};

/// An uploaded image, kept as the data URL the model receives.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInput {
    data_url: String,
    format: ImageFormat,
}

impl ImageInput {
    /// Accepts `data:image/<subtype>;base64,<payload>` whose payload decodes
    /// to a recognizable raster image.
    pub fn from_data_url(data_url: &str) -> Result<Self> {
        let unsupported = || AnalysisError::InvalidInput(UNSUPPORTED_FILE_MESSAGE.to_string());

        let data_url = data_url.trim();
        let (header, payload) = data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split_once(','))
            .ok_or_else(unsupported)?;

        let mime = header.strip_suffix(";base64").ok_or_else(unsupported)?;
        if !mime.starts_with("image/") {
            return Err(unsupported());
        }

        let bytes = STANDARD.decode(payload).map_err(|_| unsupported())?;
        let format = image::guess_format(&bytes).map_err(|_| unsupported())?;

        Ok(Self {
            data_url: data_url.to_string(),
            format,
        })
    }

    /// Build a data URL from raw image bytes, sniffing the format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let format = image::guess_format(bytes)
            .map_err(|_| AnalysisError::InvalidInput(UNSUPPORTED_FILE_MESSAGE.to_string()))?;
        let data_url = format!("data:{};base64,{}", format.to_mime_type(), STANDARD.encode(bytes));
        Ok(Self { data_url, format })
    }

    pub fn data_url(&self) -> &str {
        &self.data_url
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }
}
