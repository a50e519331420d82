// libs/verification-cell/src/services/photo.rs
use std::sync::LazyLock;

use base64::{engine::general_purpose, Engine as _};
use regex::Regex;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::models::{cedula_digits, OcrResponse, PhotoVerification, VerificationError, VerifyPhotoRequest};
use crate::services::read_vendor_json;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Strips a `data:image/...;base64,` prefix and checks the payload decodes
/// to an image no larger than [`MAX_IMAGE_BYTES`].
pub fn validate_image(image_base64: &str) -> Result<&str, VerificationError> {
    let payload = match image_base64.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:image/") => data,
        Some(_) => return Err(VerificationError::InvalidInput("Only images are accepted".to_string())),
        None => image_base64,
    }
    .trim();

    if payload.is_empty() {
        return Err(VerificationError::InvalidInput("Image is empty".to_string()));
    }
    // Cheap size check before decoding.
    if payload.len() / 4 * 3 > MAX_IMAGE_BYTES + 3 {
        return Err(VerificationError::InvalidInput("Image exceeds 5MB".to_string()));
    }

    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| VerificationError::InvalidInput("Image is not valid base64".to_string()))?;

    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(VerificationError::InvalidInput("Image exceeds 5MB".to_string()));
    }

    Ok(payload)
}

static CEDULA_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:[VE]\s*[-.]?\s*)?(\d{1,3}(?:[.\s]?\d{3}){1,2})\b").ok()
});

/// Cédula-looking numbers in OCR text, as digits.
pub fn extract_cedulas(text: &str) -> Vec<String> {
    let Some(pattern) = CEDULA_PATTERN.as_ref() else {
        return Vec::new();
    };

    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| cedula_digits(m.as_str()))
        .filter(|digits| digits.len() >= 6 && digits.len() <= 9)
        .collect()
}

fn fold(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' | 'ü' | 'Ü' => 'u',
            'ñ' | 'Ñ' => 'n',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// Every name token of two or more letters appears in the text.
pub fn name_matches(text: &str, name: &str) -> bool {
    let haystack = fold(text);
    let tokens: Vec<String> = fold(name)
        .split_whitespace()
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect();

    !tokens.is_empty() && tokens.iter().all(|token| haystack.contains(token.as_str()))
}

pub struct PhotoVerifier {
    client: Client,
    url: String,
    api_key: String,
}

impl PhotoVerifier {
    pub fn new(config: &AppConfig) -> Result<Self, VerificationError> {
        if !config.is_ocr_configured() {
            return Err(VerificationError::NotConfigured("OCR service"));
        }

        Ok(Self {
            client: Client::new(),
            url: config.ocr_api_url.clone(),
            api_key: config.ocr_api_key.clone(),
        })
    }

    pub async fn verify(&self, request: &VerifyPhotoRequest) -> Result<PhotoVerification, VerificationError> {
        let expected = cedula_digits(&request.cedula);
        if expected.len() < 6 {
            return Err(VerificationError::InvalidInput("Cédula is too short".to_string()));
        }
        let image = validate_image(&request.image_base64)?;

        debug!("Sending cédula photo to OCR for {}", expected);
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .json(&json!({ "image_base64": image }))
            .send()
            .await?;

        let ocr: OcrResponse = read_vendor_json("OCR service", response).await?;

        let found = extract_cedulas(&ocr.text);
        let cedula_match = found.iter().any(|c| c == &expected);
        let name_match = request
            .nombre
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| name_matches(&ocr.text, n));

        let extracted_cedula = if cedula_match { Some(expected.clone()) } else { found.into_iter().next() };
        let verified = cedula_match && name_match.unwrap_or(true);

        info!("Cédula photo check for {}: verified={}", expected, verified);
        Ok(PhotoVerification {
            verified,
            cedula_match,
            name_match,
            extracted_cedula,
        })
    }
}
