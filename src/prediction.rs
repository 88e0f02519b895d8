use crate::config::PredictionServiceConfig;
use crate::error::PredictionError;
use crate::presenter::{tier, Tier};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client};
use serde::Deserialize;
use tracing::instrument;

// The classifier only ever sees JPEG metadata, whatever the user picked.
const UPLOAD_FIELD: &str = "file";
const UPLOAD_FILENAME: &str = "image.jpg";
const UPLOAD_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub brand: String,
    /// Whole-number percentage, 0..=100.
    pub confidence: u8,
}

impl AnalysisResult {
    pub fn tier(&self) -> Tier {
        tier(self.confidence)
    }
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    brand: String,
    confidence: f64,
}

impl TryFrom<PredictionResponse> for AnalysisResult {
    type Error = PredictionError;

    fn try_from(response: PredictionResponse) -> Result<Self, Self::Error> {
        let brand = response.brand.trim();
        if brand.is_empty() {
            return Err(PredictionError::Protocol("empty brand in response".into()));
        }

        let confidence = response.confidence;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(PredictionError::Protocol(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }

        Ok(AnalysisResult {
            brand: brand.to_string(),
            confidence: confidence_to_percent(confidence),
        })
    }
}

pub fn confidence_to_percent(confidence: f64) -> u8 {
    (confidence * 100.0).round().clamp(0.0, 100.0) as u8
}

#[async_trait]
pub trait Predictor: Send + Sync + 'static {
    async fn predict(&self, image_data: Bytes) -> Result<AnalysisResult, PredictionError>;
}

#[derive(Debug, Clone)]
pub struct PredictionClient {
    client: Client,
    predict_url: String,
}

impl PredictionClient {
    pub fn new(config: &PredictionServiceConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.get_timeout()).build()?;

        Ok(Self {
            client,
            predict_url: config.get_predict_url(),
        })
    }

    pub fn predict_url(&self) -> &str {
        &self.predict_url
    }
}

#[async_trait]
impl Predictor for PredictionClient {
    #[instrument(skip(self, image_data), fields(len = image_data.len()))]
    async fn predict(&self, image_data: Bytes) -> Result<AnalysisResult, PredictionError> {
        let part = multipart::Part::bytes(image_data.to_vec())
            .file_name(UPLOAD_FILENAME)
            .mime_str(UPLOAD_MIME_TYPE)?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&self.predict_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            if let Ok(body) = response.text().await {
                tracing::debug!(%status, body = %body, "Prediction service error body");
            }
            tracing::warn!(%status, "Prediction service returned a failure status");
            return Err(PredictionError::Protocol(format!(
                "prediction failed with status {}",
                status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PredictionError::Network(e.to_string()))?;

        let payload: PredictionResponse = serde_json::from_slice(&body)
            .map_err(|e| PredictionError::Protocol(format!("malformed payload: {}", e)))?;

        let result = AnalysisResult::try_from(payload)?;
        tracing::debug!(
            brand = %result.brand,
            confidence = result.confidence,
            "Prediction received"
        );

        Ok(result)
    }
}
