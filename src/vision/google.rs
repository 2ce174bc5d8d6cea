use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use super::LabelSource;
use crate::config::Config;

/// Google Cloud Vision `images:annotate`, label detection only.
pub struct GoogleVision {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    max_results: u32,
}

impl GoogleVision {
    pub fn new(api_base: &str, api_key: &str, max_results: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_results,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.vision_api_base,
            &config.vision_api_key,
            config.vision_max_labels,
        )
    }
}

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: Vec<AnnotateImageRequest<'a>>,
}

#[derive(Serialize)]
struct AnnotateImageRequest<'a> {
    image: ImageContent,
    features: Vec<Feature<'a>>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature<'a> {
    #[serde(rename = "type")]
    feature_type: &'a str,
    max_results: u32,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    label_annotations: Vec<LabelAnnotation>,
    error: Option<VisionStatus>,
}

#[derive(Deserialize)]
struct LabelAnnotation {
    description: String,
}

#[derive(Deserialize)]
struct VisionStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct VisionError {
    error: VisionStatus,
}

fn labels_from_response(resp: AnnotateResponse) -> anyhow::Result<Vec<String>> {
    let Some(first) = resp.responses.into_iter().next() else {
        return Ok(Vec::new());
    };

    if let Some(status) = first.error {
        anyhow::bail!("Vision API error ({}): {}", status.code, status.message);
    }

    Ok(first
        .label_annotations
        .into_iter()
        .map(|l| l.description)
        .collect())
}

#[async_trait::async_trait]
impl LabelSource for GoogleVision {
    async fn labels(&self, image: &[u8]) -> anyhow::Result<Vec<String>> {
        let body = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(image),
                },
                features: vec![Feature {
                    feature_type: "LABEL_DETECTION",
                    max_results: self.max_results,
                }],
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/images:annotate", self.api_base))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<VisionError>(&error_body) {
                anyhow::bail!("Vision API error ({}): {}", status, err.error.message);
            }
            anyhow::bail!("Vision API error ({}): {}", status, error_body);
        }

        let resp: AnnotateResponse = response.json().await?;
        labels_from_response(resp)
    }

    fn name(&self) -> &str {
        "google-vision"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> anyhow::Result<Vec<String>> {
        labels_from_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_request_body_shape() {
        let body = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(b"img"),
                },
                features: vec![Feature {
                    feature_type: "LABEL_DETECTION",
                    max_results: 10,
                }],
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["requests"][0]["image"]["content"], "aW1n");
        assert_eq!(value["requests"][0]["features"][0]["type"], "LABEL_DETECTION");
        assert_eq!(value["requests"][0]["features"][0]["maxResults"], 10);
    }

    #[test]
    fn test_labels_in_response_order() {
        let labels = parse(
            r#"{"responses": [{"labelAnnotations": [
                {"mid": "/m/1", "description": "Pothole", "score": 0.97},
                {"mid": "/m/2", "description": "Road surface", "score": 0.91},
                {"mid": "/m/3", "description": "Asphalt", "score": 0.88}
            ]}]}"#,
        )
        .unwrap();
        assert_eq!(labels, vec!["Pothole", "Road surface", "Asphalt"]);
    }

    #[test]
    fn test_no_labels_is_empty() {
        assert!(parse(r#"{"responses": [{}]}"#).unwrap().is_empty());
        assert!(parse(r#"{}"#).unwrap().is_empty());
    }

    #[test]
    fn test_per_image_error_fails() {
        let err = parse(
            r#"{"responses": [{"error": {"code": 3, "message": "Bad image data."}}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Vision API error (3): Bad image data.");
    }
}
