//! Comment sources: remote writer, deterministic template, cached payloads
//!
//! `generate_section_comments` walks the sections in order and never fails:
//! cached text wins, then the source, then the template. Source failures are
//! collected as "{section}: {message}" so the caller can show one warning.

use super::{fallback_summary, ReportSection, StatusCategories};
use crate::error::{Result, SoilError};
use crate::nutrients::CanonicalNutrient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Body of a comment request: `{section, nutrients, statusCategories}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    pub section: ReportSection,
    pub nutrients: Vec<CanonicalNutrient>,
    pub status_categories: StatusCategories,
}

impl CommentRequest {
    pub fn for_section(section: ReportSection, nutrients: &[CanonicalNutrient]) -> Self {
        CommentRequest {
            section,
            nutrients: section.nutrients(nutrients).into_iter().cloned().collect(),
            status_categories: StatusCategories::from_section(section, nutrients),
        }
    }
}

/// Reply of a comment writer: `{summary}` or `{error}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommentResponse {
    pub fn into_summary(self) -> Result<String> {
        match (self.summary, self.error) {
            (Some(summary), _) if !summary.trim().is_empty() => Ok(summary),
            (_, Some(error)) => Err(SoilError::Remote(error)),
            _ => Err(SoilError::Remote("response carried no summary".to_string())),
        }
    }
}

#[async_trait]
pub trait CommentSource: Send + Sync {
    async fn generate(&self, request: &CommentRequest) -> Result<String>;
}

/// Always answers with the fallback template
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateCommentSource;

#[async_trait]
impl CommentSource for TemplateCommentSource {
    async fn generate(&self, request: &CommentRequest) -> Result<String> {
        Ok(fallback_summary(request.section, &request.status_categories))
    }
}

// ============================================================================
// HTTP Source
// ============================================================================

#[cfg(feature = "api")]
pub struct HttpCommentSource {
    client: reqwest::Client,
    base_url: String,
}

#[cfg(feature = "api")]
impl HttpCommentSource {
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Previously generated comments for a report and paddock, if any
    pub async fn fetch_cached(&self, report_ref: &str, paddock: &str) -> Result<Option<CachedComments>> {
        let res = self
            .client
            .get(self.url(&format!("/api/proxy/get-ai-comments/{}", report_ref)))
            .query(&[("key", paddock)])
            .send()
            .await
            .map_err(|e| SoilError::Remote(e.to_string()))?;

        if !res.status().is_success() {
            tracing::debug!("No cached comments for {} ({})", report_ref, res.status());
            return Ok(None);
        }

        let body: Value = res.json().await.map_err(|e| SoilError::Remote(e.to_string()))?;
        Ok(CachedComments::from_value(&body))
    }
}

#[cfg(feature = "api")]
#[async_trait]
impl CommentSource for HttpCommentSource {
    async fn generate(&self, request: &CommentRequest) -> Result<String> {
        let res = self
            .client
            .post(self.url("/generate-soil-comments"))
            .json(request)
            .send()
            .await
            .map_err(|e| SoilError::Remote(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let message = match res.json::<CommentResponse>().await {
                Ok(CommentResponse { error: Some(error), .. }) => error,
                _ => status.to_string(),
            };
            return Err(SoilError::Remote(message));
        }

        let reply: CommentResponse = res
            .json()
            .await
            .map_err(|e| SoilError::Remote(format!("malformed response: {}", e)))?;
        reply.into_summary()
    }
}

// ============================================================================
// Cached Comments
// ============================================================================

/// Section texts from an earlier generation, keyed by section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedComments(pub BTreeMap<ReportSection, String>);

impl CachedComments {
    /// Accepts `{ai_comments: {combined_nutrients_explanation: {...}}}` or a
    /// flat `{"Organic Matter": "...", ...}` object. Unknown keys are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value
            .pointer("/ai_comments/combined_nutrients_explanation")
            .unwrap_or(value)
            .as_object()?;

        let comments: BTreeMap<ReportSection, String> = map
            .iter()
            .filter_map(|(key, text)| {
                let section = ReportSection::from_cache_key(key)?;
                let text = text.as_str()?.trim();
                (!text.is_empty()).then(|| (section, text.to_string()))
            })
            .collect();

        if comments.is_empty() {
            None
        } else {
            Some(CachedComments(comments))
        }
    }

    pub fn get(&self, section: ReportSection) -> Option<&str> {
        self.0.get(&section).map(|s| s.as_str())
    }

    /// Payload shape served by the comment cache
    pub fn to_value(&self) -> Value {
        let explanation: serde_json::Map<String, Value> = self
            .0
            .iter()
            .map(|(section, text)| (section.cache_key().to_string(), Value::String(text.clone())))
            .collect();
        serde_json::json!({ "ai_comments": { "combined_nutrients_explanation": explanation } })
    }
}

// ============================================================================
// Generation
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionComments {
    pub comments: BTreeMap<ReportSection, String>,
    /// "{section}: {message}" for every failed request
    pub errors: Vec<String>,
    /// Sections that received template text after a failure
    pub fallbacks: Vec<ReportSection>,
}

impl SectionComments {
    /// Non-blocking warning shown after a partially failed generation
    pub fn warning(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let detail = if self.errors.len() <= 3 {
            format!("Errors: {}", self.errors.join("; "))
        } else {
            "See logs for details.".to_string()
        };
        Some(format!(
            "AI generation partially failed for {} section(s). Fallback content was generated. {}",
            self.errors.len(),
            detail
        ))
    }
}

/// Commentary for every section. Sections with no populated nutrients and no
/// cached text are skipped.
pub async fn generate_section_comments(
    source: &dyn CommentSource,
    nutrients: &[CanonicalNutrient],
    cached: Option<&CachedComments>,
) -> SectionComments {
    let mut result = SectionComments::default();

    for &section in ReportSection::ALL {
        if let Some(text) = cached.and_then(|c| c.get(section)) {
            result.comments.insert(section, text.to_string());
            continue;
        }

        let request = CommentRequest::for_section(section, nutrients);
        if request.nutrients.is_empty() {
            continue;
        }

        let text = match source.generate(&request).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!("Comment generation failed for {}: {}", section.wire_name(), e);
                result.errors.push(format!("{}: {}", section.wire_name(), e));
                result.fallbacks.push(section);
                fallback_summary(section, &request.status_categories)
            }
        };
        result.comments.insert(section, text);
    }

    if !result.errors.is_empty() {
        tracing::info!(
            "Generated {} section comments ({} from template)",
            result.comments.len(),
            result.fallbacks.len()
        );
    }
    result
}


#[cfg(all(test, feature = "api"))]
mod http_tests {
    use super::*;
    use crate::nutrients::{aggregate, NutrientReading, SourceCategory};
    use axum::{
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;

    /// Serve `router` on an ephemeral local port; returns its base URL
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn sample() -> Vec<CanonicalNutrient> {
        aggregate(&[
            NutrientReading::new("pH-level (1:5 water)", 6.2, 6.5, "", SourceCategory::Albrecht),
            NutrientReading::new("Calcium", 81.05, 64.0, "%", SourceCategory::BaseSaturation),
        ])
    }

    #[tokio::test]
    async fn test_server_error_falls_back_to_template() {
        let router = Router::new().route(
            "/generate-soil-comments",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "quota"}))) }),
        );
        let source = HttpCommentSource::new(serve(router).await);

        let result = generate_section_comments(&source, &sample(), None).await;
        assert_eq!(result.fallbacks, vec![ReportSection::SoilPh, ReportSection::BaseSaturation]);
        assert_eq!(result.comments[&ReportSection::SoilPh], "Soil pH analysis shows good levels. Optimal levels in pH.");
        assert_eq!(
            result.warning().unwrap(),
            "AI generation partially failed for 2 section(s). Fallback content was generated. \
             Errors: soilPh: comment service failed: quota; baseSaturation: comment service failed: quota"
        );
    }

    #[tokio::test]
    async fn test_non_json_reply_falls_back_to_template() {
        let router = Router::new().route("/generate-soil-comments", post(|| async { "not json" }));
        let source = HttpCommentSource::new(serve(router).await);

        let result = generate_section_comments(&source, &sample(), None).await;
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|e| e.contains("malformed response")));
        let warning = result.warning().unwrap();
        assert!(warning.starts_with(
            "AI generation partially failed for 2 section(s). Fallback content was generated. Errors: soilPh: "
        ));
        assert!(result.comments[&ReportSection::BaseSaturation].starts_with("Base saturation analysis reveals"));
    }

    #[tokio::test]
    async fn test_remote_summary_is_used() {
        let router = Router::new().route(
            "/generate-soil-comments",
            post(|Json(request): Json<CommentRequest>| async move {
                Json(json!({"summary": format!("remote {}", request.section.wire_name())}))
            }),
        );
        let source = HttpCommentSource::new(serve(router).await);

        let result = generate_section_comments(&source, &sample(), None).await;
        assert!(result.errors.is_empty());
        assert_eq!(result.comments[&ReportSection::SoilPh], "remote soilPh");
    }

    #[tokio::test]
    async fn test_fetch_cached() {
        let router = Router::new().route(
            "/api/proxy/get-ai-comments/:id",
            get(|axum::extract::Path(id): axum::extract::Path<String>| async move {
                if id == "r1" {
                    (StatusCode::OK, Json(json!({"Soil pH": "Remote cached pH."})))
                } else {
                    (StatusCode::NOT_FOUND, Json(json!({"error": "missing"})))
                }
            }),
        );
        let source = HttpCommentSource::new(serve(router).await);

        let found = source.fetch_cached("r1", "North").await.unwrap().unwrap();
        assert_eq!(found.get(ReportSection::SoilPh), Some("Remote cached pH."));
        assert!(source.fetch_cached("r2", "North").await.unwrap().is_none());
    }
}
