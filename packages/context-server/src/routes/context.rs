use axum::{
    extract::{Multipart, State},
    Json,
};
use context_extraction::{AnalyzeRequest, AnalyzeResponse, SourceInput};

use crate::app::AppState;
use crate::config::parse_bool;
use crate::error::ApiError;

/// Analyze uploaded material.
///
/// Multipart fields:
/// - `client_name`: kept verbatim in the summary
/// - `raw_text_blocks`: a JSON array of strings, or newline-separated text
/// - `files`: repeatable document uploads
/// - `url`: a page to fetch
/// - `enrich`: opt in to (or out of) enrichment for this request
///
/// Unsupported uploads are passed on; the pipeline records them as skipped.
pub async fn analyze_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let request = read_request(multipart).await?;

    tracing::info!(
        client_name = ?request.client_name,
        text_blocks = request.raw_text_blocks.len(),
        inputs = request.inputs.len(),
        enrich = ?request.enrich,
        "Analyze request received"
    );

    let response = state.analyzer.analyze(request).await?;
    Ok(Json(response))
}

async fn read_request(mut multipart: Multipart) -> Result<AnalyzeRequest, ApiError> {
    let mut request = AnalyzeRequest::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "client_name" => {
                let value = field.text().await?;
                if !value.trim().is_empty() {
                    request.client_name = Some(value);
                }
            }
            "raw_text_blocks" => {
                let value = field.text().await?;
                request.raw_text_blocks.extend(parse_text_blocks(&value));
            }
            "files" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;

                // Browsers send an empty part when no file was chosen
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }

                let input = SourceInput::document(file_name, bytes.to_vec());
                request.inputs.push(match content_type {
                    Some(ct) => input.with_content_type(ct),
                    None => input,
                });
            }
            "url" => {
                let value = field.text().await?;
                let value = value.trim();
                if !value.is_empty() {
                    request.inputs.push(SourceInput::url(value));
                }
            }
            "enrich" => {
                let value = field.text().await?;
                let enrich = parse_bool(&value).ok_or_else(|| {
                    ApiError::BadRequest(format!("enrich must be true or false, got '{value}'"))
                })?;
                request.enrich = Some(enrich);
            }
            other => tracing::debug!(field = %other, "Ignoring unknown form field"),
        }
    }

    Ok(request)
}

/// A JSON array (or any JSON value) of blocks, else one block per non-blank line.
pub fn parse_text_blocks(raw: &str) -> Vec<String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Ok(serde_json::Value::String(s)) => vec![s],
        Ok(other) => vec![other.to_string()],
        Err(_) => raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_router;
    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Request, StatusCode},
        Router,
    };
    use context_extraction::{
        testing::MockModel, Analyzer, Coordinator, Normalizer, PipelineConfig,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const BOUNDARY: &str = "context-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a str),
    }

    fn multipart_body(parts: &[Part<'_>]) -> String {
        let mut body = String::new();
        for part in parts {
            body.push_str(&format!("--{BOUNDARY}\r\n"));
            match part {
                Part::Text(name, value) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )),
                Part::File(file_name, content_type, content) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"files\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n{content}\r\n"
                )),
            }
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn router(analyzer: Analyzer) -> Router {
        build_router(AppState::new("Client Context Analyzer API", analyzer), &[], 1024 * 1024)
    }

    async fn post(router: Router, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/context/analyze")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(parts)))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_parse_text_blocks() {
        assert_eq!(parse_text_blocks(r#"["a", "b", 3]"#), vec!["a", "b", "3"]);
        assert_eq!(parse_text_blocks("first\n\n second \n"), vec!["first", " second "]);
        assert_eq!(parse_text_blocks(r#""just one""#), vec!["just one"]);
    }

    #[tokio::test]
    async fn test_text_blocks_heuristic() {
        let blocks = json!([
            "ACME busca optimizar su cadena de suministro.",
            "El presupuesto es limitado y hay restricciones de tiempo."
        ])
        .to_string();

        let (status, body) = post(
            router(Analyzer::heuristic(Normalizer::new())),
            &[Part::Text("client_name", "ACME Corp"), Part::Text("raw_text_blocks", &blocks)],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["summary"]["client_name"], "ACME Corp");
        assert!(body["summary"]["business_overview"].is_string());
        assert!(body["summary"]["potential_future_opportunities"].is_array());
        assert!(body["analysis_id"].as_str().unwrap().parse::<uuid::Uuid>().is_ok());
    }

    #[tokio::test]
    async fn test_file_upload_agentic() {
        let model = MockModel::new().with_json(json!({
            "client_name": "Acme",
            "objectives": ["Integrate the SAP ERP", "Reduce costs"],
        }));
        let analyzer = Analyzer::agentic(Coordinator::new(model.clone(), PipelineConfig::default()));

        let (status, body) = post(
            router(analyzer),
            &[
                Part::Text("client_name", "ACME"),
                Part::File("brief.txt", "text/plain", "ACME quiere integrar ERP SAP y reducir costos"),
                Part::File("photo.png", "image/png", "not really a png"),
            ],
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["summary"]["client_name"], "ACME");
        assert_eq!(body["summary"]["objectives"].as_array().unwrap().len(), 2);
        assert_eq!(body["log"][0]["payload"]["skipped"][0]["source"], "photo.png");
        assert!(model.prompts()[0].contains("[brief.txt | line 1]"));
    }

    #[tokio::test]
    async fn test_bad_enrich_flag_is_rejected() {
        let (status, body) = post(
            router(Analyzer::heuristic(Normalizer::new())),
            &[Part::Text("enrich", "perhaps")],
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("enrich"));
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let app = router(Analyzer::heuristic(Normalizer::new()));

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body, json!({"status": "ok"}));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert!(body["message"].as_str().unwrap().contains("Client Context Analyzer API"));
    }
}
