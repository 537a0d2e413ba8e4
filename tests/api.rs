use std::io::Cursor;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use clap::Parser;
use image::{ImageFormat, Rgb, RgbImage};
use lookalike::Searcher;
use lookalike::bedrock::{FALLBACK_DESCRIPTION, ModelInvoker};
use lookalike::config::{BedrockOptions, PipelineOptions};
use lookalike::db::{Candidate, VectorStore};
use lookalike::server::{self, AppState, SearchResponse};
use rstest::*;
use serde_json::{Value, json};
use tower::ServiceExt;

#[derive(Parser)]
struct TestOpts {
    #[command(flatten)]
    bedrock: BedrockOptions,
    #[command(flatten)]
    pipeline: PipelineOptions,
}

/// 进程内的假 Bedrock 和向量库
struct Backend {
    embed_fails: bool,
    candidates: Vec<String>,
    description: Result<Value, String>,
    calls: Mutex<Vec<String>>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            embed_fails: false,
            candidates: vec![],
            description: Ok(json!({ "content": [{ "type": "text", "text": "The second one." }] })),
            calls: Mutex::new(vec![]),
        }
    }
}

impl Backend {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelInvoker for Backend {
    async fn invoke_model(&self, model_id: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        let body: Value = serde_json::from_slice(&body)?;
        self.calls.lock().unwrap().push(model_id.to_string());
        if body.get("inputImage").is_some() {
            if self.embed_fails {
                return Err(anyhow!("AccessDeniedException"));
            }
            return Ok(serde_json::to_vec(&json!({ "embedding": vec![0.25; 1024] }))?);
        }
        match &self.description {
            Ok(response) => Ok(serde_json::to_vec(response)?),
            Err(e) => Err(anyhow!(e.clone())),
        }
    }
}

#[async_trait]
impl VectorStore for Backend {
    async fn nearest(
        &self,
        query: &[f32],
        num_candidates: u32,
        limit: u32,
    ) -> Result<Vec<Candidate>> {
        self.calls.lock().unwrap().push("vector_search".to_string());
        assert_eq!(query.len(), 1024);
        assert_eq!((num_candidates, limit), (15, 3));
        Ok(self
            .candidates
            .iter()
            .enumerate()
            .map(|(i, image)| Candidate { id: Some(i.to_string()), image: image.clone() })
            .collect())
    }
}

fn app(backend: Arc<Backend>) -> axum::Router {
    let opts = TestOpts::parse_from(["test"]);
    let searcher = Searcher::new(backend.clone(), backend, &opts.bedrock, &opts.pipeline);
    server::create_app(AppState::new(searcher))
}

fn png_data_url() -> String {
    let img = RgbImage::from_fn(40, 30, |x, y| Rgb([x as u8 * 6, y as u8 * 8, 128]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    format!("data:image/png;base64,{}", BASE64_STANDARD.encode(buf.into_inner()))
}

async fn post(app: axum::Router, body: impl Into<Body>) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri("/api/search")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[rstest]
#[case::empty_object("{}")]
#[case::empty_img(r#"{"img": ""}"#)]
#[case::null_img(r#"{"img": null}"#)]
#[case::not_json("img=abc")]
#[tokio::test(flavor = "multi_thread")]
async fn missing_image(#[case] body: &'static str) {
    let backend = Arc::new(Backend::default());
    let response = post(app(backend.clone()), body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "Please upload an image first.");
    assert!(backend.calls().is_empty());
}

#[rstest]
#[case::no_comma("notadataurl")]
#[case::empty_payload("data:image/jpeg;base64,")]
#[case::bad_alphabet("data:image/jpeg;base64,abc$")]
#[case::not_an_image("data:image/jpeg;base64,aGVsbG8gd29ybGQ=")]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_image(#[case] img: &'static str) {
    let backend = Arc::new(Backend::default());
    let response = post(app(backend.clone()), json!({ "img": img }).to_string()).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "Invalid image format.");
    assert!(backend.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn two_candidates() {
    let backend = Arc::new(Backend {
        candidates: vec!["Y2VsZWIx".to_string(), "Y2VsZWIy".to_string()],
        ..Default::default()
    });
    let response = post(app(backend.clone()), json!({ "img": png_data_url() }).to_string()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response: SearchResponse = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(response.images, vec!["Y2VsZWIx", "Y2VsZWIy"]);
    assert_eq!(response.description, "The second one.");

    assert_eq!(
        backend.calls(),
        vec![
            "amazon.titan-embed-image-v1",
            "vector_search",
            "anthropic.claude-3-sonnet-20240229-v1:0",
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn no_candidates() {
    let backend = Arc::new(Backend::default());
    let response = post(app(backend), json!({ "img": png_data_url() }).to_string()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response: Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(response["images"], json!([]));
    assert_eq!(response["description"], "The second one.");
}

#[tokio::test(flavor = "multi_thread")]
async fn embedding_failure() {
    let backend = Arc::new(Backend {
        embed_fails: true,
        candidates: vec!["Y2VsZWIx".to_string()],
        ..Default::default()
    });
    let response = post(app(backend.clone()), json!({ "img": png_data_url() }).to_string()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text(response).await, "Internal Server Error");
    assert_eq!(backend.calls(), vec!["amazon.titan-embed-image-v1"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn description_failure() {
    let backend = Arc::new(Backend {
        candidates: vec!["Y2VsZWIx".to_string()],
        description: Err("ThrottlingException".to_string()),
        ..Default::default()
    });
    let response = post(app(backend), json!({ "img": png_data_url() }).to_string()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text(response).await, "Internal Server Error");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_description_content() {
    let backend = Arc::new(Backend {
        candidates: vec!["Y2VsZWIx".to_string()],
        description: Ok(json!({ "content": [] })),
        ..Default::default()
    });
    let response = post(app(backend), json!({ "img": png_data_url() }).to_string()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response: SearchResponse = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(response.description, FALLBACK_DESCRIPTION);
    assert_eq!(response.images.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn openapi_document() {
    let backend = Arc::new(Backend::default());
    let request = Request::builder().uri("/api-docs/openapi.json").body(Body::empty()).unwrap();
    let response = app(backend).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let doc: Value = serde_json::from_str(&text(response).await).unwrap();
    assert!(doc["paths"]["/api/search"]["post"].is_object());
}
