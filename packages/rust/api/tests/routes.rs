use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    extract::Request,
    http::{Response, StatusCode, header},
};
use quizsmith_api::AppState;
use quizsmith_core::Coordinator;
use quizsmith_extractor::ArticleSource;
use quizsmith_shared::{Article, QuizsmithError, Result};
use quizsmith_storage::Storage;
use quizsmith_synthesizer::{Synthesizer, TextModel};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::util::ServiceExt;

const ARTICLE_URL: &str = "https://en.wikipedia.org/wiki/Ada_Lovelace";

struct PageSource;

#[async_trait]
impl ArticleSource for PageSource {
    async fn extract(&self, url: &str) -> Result<Article> {
        if url.contains("Missing") {
            return Err(QuizsmithError::Fetch(
                "Failed to fetch URL: HTTP 404 Not Found".into(),
            ));
        }
        Ok(Article {
            title: "Ada Lovelace".into(),
            content: "Ada Lovelace was an English mathematician.".into(),
            sections: vec!["Early life".into(), "Career".into()],
        })
    }
}

struct FixedModel {
    response: String,
    calls: AtomicUsize,
}

#[async_trait]
impl TextModel for FixedModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

struct TestApp {
    router: Router,
    model: Arc<FixedModel>,
    _dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let response = std::fs::read_to_string("../../../fixtures/json/quiz_response.json")
            .expect("read fixture");
        Self::build(response, &["*".into()]).await
    }

    async fn with_model_response(response: String) -> Self {
        Self::build(response, &["*".into()]).await
    }

    async fn with_origins(origins: &[String]) -> Self {
        let response = std::fs::read_to_string("../../../fixtures/json/quiz_response.json")
            .expect("read fixture");
        Self::build(response, origins).await
    }

    async fn build(response: String, origins: &[String]) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let storage = Storage::open(&dir.path().join("quiz.db"))
            .await
            .expect("open db");
        let model = Arc::new(FixedModel {
            response,
            calls: AtomicUsize::new(0),
        });
        let coordinator = Coordinator::new(
            Arc::new(PageSource),
            Synthesizer::new(model.clone()),
            Arc::new(storage),
            1,
        );

        let router = quizsmith_api::app(AppState::new(Arc::new(coordinator)), origins);

        Self {
            router,
            model,
            _dir: dir,
        }
    }

    async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("oneshot fail")
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.request(req).await;
        let status = resp.status();
        let data = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = serde_json::from_slice(&data).expect("body is JSON");
        (status, json)
    }

    async fn generate(&self, body: Value) -> (StatusCode, Value) {
        let req = Request::post("/api/generate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::new(body.to_string()))
            .expect("build request");
        self.send(req).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let req = Request::get(uri).body(Body::empty()).expect("build request");
        self.send(req).await
    }
}

#[tokio::test]
async fn generate_returns_quiz_graph() {
    let app = TestApp::new().await;

    let (status, quiz) = app.generate(json!({ "url": ARTICLE_URL })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["url"], ARTICLE_URL);
    assert_eq!(quiz["title"], "Ada Lovelace");
    assert!(quiz["created_at"].is_string());

    let questions = quiz["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 6);
    for q in questions {
        let options = q["options"].as_array().unwrap();
        assert_eq!(options.len(), 4);
        assert!(options.iter().any(|o| o["text"] == q["correct_answer"]));
        assert!(["easy", "medium", "hard"].contains(&q["difficulty"].as_str().unwrap()));
    }

    let sections: Vec<_> = quiz["sections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(sections, vec!["Early life", "Career"]);
    assert_eq!(quiz["key_entities"][0]["category"], "people");
    assert!(quiz["related_topics"][0]["topic"].is_string());
}

#[tokio::test]
async fn repeat_generate_is_cached_unless_forced() {
    let app = TestApp::new().await;

    let (_, first) = app.generate(json!({ "url": ARTICLE_URL })).await;
    let (_, second) = app.generate(json!({ "url": ARTICLE_URL })).await;
    assert_eq!(first["id"], second["id"]);
    assert_eq!(app.model.calls.load(Ordering::SeqCst), 1);

    let (status, forced) = app
        .generate(json!({ "url": ARTICLE_URL, "force_refresh": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(first["id"], forced["id"]);
    assert_eq!(app.model.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn history_lists_all_quizzes() {
    let app = TestApp::new().await;

    let (status, empty) = app.get("/api/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty, json!([]));

    app.generate(json!({ "url": ARTICLE_URL })).await;
    app.generate(json!({ "url": "https://en.wikipedia.org/wiki/Charles_Babbage" }))
        .await;

    let (status, history) = app.get("/api/history").await;
    assert_eq!(status, StatusCode::OK);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["url"], ARTICLE_URL);
    assert_eq!(history[1]["questions"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn quiz_by_id_and_not_found() {
    let app = TestApp::new().await;
    let (_, created) = app.generate(json!({ "url": ARTICLE_URL })).await;
    let id = created["id"].as_i64().unwrap();

    let (status, quiz) = app.get(&format!("/api/quiz/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz, created);

    let (status, body) = app.get(&format!("/api/quiz/{}", id + 1000)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "Quiz not found" }));
}

#[tokio::test]
async fn fetch_failure_is_bad_request() {
    let app = TestApp::new().await;

    let (status, body) = app
        .generate(json!({ "url": "https://en.wikipedia.org/wiki/Missing" }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().starts_with("Scraping failed"));
    assert_eq!(app.model.calls.load(Ordering::SeqCst), 0);

    let (_, history) = app.get("/api/history").await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn invalid_model_output_is_server_error() {
    let app = TestApp::with_model_response("Sorry, I can't do that.".into()).await;

    let (status, body) = app.generate(json!({ "url": ARTICLE_URL })).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().starts_with("LLM Generation failed"));

    let (_, history) = app.get("/api/history").await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn bad_requests_carry_detail() {
    let app = TestApp::new().await;

    let (status, body) = app.generate(json!({ "url": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, body) = app.generate(json!({ "link": ARTICLE_URL })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, body) = app.get("/api/quiz/not-a-number").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn cors_allows_any_origin_by_default() {
    let app = TestApp::new().await;

    let req = Request::get("/api/history")
        .header(header::ORIGIN, "https://quiz.example.com")
        .body(Body::empty())
        .expect("build request");
    let resp = app.request(req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn explicit_origins_allow_credentials() {
    let app = TestApp::with_origins(&["http://localhost:5173".into()]).await;

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/generate")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .expect("build request");
    let resp = app.request(req).await;

    let headers = resp.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "POST"
    );

    let req = Request::get("/api/history")
        .header(header::ORIGIN, "https://elsewhere.example.com")
        .body(Body::empty())
        .expect("build request");
    let resp = app.request(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
