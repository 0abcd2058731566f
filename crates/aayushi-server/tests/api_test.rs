use aayushi_core::Source;
use aayushi_llm::{
    CompletionRequest, LLMChunk, LLMError, LLMProvider, LLMStream, SearchError, SearchProvider,
};
use aayushi_server::{configure, AppState};
use actix_web::{test, web, App};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use std::sync::{Arc, Mutex};

enum Reply {
    Tokens(Vec<&'static str>),
    TokensThenHang(Vec<&'static str>),
    Fail(u16),
}

struct MockLlm {
    reply: Reply,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockLlm {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for MockLlm {
    async fn chat_stream(&self, request: &CompletionRequest) -> Result<LLMStream, LLMError> {
        self.requests.lock().unwrap().push(request.clone());

        let tokens = |tokens: &Vec<&'static str>| {
            tokens
                .iter()
                .map(|t| Ok(LLMChunk::Token(t.to_string())))
                .collect::<Vec<_>>()
        };

        match &self.reply {
            Reply::Tokens(t) => {
                let mut items = tokens(t);
                items.push(Ok(LLMChunk::Done));
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Reply::TokensThenHang(t) => Ok(Box::pin(
                futures::stream::iter(tokens(t)).chain(futures::stream::pending()),
            )),
            Reply::Fail(status) => Err(LLMError::Api {
                status: Some(*status),
                message: "Rate limit reached".to_string(),
            }),
        }
    }
}

struct MockSearch {
    result: Result<usize, Option<u16>>,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    fn returning(count: usize) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(count),
            queries: Mutex::new(Vec::new()),
        })
    }

    fn failing(status: Option<u16>) -> Arc<Self> {
        Arc::new(Self {
            result: Err(status),
            queries: Mutex::new(Vec::new()),
        })
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(&self, query: &str) -> Result<Vec<Source>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());

        match self.result {
            Ok(count) => Ok((1..=count)
                .map(|n| Source {
                    title: format!("Result {n}"),
                    href: format!("https://example.com/{n}"),
                    snippet: format!("Snippet {n}"),
                })
                .collect()),
            Err(status) => Err(SearchError::Api {
                status,
                message: "search unavailable".to_string(),
            }),
        }
    }
}

macro_rules! app {
    ($llm:expr, $search:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new($llm.clone(), $search.clone())))
                .configure(configure),
        )
        .await
    };
}

fn header<B>(resp: &actix_web::dev::ServiceResponse<B>, name: &str) -> String {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn chat(body: serde_json::Value) -> actix_http::Request {
    test::TestRequest::post()
        .uri("/api/chat")
        .set_json(body)
        .to_request()
}

#[actix_web::test]
async fn health_returns_ok() {
    let (llm, search) = (MockLlm::new(Reply::Tokens(vec![])), MockSearch::returning(0));
    let app = app!(llm, search);

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    assert_eq!(test::read_body(resp).await, "OK");
}

#[actix_web::test]
async fn empty_message_is_rejected_without_upstream_calls() {
    let (llm, search) = (MockLlm::new(Reply::Tokens(vec!["x"])), MockSearch::returning(3));
    let app = app!(llm, search);

    for body in [json!({"message": ""}), json!({"message": "   "}), json!({})] {
        let resp = test::call_service(&app, chat(body)).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    assert!(llm.requests().is_empty());
    assert!(search.queries().is_empty());
}

#[actix_web::test]
async fn non_text_message_is_rejected() {
    let (llm, search) = (MockLlm::new(Reply::Tokens(vec!["x"])), MockSearch::returning(0));
    let app = app!(llm, search);

    let resp = test::call_service(&app, chat(json!({"message": 42}))).await;

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    assert!(llm.requests().is_empty());
}

#[actix_web::test]
async fn unknown_model_is_rejected() {
    let (llm, search) = (MockLlm::new(Reply::Tokens(vec!["x"])), MockSearch::returning(0));
    let app = app!(llm, search);

    let resp = test::call_service(&app, chat(json!({"message": "hi", "model": "gpt-4"}))).await;

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid model selected");
    assert!(llm.requests().is_empty());
}

#[actix_web::test]
async fn generation_parameters_are_clamped() {
    let (llm, search) = (MockLlm::new(Reply::Tokens(vec!["ok"])), MockSearch::returning(0));
    let app = app!(llm, search);

    let resp = test::call_service(
        &app,
        chat(json!({"message": "hi", "temperature": 9.5, "max_tokens": 100000})),
    )
    .await;
    assert!(resp.status().is_success());
    test::read_body(resp).await;

    let resp = test::call_service(
        &app,
        chat(json!({"message": "hi", "temperature": -1, "max_tokens": 0})),
    )
    .await;
    assert!(resp.status().is_success());
    test::read_body(resp).await;

    let requests = llm.requests();
    assert_eq!(requests[0].temperature, 2.0);
    assert_eq!(requests[0].max_tokens, 8192);
    assert_eq!(requests[1].temperature, 0.0);
    assert_eq!(requests[1].max_tokens, 1);
}

#[actix_web::test]
async fn plain_message_streams_tokens_without_search() {
    let llm = MockLlm::new(Reply::Tokens(vec!["Recursion ", "is ", "a function calling itself."]));
    let search = MockSearch::returning(3);
    let app = app!(llm, search);

    let resp = test::call_service(&app, chat(json!({"message": "Explain recursion"}))).await;

    assert!(resp.status().is_success());
    assert_eq!(header(&resp, "content-type"), "text/plain; charset=utf-8");
    assert_eq!(header(&resp, "X-Sources"), "[]");
    assert!(!header(&resp, "X-Request-Id").is_empty());

    let body = test::read_body(resp).await;
    assert_eq!(body, "Recursion is a function calling itself.");
    assert!(search.queries().is_empty());

    let request = &llm.requests()[0];
    assert_eq!(request.model, "llama-3.1-8b-instant");
    assert_eq!(request.messages[1].content, "Explain recursion");
}

#[actix_web::test]
async fn web_prefix_searches_stripped_query_and_returns_sources() {
    let llm = MockLlm::new(Reply::Tokens(vec!["Sunny."]));
    let search = MockSearch::returning(3);
    let app = app!(llm, search);

    let resp = test::call_service(
        &app,
        chat(json!({"message": "WEB:  current weather in Kathmandu "})),
    )
    .await;

    assert!(resp.status().is_success());
    let sources: Vec<Source> = serde_json::from_str(&header(&resp, "X-Sources")).unwrap();
    assert_eq!(sources.len(), 3);
    assert_eq!(sources[0].title, "Result 1");
    assert_eq!(test::read_body(resp).await, "Sunny.");

    assert_eq!(search.queries(), vec!["current weather in Kathmandu".to_string()]);

    let prompt = &llm.requests()[0].messages[1].content;
    assert!(prompt.starts_with("Web Search Results:"));
    assert!(prompt.contains("- Result 2: Snippet 2 (https://example.com/2)"));
    assert!(prompt.contains("User Query: current weather in Kathmandu"));
}

#[actix_web::test]
async fn use_web_searches_full_message() {
    let llm = MockLlm::new(Reply::Tokens(vec!["ok"]));
    let search = MockSearch::returning(1);
    let app = app!(llm, search);

    let resp = test::call_service(
        &app,
        chat(json!({"message": "latest rust release", "useWeb": true})),
    )
    .await;

    assert!(resp.status().is_success());
    test::read_body(resp).await;
    assert_eq!(search.queries(), vec!["latest rust release".to_string()]);
}

#[actix_web::test]
async fn search_failure_does_not_fail_completion() {
    let llm = MockLlm::new(Reply::Tokens(vec!["answer"]));
    let search = MockSearch::failing(Some(503));
    let app = app!(llm, search);

    let resp = test::call_service(&app, chat(json!({"message": "web: anything"}))).await;

    assert!(resp.status().is_success());
    assert_eq!(header(&resp, "X-Sources"), "[]");
    assert_eq!(test::read_body(resp).await, "answer");
    assert_eq!(llm.requests()[0].messages[1].content, "anything");
}

#[actix_web::test]
async fn upstream_status_is_passed_through() {
    let llm = MockLlm::new(Reply::Fail(429));
    let search = MockSearch::returning(0);
    let app = app!(llm, search);

    let resp = test::call_service(&app, chat(json!({"message": "hi"}))).await;

    assert_eq!(resp.status(), 429);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "API error: Rate limit reached");
}

#[actix_web::test]
async fn stop_cancels_active_completion() {
    let llm = MockLlm::new(Reply::TokensThenHang(vec!["partial"]));
    let search = MockSearch::returning(0);
    let app = app!(llm, search);

    let resp = test::call_service(&app, chat(json!({"message": "write an essay"}))).await;
    let request_id = header(&resp, "X-Request-Id");

    let stop = test::TestRequest::post()
        .uri(&format!("/api/chat/{}/stop", request_id))
        .to_request();
    let stopped = test::call_service(&app, stop).await;
    assert_eq!(stopped.status(), 200);
    let body: serde_json::Value = test::read_body_json(stopped).await;
    assert_eq!(body["success"], true);

    // The relay ends instead of waiting on the provider forever.
    let body = test::read_body(resp).await;
    assert!(body.len() <= "partial".len());

    let again = test::TestRequest::post()
        .uri(&format!("/api/chat/{}/stop", request_id))
        .to_request();
    assert_eq!(test::call_service(&app, again).await.status(), 404);
}

#[actix_web::test]
async fn stop_unknown_request_is_not_found() {
    let (llm, search) = (MockLlm::new(Reply::Tokens(vec![])), MockSearch::returning(0));
    let app = app!(llm, search);

    let req = test::TestRequest::post()
        .uri("/api/chat/does-not-exist/stop")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn search_route_returns_normalized_results() {
    let (llm, search) = (MockLlm::new(Reply::Tokens(vec![])), MockSearch::returning(2));
    let app = app!(llm, search);

    let req = test::TestRequest::post()
        .uri("/api/web")
        .set_json(json!({"query": "rust async"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert!(resp.status().is_success());
    let results: Vec<Source> = test::read_body_json(resp).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[1].href, "https://example.com/2");
    assert_eq!(search.queries(), vec!["rust async".to_string()]);
}

#[actix_web::test]
async fn search_route_rejects_empty_query() {
    let (llm, search) = (MockLlm::new(Reply::Tokens(vec![])), MockSearch::returning(2));
    let app = app!(llm, search);

    for body in [json!({"query": ""}), json!({}), json!({"query": 7})] {
        let req = test::TestRequest::post()
            .uri("/api/web")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
    assert!(search.queries().is_empty());
}

#[actix_web::test]
async fn search_route_failure_statuses() {
    let (llm, failing) = (MockLlm::new(Reply::Tokens(vec![])), MockSearch::failing(None));
    let app = app!(llm, failing);
    let req = test::TestRequest::post()
        .uri("/api/web")
        .set_json(json!({"query": "q"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Search API error: search unavailable");

    let with_status = MockSearch::failing(Some(401));
    let app = app!(llm, with_status);
    let req = test::TestRequest::post()
        .uri("/api/web")
        .set_json(json!({"query": "q"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 401);
}
