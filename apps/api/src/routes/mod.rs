pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use crate::demo;
use crate::feedback;
use crate::generation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let build_dir = state.config.client_build_dir.clone();

    let api = Router::new()
        .route("/api/health", get(health::health_handler))
        // Catalog
        .route("/api/companies", get(handlers::handle_companies))
        .route("/api/customer/:name", get(handlers::handle_customer))
        // Generation
        .route(
            "/api/generate-email-stream-with-retrieval/",
            post(handlers::handle_generate_stream),
        )
        .route(
            "/api/generate-email-stream",
            post(handlers::handle_generate_stream),
        )
        .route(
            "/api/generate-email-with-retrieval/",
            post(handlers::handle_generate),
        )
        .route("/api/feedback", post(feedback::handle_feedback))
        // Walkthrough pages
        .route(
            "/api/tracing_experiment",
            get(demo::handle_tracing_experiment),
        )
        .route(
            "/api/preloaded-results",
            get(demo::handle_preloaded_results),
        )
        .route(
            "/api/get-notebook-url/:name",
            get(demo::handle_notebook_url),
        )
        .route("/api/original-prompt", get(demo::handle_original_prompt))
        .route("/api/fixed-prompt", get(demo::handle_fixed_prompt))
        .route(
            "/api/current-production-prompt",
            get(demo::handle_current_prompt),
        )
        .with_state(state);

    if build_dir.is_dir() {
        info!("Serving frontend from {}", build_dir.display());
        let index = build_dir.join("index.html");
        api.fallback_service(ServeDir::new(&build_dir).fallback(ServeFile::new(index)))
    } else {
        warn!(
            "Frontend build not found at {}; serving API only",
            build_dir.display()
        );
        api
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use futures::StreamExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::stream::{decode_events, StreamEvent};
    use crate::testing::{test_state, RecordingSink, ScriptedStreamer};

    const EMAIL_TOKENS: [&str; 3] = [r#"{"subject_line": "Renewal"#, r#"", "body": "Hi"#, r#" there"}"#];

    async fn send(router: Router, request: Request<Body>) -> Response {
        router.oneshot(request).await.unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn stream_events(response: Response) -> Vec<StreamEvent> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = futures::stream::iter([Ok::<_, std::convert::Infallible>(bytes)]);
        decode_events(body)
            .map(|event| event.unwrap())
            .collect()
            .await
    }

    fn router(llm: ScriptedStreamer) -> Router {
        build_router(test_state(llm, Arc::new(RecordingSink::default())))
    }

    #[tokio::test]
    async fn test_health() {
        let response = send(router(ScriptedStreamer::tokens(&[])), get_req("/api/health")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["environment"], "production");
        assert!(body["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_companies_and_customer_lookup() {
        let app = router(ScriptedStreamer::tokens(&[]));

        let companies = body_json(send(app.clone(), get_req("/api/companies")).await).await;
        assert_eq!(companies, json!([{"name": "Acme Corp"}, {"name": "Beacon Health"}]));

        let customer = send(app.clone(), get_req("/api/customer/Acme%20Corp")).await;
        assert_eq!(customer.status(), StatusCode::OK);
        assert_eq!(body_json(customer).await["account"]["industry"], "Retail");

        let missing = send(app, get_req("/api/customer/Nobody")).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(missing).await["error"]["message"],
            "Customer 'Nobody' not found"
        );
    }

    #[tokio::test]
    async fn test_stream_endpoint_frames() {
        let response = send(
            router(ScriptedStreamer::tokens(&EMAIL_TOKENS)),
            post_json(
                "/api/generate-email-stream-with-retrieval/",
                json!({"customer_name": "Acme Corp"}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let events = stream_events(response).await;
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], StreamEvent::token(EMAIL_TOKENS[0]));
        assert!(matches!(&events[3], StreamEvent::Done { trace_id: Some(id) } if id.starts_with("tr-")));
    }

    #[tokio::test]
    async fn test_stream_alias_reports_unknown_customer_in_band() {
        let response = send(
            router(ScriptedStreamer::tokens(&EMAIL_TOKENS)),
            post_json("/api/generate-email-stream", json!({"customer_name": "Nobody"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            stream_events(response).await,
            vec![StreamEvent::error("Customer 'Nobody' not found")]
        );
    }

    #[tokio::test]
    async fn test_non_streaming_generation() {
        let response = send(
            router(ScriptedStreamer::tokens(&EMAIL_TOKENS)),
            post_json(
                "/api/generate-email-with-retrieval/",
                json!({"customer_name": "Acme Corp", "user_input": "short"}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["subject_line"], "Renewal");
        assert_eq!(body["body"], "Hi there");
        assert!(body["trace_id"].as_str().unwrap().starts_with("tr-"));
    }

    #[tokio::test]
    async fn test_non_streaming_error_statuses() {
        let cases = [
            (ScriptedStreamer::tokens(&EMAIL_TOKENS), "Nobody", StatusCode::NOT_FOUND),
            (
                ScriptedStreamer::unavailable("scaling"),
                "Acme Corp",
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ScriptedStreamer::tokens(&["not json"]),
                "Acme Corp",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (llm, customer, expected) in cases {
            let response = send(
                router(llm),
                post_json(
                    "/api/generate-email-with-retrieval/",
                    json!({"customer_name": customer}),
                ),
            )
            .await;
            assert_eq!(response.status(), expected, "customer {customer}");
        }
    }

    #[tokio::test]
    async fn test_feedback_is_forwarded() {
        let sink = Arc::new(RecordingSink::default());
        let app = build_router(test_state(ScriptedStreamer::tokens(&[]), sink.clone()));

        let response = send(
            app,
            post_json(
                "/api/feedback",
                json!({"trace_id": "tr-1", "rating": "up", "comment": "Nice", "sales_rep_name": "Sam"}),
            ),
        )
        .await;

        assert_eq!(
            body_json(response).await,
            json!({"success": true, "message": "Feedback submitted successfully"})
        );
        let submissions = sink.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        assert!(submissions[0].value);
        assert_eq!(submissions[0].source_id, "Sam");
    }

    #[tokio::test]
    async fn test_feedback_sink_failure_is_reported_in_body() {
        let sink = Arc::new(RecordingSink {
            fail_with: Some("trace not found".into()),
            ..RecordingSink::default()
        });
        let app = build_router(test_state(ScriptedStreamer::tokens(&[]), sink));

        let response = send(
            app,
            post_json("/api/feedback", json!({"trace_id": "tr-1", "rating": "down"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"success": false, "message": "Error submitting feedback: trace not found"})
        );
    }

    #[tokio::test]
    async fn test_feedback_requires_trace_id() {
        let sink = Arc::new(RecordingSink::default());
        let app = build_router(test_state(ScriptedStreamer::tokens(&[]), sink.clone()));

        let response = send(
            app,
            post_json("/api/feedback", json!({"trace_id": "", "rating": "up"})),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(sink.submissions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_demo_endpoints() {
        let app = router(ScriptedStreamer::tokens(&[]));

        let experiment = body_json(send(app.clone(), get_req("/api/tracing_experiment")).await).await;
        assert_eq!(experiment["experiment_id"], "42");
        assert_eq!(
            experiment["eval_dataset_url"],
            "https://adb-123.azuredatabricks.net/ml/experiments/42/datasets"
        );

        let notebook = body_json(send(app.clone(), get_req("/api/get-notebook-url/2_create_quality_metrics")).await).await;
        assert_eq!(notebook, json!({"notebook_name": "2_create_quality_metrics", "url": "NOT FOUND"}));

        let preloaded = body_json(send(app.clone(), get_req("/api/preloaded-results")).await).await;
        assert!(preloaded["sample_trace_url"].is_null());

        let current = body_json(send(app.clone(), get_req("/api/current-production-prompt")).await).await;
        let fixed = body_json(send(app.clone(), get_req("/api/fixed-prompt")).await).await;
        let original = body_json(send(app, get_req("/api/original-prompt")).await).await;
        assert_eq!(current, fixed);
        assert_ne!(original, fixed);
    }

    #[tokio::test]
    async fn test_unknown_route_without_frontend() {
        let response = send(router(ScriptedStreamer::tokens(&[])), get_req("/dashboard")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
