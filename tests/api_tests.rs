use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use reelbandit::{
    api::{create_router, AppState},
    config::Config,
    db::MemoryRepository,
    models::{MovieRating, MovieSummary},
};

const DIM: usize = 16;

async fn create_test_server_with(vars: &[(&str, &str)]) -> (TestServer, Arc<MemoryRepository>) {
    let config = Config::from_vars(
        vars.iter()
            .map(|(key, value)| (key.to_string(), value.to_string())),
    )
    .unwrap();

    let repository = Arc::new(MemoryRepository::new());
    let movies = [
        (1, "올드보이", 0.4),
        (2, "기생충", 0.9),
        (3, "괴물", 0.1),
        (4, "살인의 추억", 0.7),
        (5, "마더", 0.5),
    ];
    for (id, title, avg_sentiment) in movies {
        repository
            .insert_movie(MovieSummary {
                id,
                title: title.to_string(),
                genre: Some("Drama".to_string()),
                director: Some("Bong Joon-ho".to_string()),
                poster_url: None,
            })
            .await;
        repository
            .set_rating(MovieRating {
                movie_id: id,
                avg_sentiment,
                review_count: 3,
                ..MovieRating::default()
            })
            .await;
    }

    let state = AppState::build(config, repository.clone(), None).unwrap();
    let server = TestServer::new(create_router(state)).unwrap();
    (server, repository)
}

async fn create_test_server() -> TestServer {
    create_test_server_with(&[("ENABLE_AB_TESTING", "false")])
        .await
        .0
}

fn context(hot: &[usize]) -> Vec<f64> {
    let mut x = vec![0.0; DIM];
    for &i in hot {
        x[i] = 1.0;
    }
    x
}

fn movie_ids(body: &Value) -> Vec<i64> {
    body["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["movie_id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server().await;
    let response = server.get("/health").await;

    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = create_test_server().await;
    let id = "6f1c1a52-8a8e-4d3a-9c3b-1f2e3d4c5b6a";

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static(id),
        )
        .await;

    assert_eq!(response.header("x-request-id"), id);
}

#[tokio::test]
async fn test_config_reports_capabilities() {
    let server = create_test_server().await;
    let response = server.get("/config").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["features"]["enable_rl"], true);
    assert_eq!(body["features"]["enable_ab_testing"], false);
    assert_eq!(body["bandit"]["arms"], 1000);
    assert_eq!(body["bandit"]["dimension"], DIM);
    assert_eq!(body["scorers"], json!(["popularity"]));
    assert_eq!(body["database"], false);
}

#[tokio::test]
async fn test_select_ties_go_to_first_candidate() {
    let server = create_test_server().await;

    let response = server
        .post("/api/bandit/select")
        .json(&json!({ "context": context(&[0, 3]), "candidates": [5, 3, 9] }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["arm"], 5);
    assert_eq!(body["score"]["predicted_reward"], 0.0);
}

#[tokio::test]
async fn test_update_then_select_prefers_rewarded_arm() {
    let server = create_test_server().await;
    let x = context(&[0, 2, 6]);

    let response = server
        .post("/api/bandit/update")
        .json(&json!({ "arm": 9, "context": x, "reward": 1.0 }))
        .await;
    response.assert_status_ok();
    response.assert_json(&json!({ "arm": 9, "updates": 1 }));

    let response = server
        .post("/api/bandit/select")
        .json(&json!({ "context": x, "candidates": [5, 3, 9] }))
        .await;
    let body: Value = response.json();
    assert_eq!(body["arm"], 9);
}

#[tokio::test]
async fn test_select_rejects_empty_candidates() {
    let server = create_test_server().await;

    let response = server
        .post("/api/bandit/select")
        .json(&json!({ "context": context(&[0]), "candidates": [] }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_select_rejects_wrong_dimension() {
    let server = create_test_server().await;

    let response = server
        .post("/api/bandit/select")
        .json(&json!({ "context": [1.0, 0.0], "candidates": [1] }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_rejects_unknown_arm() {
    let server = create_test_server().await;

    let response = server
        .post("/api/bandit/update")
        .json(&json!({ "arm": 5000, "context": context(&[0]), "reward": 1.0 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bandit_routes_disabled_without_rl() {
    let (server, _) = create_test_server_with(&[("ENABLE_RL", "false")]).await;

    let response = server
        .post("/api/bandit/select")
        .json(&json!({ "context": context(&[0]), "candidates": [1] }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recommendations_without_context_use_weighted_ranking() {
    let server = create_test_server().await;

    let response = server
        .post("/api/recommendations")
        .json(&json!({ "user_id": 1, "num_recommendations": 3 }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(movie_ids(&body), vec![2, 4, 5]);
    assert_eq!(body["recommendations"][0]["source"], "weighted");
    assert_eq!(body["recommendations"][0]["title"], "기생충");
    assert!(body.get("variant").is_none());
}

#[tokio::test]
async fn test_recommendations_with_context_use_bandit() {
    let server = create_test_server().await;

    let response = server
        .post("/api/recommendations")
        .json(&json!({
            "user_id": 1,
            "num_recommendations": 3,
            "context": { "time": "evening", "device": "tv" }
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    // Untrained arms tie, so pool order is kept
    assert_eq!(movie_ids(&body), vec![2, 4, 5]);
    assert_eq!(body["recommendations"][0]["source"], "bandit");
}

#[tokio::test]
async fn test_recommendations_record_ab_exposure() {
    let (server, repository) = create_test_server_with(&[("AB_TEST_SPLIT", "1.0")]).await;

    let response = server
        .post("/api/recommendations")
        .json(&json!({ "user_id": 7, "context": { "device": "mobile" } }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["variant"], "treatment");
    assert_eq!(repository.assignments().await.len(), 1);
}

#[tokio::test]
async fn test_recommendations_reject_zero_count() {
    let server = create_test_server().await;

    let response = server
        .post("/api/recommendations")
        .json(&json!({ "user_id": 1, "num_recommendations": 0 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feedback_updates_bandit() {
    let (server, repository) = create_test_server_with(&[("ENABLE_AB_TESTING", "false")]).await;

    let response = server
        .post("/api/recommendations/feedback")
        .json(&json!({
            "user_id": 1,
            "movie_id": 3,
            "kind": "like",
            "context": { "time": "night" }
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["reward"], 3.0);
    assert_eq!(body["kind"], "like");
    assert_eq!(repository.interactions().await.len(), 1);

    // The liked movie now leads for the same user and context
    let response = server
        .post("/api/recommendations")
        .json(&json!({
            "user_id": 1,
            "num_recommendations": 5,
            "context": { "time": "night" }
        }))
        .await;
    let body: Value = response.json();
    assert_eq!(movie_ids(&body)[0], 3);
}

#[tokio::test]
async fn test_feedback_outside_arm_universe_is_recorded() {
    let (server, repository) = create_test_server_with(&[("ENABLE_AB_TESTING", "false")]).await;

    let response = server
        .post("/api/recommendations/feedback")
        .json(&json!({ "user_id": 1, "movie_id": 4242, "kind": "click" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["movie_id"], 4242);
    assert_eq!(repository.interactions().await.len(), 1);
}

#[tokio::test]
async fn test_create_review_reorders_popular_movies() {
    let server = create_test_server().await;

    let before = server
        .post("/api/recommendations")
        .json(&json!({ "user_id": 1, "num_recommendations": 3 }))
        .await;
    assert_eq!(movie_ids(&before.json()), vec![2, 4, 5]);

    let response = server
        .post("/api/reviews")
        .json(&json!({
            "movie_id": 3,
            "author_name": "지훈",
            "content": "정말 재미있고 감동적인 영화, 최고!"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["movie_id"], 3);
    assert_eq!(body["sentiment_label"], "positive");
    assert!(body["id"].is_i64());

    let after = server
        .post("/api/recommendations")
        .json(&json!({ "user_id": 1, "num_recommendations": 3 }))
        .await;
    assert_eq!(movie_ids(&after.json()), vec![3, 2, 4]);
}

#[tokio::test]
async fn test_create_review_unknown_movie() {
    let server = create_test_server().await;

    let response = server
        .post("/api/reviews")
        .json(&json!({ "movie_id": 999, "author_name": "지훈", "content": "좋다" }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_review_rejects_blank_content() {
    let server = create_test_server().await;

    let response = server
        .post("/api/reviews")
        .json(&json!({ "movie_id": 1, "author_name": "지훈", "content": "  " }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyze_review() {
    let server = create_test_server().await;

    let response = server
        .post("/api/reviews/analyze")
        .json(&json!({ "text": "연기가 정말 최고였다. 스토리는 지루했다" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["sentiment_label"], "neutral");
    assert_eq!(body["aspects"]["acting"], 1.0);
    assert_eq!(body["aspects"]["plot"], -1.0);
    assert!(body["emotions"].is_object());
}

#[tokio::test]
async fn test_analyze_review_without_absa() {
    let (server, _) = create_test_server_with(&[("ENABLE_ABSA", "false")]).await;

    let response = server
        .post("/api/reviews/analyze")
        .json(&json!({ "text": "재미있다" }))
        .await;

    let body: Value = response.json();
    assert_eq!(body["sentiment_label"], "positive");
    assert!(body.get("aspects").is_none());
}
