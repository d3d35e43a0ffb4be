use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use capao_quest::{
    AppState,
    ai::{CompletionRequest, LlmError, LlmProvider},
    client::{ClientError, GameApi, HttpGameApi, QuestStore, SessionStore},
    config::Config,
    geo::{Coordinate, PositionFix, PositionState},
    models::Rejection,
    router,
    store::MemoryStore,
};
use chrono::Utc;

struct NoModel;

#[async_trait]
impl LlmProvider for NoModel {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured)
    }
}

async fn serve() -> String {
    let mut config = Config::local("client-secret");
    config.bcrypt_cost = 4;
    let state = AppState::new(config, Arc::new(MemoryStore::seeded()), Arc::new(NoModel));
    let app = router::app(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

async fn signed_up(base_url: &str) -> HttpGameApi {
    let response = reqwest::Client::new()
        .post(format!("{base_url}/users/register"))
        .json(&serde_json::json!({
            "email": "ana@capao.app",
            "password": "secret1",
            "display_name": "Ana",
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    HttpGameApi::new(base_url)
}

fn at(lat: f64, lng: f64) -> PositionState {
    PositionState::Fix(PositionFix {
        coordinates: Coordinate::new(lat, lng),
        accuracy: 8.0,
        timestamp: Utc::now(),
    })
}

#[tokio::test]
async fn session_and_quest_stores_against_the_server() {
    let base_url = serve().await;
    let api = Arc::new(signed_up(&base_url).await);

    let session = SessionStore::new();
    session.sign_in(api.as_ref(), "ana@capao.app", "secret1").await.unwrap();
    let user = session.snapshot().user.unwrap();
    assert_eq!(user.display_name, "Ana");
    assert!(api.token().is_some());

    let quest = QuestStore::new(api.clone());
    let here = at(-14.0642, -41.3025);
    quest.fetch_locations(&here).await;
    quest.fetch_user_stats(&user.user_id).await;
    assert_eq!(quest.snapshot().locations.len(), 6);

    let result = quest.check_in("loc-001", &here).await;
    assert!(result.success, "{}", result.message);
    assert_eq!(result.points, 50);

    let state = quest.snapshot();
    assert_eq!(state.progress.as_ref().unwrap().points, 50);
    assert_eq!(state.check_ins.len(), 1);

    let far = quest.check_in("loc-002", &here).await;
    assert_eq!(far.rejection, Some(Rejection::TooFar));

    let board = api.fetch_leaderboard(10).await.unwrap();
    assert_eq!(board.len(), 1);
    assert!(board[0].is_current_user);

    let badges = api.fetch_badges().await.unwrap();
    assert!(badges.iter().any(|b| b.id == "badge-001" && b.unlocked));

    session.logout();
    assert!(!session.snapshot().is_authenticated());
}

#[tokio::test]
async fn server_errors_surface_as_api_errors() {
    let base_url = serve().await;
    let api = HttpGameApi::new(&base_url);

    match api.fetch_badges().await {
        Err(ClientError::Api { code, .. }) => assert_eq!(code, 1002),
        other => panic!("expected auth failure, got {other:?}"),
    }

    let session = SessionStore::new();
    assert!(session.sign_in(&api, "nobody@capao.app", "secret1").await.is_err());
    assert_eq!(
        session.snapshot().error.as_deref(),
        Some("Invalid email or password")
    );
}
