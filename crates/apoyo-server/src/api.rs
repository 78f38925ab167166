use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use apoyo_shared::{CreateGroupRequest, SendMessageRequest};
use apoyo_store::{Group, GroupFilter, Message};
use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::ingest::IngestionPipeline;
use crate::registry::SubscriberRegistry;
use crate::store::{GroupCatalog, MessageStore};
use crate::subscription::{self, SubscriptionState};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: IngestionPipeline,
    pub messages: Arc<dyn MessageStore>,
    pub groups: Arc<dyn GroupCatalog>,
    pub registry: SubscriberRegistry,
    pub config: Arc<ServerConfig>,
    /// Cancelled once on shutdown; every live subscription watches it.
    pub shutdown: CancellationToken,
}

pub fn build_router(state: AppState) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300));
    match HeaderValue::from_str(&state.config.frontend_url) {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => warn!(
            frontend_url = %state.config.frontend_url,
            "FRONTEND_URL is not a valid origin; cross-origin requests will be refused"
        ),
    }

    // Compression only wraps the REST routes; upgrade responses stay untouched.
    let routes = Router::new()
        .route("/health", get(health_check))
        .route("/messages", post(send_message))
        .route("/groups", post(create_group).get(list_groups))
        .route("/groups/{id}", get(get_group))
        .route("/groups/{id}/messages", get(group_messages))
        .layer(CompressionLayer::new())
        .route("/ws/groups/{id}", get(subscribe_ws));

    let prefix = state.config.api_prefix.clone();
    let app = if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&prefix, routes)
    };

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Groups with at least one live subscriber.
    groups: usize,
    subscribers: usize,
}

#[derive(Deserialize)]
struct ListGroupsQuery {
    topic: Option<String>,
    search: Option<String>,
}

/// Group ids are positive integers; anything else is a bad request.
fn parse_group_id(raw: &str) -> Result<i64, ServerError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ServerError::BadRequest(format!("invalid group id: {raw}")))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ServerError::BadRequest(e.body_text()))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (groups, subscribers) = state.registry.totals();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        groups,
        subscribers,
    })
}

async fn send_message(
    State(state): State<AppState>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), ServerError> {
    let request = json_body(payload)?;
    let message = state.pipeline.submit(request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn group_messages(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let group_id = parse_group_id(&raw)?;
    let messages = state.messages.query_by_group(group_id).await?;
    Ok(Json(messages))
}

async fn create_group(
    State(state): State<AppState>,
    payload: Result<Json<CreateGroupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Group>), ServerError> {
    let new_group = json_body(payload)?.validate()?;
    let group = state.groups.create_group(new_group).await?;
    info!(group_id = group.id, topic = %group.topic, "Group created");
    Ok((StatusCode::CREATED, Json(group)))
}

async fn list_groups(
    State(state): State<AppState>,
    Query(query): Query<ListGroupsQuery>,
) -> Result<Json<Vec<Group>>, ServerError> {
    let filter = GroupFilter {
        topic: query.topic,
        search: query.search,
    };
    Ok(Json(state.groups.list_groups(filter).await?))
}

async fn get_group(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Group>, ServerError> {
    let group_id = parse_group_id(&raw)?;
    match state.groups.get_group(group_id).await {
        Ok(group) => Ok(Json(group)),
        Err(apoyo_store::StoreError::NotFound) => Err(ServerError::NotFound(format!(
            "group {group_id} does not exist"
        ))),
        Err(e) => Err(e.into()),
    }
}

async fn subscribe_ws(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let group_id = match parse_group_id(&raw) {
        Ok(id) => id,
        Err(e) => return e.into_response(),
    };
    let ws = match upgrade {
        Ok(ws) => ws,
        Err(rejection) => {
            debug!(
                group_id,
                state = ?SubscriptionState::Failed,
                error = %rejection,
                "Rejected WebSocket handshake"
            );
            return rejection.into_response();
        }
    };

    debug!(group_id, state = ?SubscriptionState::Admitting, "Admitting WebSocket subscriber");

    let registry = state.registry.clone();
    let capacity = state.config.subscriber_queue_capacity;
    let shutdown = state.shutdown.clone();

    ws.on_failed_upgrade(move |e| {
        warn!(
            group_id,
            state = ?SubscriptionState::Failed,
            error = %e,
            "WebSocket upgrade failed"
        );
    })
    .on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        subscription::run(registry, group_id, capacity, shutdown, sink, stream).await;
    })
}

/// Serve on an already bound listener until the shutdown token is cancelled.
pub async fn serve_on(listener: tokio::net::TcpListener, state: AppState) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    info!(addr = %addr, prefix = %state.config.api_prefix, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(listener, state).await
}

#[cfg(test)]
mod tests {
    use apoyo_shared::TermListFilter;
    use apoyo_store::Database;
    use axum::body::Body;
    use axum::http::Request;
    use futures::SinkExt;
    use http_body_util::BodyExt;
    use tokio::sync::mpsc;
    use tokio_tungstenite::tungstenite::Message as WsFrame;
    use tower::ServiceExt;

    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::registry::{ConnectionId, Subscriber};
    use crate::store::SqliteStore;

    fn test_state(config: ServerConfig) -> AppState {
        let store = SqliteStore::new(Database::open_in_memory().unwrap());
        let registry = SubscriberRegistry::new();
        let (broadcaster, _worker) = Broadcaster::spawn(registry.clone());
        let messages: Arc<dyn MessageStore> = Arc::new(store.clone());
        AppState {
            pipeline: IngestionPipeline::new(
                messages.clone(),
                Arc::new(TermListFilter::default()),
                broadcaster,
            ),
            messages,
            groups: Arc::new(store),
            registry,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    async fn call(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                req = req.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_post_clean_and_flagged_messages() {
        let state = test_state(ServerConfig::default());
        let (tx, mut rx) = mpsc::channel(8);
        state
            .registry
            .register(1, Subscriber::new(ConnectionId::new(), tx));
        let app = build_router(state);

        let (status, clean) = call(
            &app,
            "POST",
            "/api/messages",
            Some(serde_json::json!({ "group_id": 1, "content": "hola" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(clean["is_moderated"], false);
        assert_eq!(clean["username"], "Anónimo");

        let (status, flagged) = call(
            &app,
            "POST",
            "/api/messages",
            Some(serde_json::json!({ "group_id": 1, "content": "eres tonto" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(flagged["is_moderated"], true);

        let mut frames = Vec::new();
        for _ in 0..2 {
            let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            frames.push(serde_json::from_str::<serde_json::Value>(&frame).unwrap());
        }
        assert_eq!(frames, vec![clean, flagged]);
    }

    #[tokio::test]
    async fn test_history_matches_created_messages() {
        let app = build_router(test_state(ServerConfig::default()));

        let mut created = Vec::new();
        for content in ["primero", "segundo"] {
            let (status, body) = call(
                &app,
                "POST",
                "/api/messages",
                Some(serde_json::json!({ "group_id": 1, "username": "ana", "content": content })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            created.push(body);
        }

        let (status, history) = call(&app, "GET", "/api/groups/1/messages", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history, serde_json::Value::Array(created));

        let (_, other) = call(&app, "GET", "/api/groups/2/messages", None).await;
        assert_eq!(other, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_invalid_submissions_are_rejected() {
        let app = build_router(test_state(ServerConfig::default()));

        let (status, body) = call(
            &app,
            "POST",
            "/api/messages",
            Some(serde_json::json!({ "group_id": 1, "content": "x".repeat(501) })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid message");
        assert!(body["details"].as_str().unwrap().contains("500"));

        let (status, _) = call(
            &app,
            "POST",
            "/api/messages",
            Some(serde_json::json!({ "content": "hola" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            "POST",
            "/api/messages",
            Some(serde_json::json!({ "group_id": "uno", "content": "hola" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, history) = call(&app, "GET", "/api/groups/1/messages", None).await;
        assert_eq!(history, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_invalid_group_id_is_bad_request() {
        let app = build_router(test_state(ServerConfig::default()));
        for uri in [
            "/api/groups/abc/messages",
            "/api/groups/0/messages",
            "/api/groups/-3",
            "/api/ws/groups/abc",
        ] {
            let (status, _) = call(&app, "GET", uri, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_whitespace_content_and_username_are_kept() {
        let app = build_router(test_state(ServerConfig::default()));

        let (status, body) = call(
            &app,
            "POST",
            "/api/messages",
            Some(serde_json::json!({ "group_id": 1, "username": "  ", "content": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["content"], "   ");
        assert_eq!(body["username"], "  ");
    }

    #[tokio::test]
    async fn test_failed_admission_leaves_registry_untouched() {
        let state = test_state(ServerConfig::default());
        let app = build_router(state.clone());

        // a plain GET carries no upgrade headers
        let req = Request::builder()
            .method("GET")
            .uri("/api/ws/groups/1")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert!(resp.status().is_client_error(), "{}", resp.status());
        assert_eq!(state.registry.totals(), (0, 0));
    }

    #[tokio::test]
    async fn test_group_catalog_routes() {
        let app = build_router(test_state(ServerConfig::default()));

        let (status, body) = call(
            &app,
            "POST",
            "/api/groups",
            Some(serde_json::json!({ "name": "ab", "topic": "duelo" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid group");

        let (status, duelo) = call(
            &app,
            "POST",
            "/api/groups",
            Some(serde_json::json!({
                "name": "Duelo y pérdida",
                "description": "Acompañamiento",
                "topic": "duelo"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, ansiedad) = call(
            &app,
            "POST",
            "/api/groups",
            Some(serde_json::json!({ "name": "Ansiedad", "topic": "ansiedad" })),
        )
        .await;

        let (_, all) = call(&app, "GET", "/api/groups", None).await;
        assert_eq!(all, serde_json::json!([ansiedad.clone(), duelo.clone()]));

        let (_, by_topic) = call(&app, "GET", "/api/groups?topic=duelo", None).await;
        assert_eq!(by_topic, serde_json::json!([duelo.clone()]));

        let (_, by_search) = call(&app, "GET", "/api/groups?search=Acompa", None).await;
        assert_eq!(by_search, serde_json::json!([duelo.clone()]));

        let uri = format!("/api/groups/{}", duelo["id"]);
        let (status, fetched) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, duelo);

        let (status, _) = call(&app, "GET", "/api/groups/9999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_prefix_mounts_at_root() {
        let config = ServerConfig {
            api_prefix: String::new(),
            ..ServerConfig::default()
        };
        let app = build_router(test_state(config));

        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["subscribers"], 0);

        let (status, _) = call(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cors_allows_frontend_origin() {
        let app = build_router(test_state(ServerConfig::default()));
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/messages")
            .header("origin", "http://localhost:5173")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let headers = resp.headers();
        assert_eq!(
            headers.get("access-control-allow-origin").unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(
            headers.get("access-control-allow-credentials").unwrap(),
            "true"
        );
    }

    async fn wait_for_subscribers(registry: &SubscriberRegistry, group_id: i64, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while registry.subscriber_count(group_id) != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("subscriber count never reached");
    }

    #[tokio::test]
    async fn test_websocket_end_to_end() {
        let state = test_state(ServerConfig::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_on(listener, state.clone()));

        let (mut one, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws/groups/1"))
            .await
            .unwrap();
        let (mut two, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/ws/groups/2"))
            .await
            .unwrap();
        wait_for_subscribers(&state.registry, 1, 1).await;
        wait_for_subscribers(&state.registry, 2, 1).await;

        // client frames are ignored by the server
        one.send(WsFrame::Text("hola servidor".into())).await.unwrap();

        let saved = state
            .pipeline
            .submit(SendMessageRequest {
                group_id: 1,
                username: None,
                content: "eres tonto".into(),
            })
            .await
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), one.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let WsFrame::Text(text) = frame else {
            panic!("expected text frame, got {frame:?}");
        };
        let pushed: Message = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(pushed, saved);
        assert!(pushed.is_moderated);

        // the other group's subscriber sees nothing
        assert!(
            tokio::time::timeout(Duration::from_millis(100), two.next())
                .await
                .is_err()
        );

        // client disconnect deregisters
        one.close(None).await.unwrap();
        wait_for_subscribers(&state.registry, 1, 0).await;

        // shutdown closes the remaining subscription
        state.shutdown.cancel();
        wait_for_subscribers(&state.registry, 2, 0).await;
        let closing = tokio::time::timeout(Duration::from_secs(2), two.next())
            .await
            .unwrap();
        assert!(matches!(closing, None | Some(Ok(WsFrame::Close(_))) | Some(Err(_))));

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
