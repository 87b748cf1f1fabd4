use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{
    ApiApplyRequest, ApiApplyResponse, ApiEnhanceRequest, ApiEnhanceResponse,
    ApiReadabilityRequest, ApiReadabilityResponse, ApiTagsResponse,
};
use techblog_ai::config::AppConfig;
use techblog_ai::coordinator::{FeatureEvent, ProgressSink};
use techblog_ai::llm::LlmClient;
use techblog_ai::store::JsonTagStore;
use techblog_ai::{
    default_score, filter_confident, invalid_confidence, AiCoordinator, CategoryApplier,
    FeatureOutcome, LlmFeatureInvoker,
};

type Channels = Arc<Mutex<HashMap<String, broadcast::Sender<StreamEvent>>>>;

#[derive(Clone)]
struct AppState {
    invoker: Option<Arc<LlmFeatureInvoker<LlmClient>>>,
    coordinator: Option<AiCoordinator>,
    applier: CategoryApplier,
    store: Arc<JsonTagStore>,
    threshold: f64,
    max_categories: usize,
    channels: Channels,
}

#[derive(Clone, Serialize)]
struct StreamEvent {
    event: String,
    message: String,
    timestamp_ms: u128,
}

#[derive(serde::Deserialize)]
struct StreamQuery {
    request_id: String,
}

/// Forwards coordinator progress to a request's SSE channel.
struct ChannelProgress {
    sender: broadcast::Sender<StreamEvent>,
}

impl ProgressSink for ChannelProgress {
    fn on_event(&self, event: FeatureEvent) {
        let name = format!("{}:{}", event.feature.label(), event.stage.label());
        send_event(&self.sender, &name, &event.message);
    }
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub async fn serve(args: crate::ServeArgs, config: AppConfig) -> Result<(), String> {
    let store = Arc::new(
        JsonTagStore::load(config.store.path.clone())
            .await
            .map_err(|err| format!("failed to open tag store: {:#}", err))?,
    );
    let invoker = LlmClient::from_config(&config.ai)?.map(|client| {
        Arc::new(LlmFeatureInvoker::new(
            client,
            config.categories.catalog.clone(),
        ))
    });
    if invoker.is_none() {
        info!("AI_API_KEY not set, AI endpoints will report unavailable");
    }

    let state = AppState {
        coordinator: invoker.clone().map(|invoker| AiCoordinator::new(invoker)),
        invoker,
        applier: CategoryApplier::new(store.clone()),
        store,
        threshold: config.categories.confidence_threshold,
        max_categories: config.categories.max_recommendations,
        channels: Arc::new(Mutex::new(HashMap::new())),
    };

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/ai/enhance", post(enhance_handler))
        .route("/api/ai/stream", get(stream_handler))
        .route("/api/ai/readability", post(readability_handler))
        .route(
            "/api/posts/:post_id/categories",
            get(tags_handler).post(apply_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|err| format!("invalid bind address: {}", err))?;
    info!(%addr, "listening");

    axum::serve(
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| format!("failed to bind server: {}", err))?,
        app,
    )
    .await
    .map_err(|err| format!("server error: {}", err))?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

async fn enhance_handler(
    State(state): State<AppState>,
    Json(request): Json<ApiEnhanceRequest>,
) -> Result<Json<ApiEnhanceResponse>, (StatusCode, String)> {
    let request_id = request
        .request_id
        .clone()
        .unwrap_or_else(generate_request_id);
    let (mut feature_request, flags, apply) = request
        .into_parts()
        .map_err(|err| (StatusCode::BAD_REQUEST, err))?;
    feature_request
        .options
        .default_max_categories(state.max_categories);
    let coordinator = state.coordinator.as_ref().ok_or_else(not_configured)?;

    let sender = get_or_create_channel(&state.channels, &request_id).await;
    send_event(&sender, "start", "Dispatching AI features");

    let progress = Arc::new(ChannelProgress {
        sender: sender.clone(),
    });
    let result = coordinator
        .process_with(feature_request, flags, progress)
        .await;

    let mut warnings = Vec::new();
    for feature in result.failed_features() {
        warnings.push(format!("{} failed", feature.label()));
    }

    let categories_applied = match (apply, &result.categories) {
        (Some(target), Some(FeatureOutcome::Success(suggestions))) => {
            send_event(&sender, "apply", "Applying confident categories");
            let threshold = target.threshold.unwrap_or(state.threshold);
            let applied = state
                .applier
                .apply_if_confident(&target.post_id, &suggestions.recommendations, threshold)
                .await;
            if !applied {
                warnings.push("category tags could not be saved".to_string());
            }
            Some(applied)
        }
        (Some(_), _) => {
            warnings.push("categories unavailable, nothing applied".to_string());
            Some(false)
        }
        (None, _) => None,
    };

    send_event(&sender, "done", "Enhancement complete");
    schedule_cleanup(state.channels.clone(), request_id.clone());

    Ok(Json(ApiEnhanceResponse {
        request_id,
        result,
        categories_applied,
        warnings,
    }))
}

async fn readability_handler(
    State(state): State<AppState>,
    Json(request): Json<ApiReadabilityRequest>,
) -> Result<Json<ApiReadabilityResponse>, (StatusCode, String)> {
    let (content, content_type) = request
        .into_input()
        .map_err(|err| (StatusCode::BAD_REQUEST, err))?;
    let invoker = state.invoker.as_ref().ok_or_else(not_configured)?;

    let score = invoker
        .readability(&content, content_type)
        .await
        .map_err(|err| (StatusCode::BAD_GATEWAY, err.to_string()))?;
    let fallback = score.is_none();
    Ok(Json(ApiReadabilityResponse {
        score: score.unwrap_or_else(default_score),
        fallback,
    }))
}

async fn apply_handler(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
    Json(request): Json<ApiApplyRequest>,
) -> Result<Json<ApiApplyResponse>, (StatusCode, String)> {
    let threshold = request.threshold.unwrap_or(state.threshold);
    if !(0.0..=1.0).contains(&threshold) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("threshold must be within 0..1: {}", threshold),
        ));
    }
    if let Some(rec) = invalid_confidence(&request.recommendations) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "confidence must be within 0..1: {} for {}",
                rec.confidence, rec.category_id
            ),
        ));
    }
    let success = state
        .applier
        .apply_if_confident(&post_id, &request.recommendations, threshold)
        .await;
    let applied = if success {
        filter_confident(&request.recommendations, threshold)
    } else {
        Vec::new()
    };
    Ok(Json(ApiApplyResponse { success, applied }))
}

async fn tags_handler(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Json<ApiTagsResponse> {
    let tags = state.store.tags_for(&post_id).await;
    Json(ApiTagsResponse { post_id, tags })
}

async fn stream_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>, StatusCode>
{
    let sender = get_or_create_channel(&state.channels, &query.request_id).await;
    let receiver = sender.subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|event| match event {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data)))
        }
        Err(_) => None,
    });

    send_event(&sender, "connected", "Streaming AI progress");
    schedule_cleanup(state.channels.clone(), query.request_id);
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(8))))
}

fn not_configured() -> (StatusCode, String) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "AI not configured: set AI_API_KEY".to_string(),
    )
}

async fn get_or_create_channel(
    channels: &Channels,
    request_id: &str,
) -> broadcast::Sender<StreamEvent> {
    let mut guard = channels.lock().await;
    if let Some(sender) = guard.get(request_id) {
        return sender.clone();
    }
    let (sender, _) = broadcast::channel(32);
    guard.insert(request_id.to_string(), sender.clone());
    sender
}

fn send_event(sender: &broadcast::Sender<StreamEvent>, event: &str, message: &str) {
    let _ = sender.send(StreamEvent {
        event: event.to_string(),
        message: message.to_string(),
        timestamp_ms: now_ms(),
    });
}

fn schedule_cleanup(channels: Channels, request_id: String) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        let mut guard = channels.lock().await;
        guard.remove(&request_id);
    });
}

fn generate_request_id() -> String {
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("req-{}-{}", now_ms(), counter)
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0)
}
