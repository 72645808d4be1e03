use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{delete, get, post},
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::activity::{NewActivity, ValidationError};
use crate::cache::TtlCache;
use crate::company::{DuplicateReport, DuplicateStatus, check_duplicate, clean_company_name};
use crate::config::Config;
use crate::error::AppError;
use crate::photos::{HttpPhotoFetcher, NoPhotoFetcher, PhotoFetcher};
use crate::quotation::{CONTENT_TYPE, QuotationBuilder, QuotationRequest};
use crate::realtime::ChangeFeed;
use crate::store::{ActivityStore, MemoryStore, NewAccount, StoredActivity};

const HISTORY_KEY_PREFIX: &str = "history:";
const HISTORY_LOOKUP_PREFIX: &str = "history:activity_ref_nums:";

pub struct AppState {
    pub store: Arc<dyn ActivityStore>,
    pub cache: TtlCache<Value>,
    pub builder: QuotationBuilder,
    pub history_feed: ChangeFeed<StoredActivity>,
}

impl AppState {
    /// State backed by the in-memory store.
    pub fn new(config: &Config, fetcher: Arc<dyn PhotoFetcher>) -> Self {
        let history_feed = ChangeFeed::new(config.feed_capacity);
        Self {
            store: Arc::new(MemoryStore::new(history_feed.clone())),
            cache: TtlCache::new(config.cache_ttl()),
            builder: QuotationBuilder::new(fetcher, config.photo_options()),
            history_feed,
        }
    }
}

#[derive(Serialize)]
struct SaveResponse {
    success: bool,
    data: Value,
    cached: bool,
}

#[derive(Serialize)]
struct HistoryResponse {
    data: Value,
    cached: bool,
}

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    activity_reference_numbers: Vec<String>,
}

#[derive(Deserialize)]
struct StreamQuery {
    referenceid: String,
}

#[derive(Deserialize)]
struct DuplicateQuery {
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    referenceid: String,
}

/// Build the router over the given state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/quotation", post(create_quotation))
        .route("/api/activities", post(save_activity))
        .route("/api/activities/history", get(activity_history))
        .route("/api/activities/stream", get(activity_stream))
        .route("/api/activities/:id", delete(delete_activity))
        .route("/api/accounts", post(create_account))
        .route("/api/accounts/check-duplicate", get(check_duplicate_account))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let fetcher: Arc<dyn PhotoFetcher> = if config.skip_photos {
        Arc::new(NoPhotoFetcher)
    } else {
        Arc::new(HttpPhotoFetcher::new(config.photo_timeout())?)
    };

    let state = Arc::new(AppState::new(&config, fetcher));
    let app = router(state);

    // Start server
    let listener = TcpListener::bind(&config.bind).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn create_quotation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuotationRequest>,
) -> Result<Response, AppError> {
    let document = state.builder.render(&request).await?;

    let response = (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", document.filename),
            ),
        ],
        Body::from(document.bytes),
    );
    Ok(response.into_response())
}

async fn save_activity(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewActivity>,
) -> Result<Json<SaveResponse>, AppError> {
    let record = payload.validate()?;

    let cache_key = format!("{}{}", HISTORY_KEY_PREFIX, record.activity_reference_number);
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(SaveResponse {
            success: true,
            data: cached,
            cached: true,
        }));
    }

    let stored = state.store.insert_history(record).await?;
    log::info!(
        "Stored activity {} as history row {}",
        stored.record.activity_reference_number,
        stored.id
    );

    let data = json!([stored]);
    state.cache.set(cache_key, data.clone());
    state.cache.invalidate_prefix(HISTORY_LOOKUP_PREFIX);

    Ok(Json(SaveResponse {
        success: true,
        data,
        cached: false,
    }))
}

async fn activity_history(
    State(state): State<Arc<AppState>>,
    axum_extra::extract::Query(query): axum_extra::extract::Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let references: Vec<String> = query
        .activity_reference_numbers
        .into_iter()
        .filter(|r| !r.trim().is_empty())
        .collect();
    if references.is_empty() {
        return Err(ValidationError::MissingField("activity_reference_numbers").into());
    }

    let cache_key = format!("{}{}", HISTORY_LOOKUP_PREFIX, references.join(","));
    if let Some(cached) = state.cache.get(&cache_key) {
        return Ok(Json(HistoryResponse {
            data: cached,
            cached: true,
        }));
    }

    let rows = state.store.history_by_reference(&references).await?;
    let data = json!(rows);
    state.cache.set(cache_key, data.clone());

    Ok(Json(HistoryResponse { data, cached: false }))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, AppError> {
    let removed = state.store.delete_history(id).await?;
    state
        .cache
        .remove(&format!("{}{}", HISTORY_KEY_PREFIX, removed.record.activity_reference_number));
    state.cache.invalidate_prefix(HISTORY_LOOKUP_PREFIX);

    Ok(Json(json!({ "success": true, "data": removed })))
}

/// Server-sent change events for one owner, in the same shape as the database feed
async fn activity_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = state.history_feed.subscribe(query.referenceid);
    log::info!("Change stream opened for {}", subscription.owner());

    let events = stream::unfold(subscription, |mut subscription| async move {
        let change = subscription.recv().await?;
        let event = Event::default().event(change.kind()).json_data(change.to_payload());
        Some((event, subscription))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn check_duplicate_account(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DuplicateQuery>,
) -> Result<Json<DuplicateReport>, AppError> {
    let accounts = state.store.list_accounts().await?;
    Ok(Json(check_duplicate(&query.company_name, &query.referenceid, &accounts)))
}

async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(account): Json<NewAccount>,
) -> Result<impl IntoResponse, AppError> {
    if account.owner_referenceid.trim().is_empty() {
        return Err(ValidationError::MissingField("owner_referenceid").into());
    }

    let accounts = state.store.list_accounts().await?;
    let report = check_duplicate(&account.company_name, &account.owner_referenceid, &accounts);
    match report.status {
        DuplicateStatus::Invalid | DuplicateStatus::OwnedByOther => {
            return Err(ValidationError::Rejected(report.message).into());
        }
        DuplicateStatus::OwnedByYou | DuplicateStatus::Clear => {}
    }

    let stored = state
        .store
        .insert_account(NewAccount {
            company_name: clean_company_name(&account.company_name),
            owner_referenceid: account.owner_referenceid,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}
