use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use eyre::eyre;
use rusqlite::Connection;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::task;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::decoder::{self, DecodeResult};
use crate::explorer;
use crate::models::{
    AccountEvent, AccountEventKind, DecodedTransaction, HolderStats, Transfer, WalletData,
};
use crate::networks::{Network, NETWORKS};
use crate::subgraph::{self, EventCollection, EventEntity, TokenData, TokenTransfer};
use crate::db;

const MAX_LIMIT: u32 = 1000;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub conn: Arc<Mutex<Connection>>,
}

#[derive(Deserialize)]
pub struct DecodeQuery {
    pub data: String,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>, // defaults to 10
}

#[derive(Deserialize)]
pub struct FirstQuery {
    pub first: Option<u32>,
}

#[derive(Serialize)]
pub struct DecodeResponse {
    pub summary: String,
    #[serde(flatten)]
    pub result: DecodeResult,
}

// ---------- errors ----------

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<eyre::Report> for ApiError {
    fn from(e: eyre::Report) -> Self {
        error!("Request failed: {:?}", e);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// `Query` that rejects with the JSON error body instead of axum's plain text.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        Ok(Self(value))
    }
}

fn clamp_limit(limit: Option<u32>, default: u32) -> u32 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

fn validate_address(address: &str) -> Result<(), ApiError> {
    explorer::parse_address(address)
        .map(|_| ())
        .map_err(|e| ApiError::bad_request(e.to_string()))
}

// ---------- DB wrapper (spawn_blocking) ----------

async fn with_db<T, F>(conn: Arc<Mutex<Connection>>, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> eyre::Result<T> + Send + 'static,
{
    let result = task::spawn_blocking(move || {
        let db = conn.lock().map_err(|_| eyre!("database mutex poisoned"))?;
        f(&db)
    })
    .await
    .map_err(|e| eyre!("database task failed: {}", e))?;
    Ok(result?)
}

// ---------- handlers ----------

async fn networks() -> Json<&'static [Network]> {
    Json(NETWORKS)
}

async fn decode(ApiQuery(q): ApiQuery<DecodeQuery>) -> Json<DecodeResponse> {
    let result = decoder::decode(&q.data);
    Json(DecodeResponse {
        summary: result.summary(),
        result,
    })
}

async fn transfers(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult<Vec<Transfer>> {
    let limit = clamp_limit(q.limit, 10);
    Ok(Json(with_db(state.conn, move |db| db::recent_transfers(db, limit)).await?))
}

async fn account_events(
    state: AppState,
    kind: AccountEventKind,
    limit: Option<u32>,
) -> ApiResult<Vec<AccountEvent>> {
    let limit = clamp_limit(limit, 10);
    Ok(Json(
        with_db(state.conn, move |db| db::recent_account_events(db, kind, limit)).await?,
    ))
}

async fn burns(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult<Vec<AccountEvent>> {
    account_events(state, AccountEventKind::Burn, q.limit).await
}

async fn freezes(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult<Vec<AccountEvent>> {
    account_events(state, AccountEventKind::Freeze, q.limit).await
}

async fn unfreezes(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult<Vec<AccountEvent>> {
    account_events(state, AccountEventKind::Unfreeze, q.limit).await
}

async fn holder(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<HolderStats> {
    validate_address(&address)?;
    let lookup = address.clone();
    with_db(state.conn, move |db| db::holder_stats(db, &lookup))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No activity recorded for {}", address)))
}

async fn wallet(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<WalletData> {
    validate_address(&address)?;
    Ok(Json(explorer::wallet_data(&state.cfg, &address).await?))
}

async fn wallet_transactions(
    State(state): State<AppState>,
    Path(address): Path<String>,
    ApiQuery(q): ApiQuery<LimitQuery>,
) -> ApiResult<Vec<DecodedTransaction>> {
    validate_address(&address)?;
    let limit = clamp_limit(q.limit, 50);
    let records = explorer::recent_transactions(&state.cfg, &address, limit).await?;
    Ok(Json(
        records
            .into_iter()
            .map(|tx| explorer::decorate(state.cfg.network, tx))
            .collect(),
    ))
}

async fn subgraph_token(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<TokenData> {
    validate_address(&address)?;
    subgraph::token_data(&state.cfg.subgraph_url, &address)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Token {} is not indexed", address)))
}

async fn subgraph_transfers(
    State(state): State<AppState>,
    Path(address): Path<String>,
    ApiQuery(q): ApiQuery<FirstQuery>,
) -> ApiResult<Vec<TokenTransfer>> {
    validate_address(&address)?;
    let first = clamp_limit(q.first, 10);
    Ok(Json(
        subgraph::token_transfers(&state.cfg.subgraph_url, &address, first).await?,
    ))
}

async fn subgraph_events(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    ApiQuery(q): ApiQuery<FirstQuery>,
) -> ApiResult<Vec<EventEntity>> {
    let collection: EventCollection = collection
        .parse()
        .map_err(|e: eyre::Report| ApiError::bad_request(e.to_string()))?;
    let first = clamp_limit(q.first, 10);
    Ok(Json(
        subgraph::recent_events(&state.cfg.subgraph_url, collection, first).await?,
    ))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(|| async { "BNB scope API running" }))
        .route("/networks", get(networks))
        .route("/decode", get(decode))
        .route("/transfers", get(transfers))
        .route("/burns", get(burns))
        .route("/freezes", get(freezes))
        .route("/unfreezes", get(unfreezes))
        .route("/holders/:address", get(holder))
        .route("/wallet/:address", get(wallet))
        .route("/wallet/:address/transactions", get(wallet_transactions))
        .route("/subgraph/token/:address", get(subgraph_token))
        .route("/subgraph/transfers/:address", get(subgraph_transfers))
        .route("/subgraph/events/:collection", get(subgraph_events))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(cfg: Config, conn: Arc<Mutex<Connection>>) -> eyre::Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], cfg.port));
    let app = router(AppState {
        cfg: Arc::new(cfg),
        conn,
    });

    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
