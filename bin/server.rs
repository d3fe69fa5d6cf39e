// Dairy Ledger - Web Server
// JSON API over the ledger store with Axum

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Local;
use dairy_ledger::{
    calculate_billing, grand_total, list_customers, list_entries, list_products, record_entry,
    telemetry, AppConfig, Customer, CustomerBill, Dashboard, EntryFilter, EntryView, LedgerError,
    NewEntry, Product, Store,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Store,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Error half of every handler: a status plus a message
struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::Validation { .. } => StatusCode::BAD_REQUEST,
            LedgerError::Reference { .. } => StatusCode::NOT_FOUND,
            LedgerError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, "request failed");
        }
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::failure(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Run a store operation off the async runtime
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&Store) -> dairy_ledger::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || op(&store)).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(join_err) => {
            error!(error = %join_err, "store task failed");
            Err(ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "internal error".to_string(),
            })
        }
    }
}

#[derive(Serialize)]
struct BillingResponse {
    month: String,
    bills: Vec<CustomerBill>,
    grand_total: f64,
}

#[derive(Serialize)]
struct CreatedResponse {
    id: i64,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/customers - All customers by name
async fn get_customers(State(state): State<AppState>) -> ApiResult<Vec<Customer>> {
    let customers = with_store(&state, |store| store.read(list_customers)).await?;
    Ok(Json(ApiResponse::ok(customers)))
}

/// GET /api/products - Product catalog
async fn get_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    let products = with_store(&state, |store| store.read(list_products)).await?;
    Ok(Json(ApiResponse::ok(products)))
}

/// GET /api/entries?from=&to=&customer_id= - Ledger entries
async fn get_entries(
    State(state): State<AppState>,
    Query(filter): Query<EntryFilter>,
) -> ApiResult<Vec<EntryView>> {
    let entries = with_store(&state, move |store| {
        store.read(|conn| list_entries(conn, &filter))
    })
    .await?;
    Ok(Json(ApiResponse::ok(entries)))
}

/// POST /api/entries - Record one delivery
async fn post_entry(
    State(state): State<AppState>,
    Json(entry): Json<NewEntry>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedResponse>>), ApiError> {
    let id = with_store(&state, move |store| {
        store.transact(|conn| record_entry(conn, &entry))
    })
    .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(CreatedResponse { id }))))
}

/// GET /api/billing/:month - Monthly totals per customer
async fn get_billing(
    State(state): State<AppState>,
    Path(month): Path<String>,
) -> ApiResult<BillingResponse> {
    let query = month.clone();
    let bills = with_store(&state, move |store| {
        store.read(|conn| calculate_billing(conn, &query))
    })
    .await?;

    let grand_total = grand_total(&bills);
    Ok(Json(ApiResponse::ok(BillingResponse {
        month,
        bills,
        grand_total,
    })))
}

/// GET /api/dashboard - Headline numbers for today
async fn get_dashboard(State(state): State<AppState>) -> ApiResult<Dashboard> {
    let today = Local::now().date_naive();
    let dashboard = with_store(&state, move |store| {
        store.read(|conn| Dashboard::collect(conn, today))
    })
    .await?;
    Ok(Json(ApiResponse::ok(dashboard)))
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/customers", get(get_customers))
        .route("/products", get(get_products))
        .route("/entries", get(get_entries).post(post_entry))
        .route("/billing/:month", get(get_billing))
        .route("/dashboard", get(get_dashboard))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to read DAIRY_* configuration")?;
    telemetry::init(&config.log_level);

    let store = Store::open(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
    info!(path = %config.db_path.display(), "database opened");

    let app = router(AppState { store });

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;

    info!(addr = %config.server_addr, "server listening");
    println!("\n🚀 Server running on http://{}", config.server_addr);
    println!("   API: http://{}/api/billing/<YYYY-MM>", config.server_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server stopped")?;
    Ok(())
}
