#![cfg(feature = "web")]
//! HTTP surface: shared state, routing and the change feed

use axum::{
    Extension, Json, Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
    routing::{get, post, put},
};
use chrono::Utc;
use log::{info, warn};
use reqwest::Client;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::{
    Stream, StreamExt,
    wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api;
use crate::config::Config;
use crate::error::{NackError, Result};
use crate::geocoding::Geocoder;
use crate::images::ImageHost;
use crate::login::{CurrentUser, require_auth};
use crate::mailer::Mailer;
use crate::models::Profile;
use crate::notifications::PushDispatcher;
use crate::payment::PaymentGateway;
use crate::store::Store;
use crate::subscription::derive_plan;

/// Everything the handlers share
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Config,
    pub gateway: PaymentGateway,
    pub images: ImageHost,
    pub geocoder: Geocoder,
    pub push: PushDispatcher,
    /// `None` when no SMTP relay is configured
    pub mailer: Option<Mailer>,
}

impl AppState {
    pub fn new(store: Arc<Store>, config: Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        let mailer = if config.smtp.is_configured() {
            Some(Mailer::new(&config.smtp)?)
        } else {
            warn!("SMTP is not configured, password reset codes will not be mailed");
            None
        };

        Ok(Self {
            gateway: PaymentGateway::new(client.clone(), config.gateway.clone()),
            images: ImageHost::new(client.clone(), config.images.clone()),
            geocoder: Geocoder::new(client.clone(), config.geocoding.clone()),
            push: PushDispatcher::new(client, config.push.clone()),
            mailer,
            store,
            config,
        })
    }
}

pub type SharedState = Arc<AppState>;

/// Refuse routes that create business data once the plan has expired (402)
async fn require_plan(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Response {
    let usable = state
        .store
        .get::<Profile>(&user.establishment_id, &user.establishment_id)
        .map(|p| derive_plan(p.trial_ends_at, p.subscription_ends_at, Utc::now()).is_usable());

    match usable {
        Some(true) => next.run(request).await,
        Some(false) => NackError::SubscriptionExpired.into_response(),
        None => NackError::NotFound("Profile").into_response(),
    }
}

/// Refuse admin routes to accounts missing from `admins` (403)
async fn require_admin(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Response {
    if user.is_owner() && crate::admin::is_admin(&state.store, &user.establishment_id) {
        next.run(request).await
    } else {
        NackError::Forbidden.into_response()
    }
}

/// Server-sent change notifications for the caller's establishment
///
/// A listener that falls behind receives a `lagged` event and should re-fetch.
async fn stream_changes(
    State(state): State<SharedState>,
    Extension(user): Extension<CurrentUser>,
) -> Sse<impl Stream<Item = std::result::Result<SseEvent, Infallible>>> {
    let establishment_id = user.establishment_id;
    let changes = BroadcastStream::new(state.store.subscribe()).filter_map(move |change| {
        match change {
            Ok(change) if change.establishment_id == establishment_id => SseEvent::default()
                .event(change.collection.name())
                .json_data(&change)
                .ok()
                .map(Ok),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(missed)) => Some(Ok(SseEvent::default()
                .event("lagged")
                .data(missed.to_string()))),
        }
    });

    Sse::new(changes).keep_alive(KeepAlive::default())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "nack" }))
}

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/api/auth/signup", post(api::account::signup))
        .route("/api/auth/login", post(api::account::login))
        .route("/api/auth/staff-login", post(api::account::staff_login))
        .route("/api/auth/password-reset", post(api::account::request_reset))
        .route("/api/auth/password-reset/confirm", post(api::account::confirm_reset))
        .route("/menu/:establishment_id", get(api::public::menu_page))
        .route("/api/public/menu/:establishment_id", get(api::public::menu_json))
        .route("/api/public/events/:establishment_id", get(api::public::list_events))
        .route(
            "/api/public/events/:establishment_id/:event_id/tickets",
            post(api::public::buy_ticket),
        )
        .route("/tickets/:establishment_id/:ticket_id", get(api::public::ticket_page))
        .route("/api/payments/callback", post(api::public::payment_callback));

    // Signed-in routes that stay open once the plan has expired
    let account = Router::new()
        .route("/api/auth/logout", post(api::account::logout))
        .route("/api/auth/password", post(api::account::change_password))
        .route("/api/me", get(api::account::me))
        .route("/api/profile", put(api::account::update_profile))
        .route("/api/profile/logo", post(api::account::upload_logo))
        .route("/api/subscription", get(api::account::subscription))
        .route("/api/subscription/checkout", post(api::account::checkout))
        .route("/api/tutorial", get(api::account::tutorial))
        .route("/api/tutorial/complete", post(api::account::complete_tutorial_step))
        .route("/api/tutorial/skip", post(api::account::skip_tutorial))
        .route(
            "/api/push-tokens",
            post(api::account::register_push_token).delete(api::account::unregister_push_token),
        )
        .route("/api/stream", get(stream_changes))
        .route("/api/places/search", get(api::places::search))
        .route("/api/places/reverse", get(api::places::reverse))
        .route("/api/places/autocomplete", get(api::places::autocomplete))
        .route_layer(middleware::from_fn(require_auth));

    let business = Router::new()
        .route("/api/products", get(api::catalogue::list_products))
        .route("/api/products/low-stock", get(api::catalogue::low_stock))
        .route(
            "/api/products/:id",
            get(api::catalogue::get_product)
                .put(api::catalogue::update_product)
                .delete(api::catalogue::delete_product),
        )
        .route("/api/products/:id/restock", post(api::catalogue::restock))
        .route("/api/products/:id/margin", get(api::catalogue::margin))
        .route("/api/products/:id/image", post(api::catalogue::upload_image))
        .route(
            "/api/tables",
            get(api::catalogue::list_tables).post(api::catalogue::create_table),
        )
        .route(
            "/api/tables/:id",
            put(api::catalogue::update_table).delete(api::catalogue::delete_table),
        )
        .route("/api/orders", get(api::sales::list_orders))
        .route("/api/orders/:id", get(api::sales::get_order))
        .route("/api/orders/:id/status", post(api::sales::update_status))
        .route("/api/orders/:id/receipt", get(api::sales::receipt))
        .route(
            "/api/customers",
            get(api::sales::list_customers).post(api::sales::create_customer),
        )
        .route("/api/customers/:id", get(api::sales::get_customer))
        .route("/api/customers/:id/redeem", post(api::sales::redeem))
        .route("/api/events", get(api::events::list_events))
        .route("/api/events/:id", put(api::events::update_event))
        .route("/api/events/:id/tickets", get(api::events::list_tickets))
        .route("/api/tickets/check-in", post(api::events::check_in))
        .route("/api/tickets/:id/cancel", post(api::events::cancel_ticket))
        .route("/api/tickets/:id/qr.png", get(api::events::ticket_qr))
        .route("/api/team", get(api::team::list).post(api::team::add))
        .route("/api/team/:id/status", post(api::team::set_status))
        .route("/api/team/:id/role", post(api::team::set_role))
        .route("/api/team/:id/code", post(api::team::regenerate_code))
        .route("/api/reports/summary", get(api::reports::summary))
        .route("/api/reports/orders.csv", get(api::reports::orders_csv))
        .route("/api/reports/orders.xlsx", get(api::reports::orders_xlsx))
        .route("/api/reports/revenue.png", get(api::reports::revenue_chart))
        .route("/api/backup", get(api::reports::backup))
        .route_layer(middleware::from_fn(require_auth));

    // Creating business data needs a usable plan; reads and exports stay open
    let selling = Router::new()
        .route("/api/products", post(api::catalogue::create_product))
        .route("/api/orders", post(api::sales::create_order))
        .route("/api/events", post(api::events::create_event))
        .route("/api/tickets/:id/paid", post(api::events::mark_paid))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_plan))
        .route_layer(middleware::from_fn(require_auth));

    let admin = Router::new()
        .route("/api/admin/establishments", get(api::admin::list_establishments))
        .route(
            "/api/admin/establishments/:key/extend",
            post(api::admin::extend_subscription),
        )
        .route("/api/admin/admins", post(api::admin::promote))
        .route("/api/admin/backfill", post(api::admin::backfill))
        .route("/api/admin/expire-plans", post(api::admin::expire_plans))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route_layer(middleware::from_fn(require_auth));

    Router::new()
        .merge(public)
        .merge(account)
        .merge(business)
        .merge(selling)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Open the store and serve until the process is stopped
pub async fn run(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(Store::open(&config.data_dir)?);
    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(store, config)?);

    let app = router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    let port = listener.local_addr()?.port();
    info!("Listening on http://{}", bind_addr);
    match local_ip_address::local_ip() {
        Ok(ip) => info!("Reachable on the local network at http://{}:{}", ip, port),
        Err(e) => warn!("Could not determine the local network address: {}", e),
    }

    axum::serve(listener, app).await?;
    Ok(())
}
