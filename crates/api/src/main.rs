use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spike_core::analysis::{self, Collaborators, DetailOptions, StockDetail};
use spike_core::domain::market::{MarketPulse, MovementRecord};
use spike_core::llm::TextGenerator;
use spike_core::movers;
use spike_core::news::GoogleNewsRss;
use spike_core::prices::YahooChartProvider;
use spike_core::sentiment::HfInferenceModel;
use spike_core::session::{MoversSnapshot, Selection, SelectionEvent, Session};
use spike_core::universe;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;

use error::ApiError;

const DEFAULT_WINDOW_DAYS: u32 = 7;
const DEFAULT_TOP_N: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = spike_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let generator: Option<Arc<dyn TextGenerator>> =
        spike_core::llm::from_settings(&settings)?.map(Arc::from);
    match &generator {
        Some(g) => tracing::info!(provider = %g.provider(), "narratives enabled"),
        None => tracing::warn!("no LLM API key configured; explanations use the template"),
    }

    let state = AppState {
        session: Arc::new(Mutex::new(Session::new())),
        prices: Arc::new(YahooChartProvider::from_settings(&settings)?),
        feed: Arc::new(GoogleNewsRss::from_env()?),
        sentiment: Arc::new(HfInferenceModel::from_settings(&settings)?),
        generator,
        tickers: Arc::new(universe::tickers()),
        detail: DetailOptions::from_env(),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/movers", get(get_movers))
        .route("/movers/refresh", post(refresh_movers))
        .route("/selection", post(post_selection))
        .route("/stocks/:ticker", get(get_stock))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

/// One dashboard session shared by every request.
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
    prices: Arc<YahooChartProvider>,
    feed: Arc<GoogleNewsRss>,
    sentiment: Arc<HfInferenceModel>,
    generator: Option<Arc<dyn TextGenerator>>,
    tickers: Arc<Vec<String>>,
    detail: DetailOptions,
}

#[derive(Debug, Default, Deserialize)]
struct RefreshRequest {
    days: Option<u32>,
    top_n: Option<usize>,
}

#[derive(Debug, Serialize)]
struct MoverEntry {
    ticker: String,
    symbol: String,
    company: String,
    change_pct: f64,
    change: String,
    label: String,
}

impl From<&MovementRecord> for MoverEntry {
    fn from(r: &MovementRecord) -> Self {
        Self {
            ticker: r.ticker.clone(),
            symbol: universe::display_symbol(&r.ticker).to_string(),
            company: universe::company_name(&r.ticker).to_string(),
            change_pct: r.change_pct,
            change: movers::format_change(r.change_pct),
            label: movers::mover_label(r),
        }
    }
}

#[derive(Debug, Serialize)]
struct MoversView {
    window_days: u32,
    refreshed_at: DateTime<Utc>,
    pulse: Option<MarketPulse>,
    gainers: Vec<MoverEntry>,
    losers: Vec<MoverEntry>,
    selection: Selection,
}

impl MoversView {
    fn new(snapshot: &MoversSnapshot, selection: &Selection) -> Self {
        let report = &snapshot.report;
        Self {
            window_days: report.window_days,
            refreshed_at: snapshot.refreshed_at,
            pulse: movers::market_pulse(report),
            gainers: report.gainers.iter().map(MoverEntry::from).collect(),
            losers: report.losers.iter().map(MoverEntry::from).collect(),
            selection: selection.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SelectionView {
    selection: Selection,
    /// Ticker the detail panel should show, if it belongs to the current snapshot.
    detail: Option<String>,
}

async fn get_movers(State(state): State<AppState>) -> Result<Json<MoversView>, ApiError> {
    let session = state.session.lock().await;
    let snapshot = session.snapshot().ok_or_else(|| {
        ApiError::Unavailable("movers have not been computed yet. POST /movers/refresh first.".into())
    })?;
    Ok(Json(MoversView::new(snapshot, session.selection())))
}

async fn refresh_movers(
    State(state): State<AppState>,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<MoversView>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let days = req.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    let top_n = req.top_n.unwrap_or(DEFAULT_TOP_N);

    let mut session = state.session.lock().await;
    let result = analysis::refresh_movers(
        &mut session,
        state.prices.as_ref(),
        &state.tickers,
        days,
        top_n,
    )
    .await;

    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!(days, top_n, error = %e, "movers refresh failed");
            return Err(e.into());
        }
    };
    let view = MoversView::new(snapshot, &Selection::default());
    Ok(Json(view))
}

async fn post_selection(
    State(state): State<AppState>,
    Json(event): Json<SelectionEvent>,
) -> Json<SelectionView> {
    let mut session = state.session.lock().await;
    let selection = session.dispatch(event).clone();
    let detail = session.detail_choice().map(str::to_string);
    Json(SelectionView { selection, detail })
}

async fn get_stock(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<StockDetail>, ApiError> {
    let ticker = universe::resolve(&ticker)
        .ok_or_else(|| ApiError::NotFound(format!("{ticker} is not a NIFTY 100 constituent")))?;

    let deps = Collaborators {
        prices: state.prices.as_ref(),
        feed: state.feed.as_ref(),
        sentiment: state.sentiment.as_ref(),
        generator: state.generator.as_deref(),
    };

    // The lock covers the snapshot lookup and price cache only; news, scoring and
    // generation run unlocked.
    let priced = {
        let mut session = state.session.lock().await;
        analysis::price_stock(&mut session, deps.prices, ticker).await?
    };
    let detail = analysis::explain_stock(priced, deps, &state.detail).await;
    tracing::info!(
        %ticker,
        headlines = detail.headlines.len(),
        selected = detail.selected.is_some(),
        "stock detail served"
    );
    Ok(Json(detail))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &spike_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
