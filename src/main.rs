// Climate Dashboard view service v0.1
use axum::routing::{get, post, put};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod helpers;
mod metrics;
mod models;
mod routes;
mod services;

use config::AppConfig;
use routes::AppState;
use services::animation::{run_player, Player};
use services::climate_api::ClimateApiClient;
use services::queries::DashboardQueries;
use services::selection::SelectionStore;

/// OpenAPI document for the dashboard view service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Climate Dashboard",
        version = "0.1.0",
        description = "View service for the climate and mortality dashboard. \
            Holds the dashboard selection, reads the climate API through a \
            deduplicating cache, and serves render-ready choropleth, chart, \
            relative-risk and life-table views to a thin renderer.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health and cache reload"),
        (name = "Selection", description = "Selected region, metric and period"),
        (name = "Map", description = "Choropleth view and map interactions"),
        (name = "Regions", description = "Region detail panel"),
        (name = "Risk", description = "Exposure-response curves and coefficients"),
        (name = "Life Table", description = "Illustrative life table and portfolio impact"),
        (name = "Playback", description = "Week-by-week animation"),
        (name = "Metrics", description = "Metric catalogue"),
    ),
    paths(
        routes::health::health_check,
        routes::health::reload,
        routes::selection::get_selection,
        routes::selection::update_selection,
        routes::selection::reset_region,
        routes::map::get_map,
        routes::map::update_map_view,
        routes::map::click_region,
        routes::map::hover_region,
        routes::regions::get_region_detail,
        routes::regions::get_region_cities,
        routes::risk::get_risk_curve,
        routes::risk::get_coefficients,
        routes::risk::get_all_cities,
        routes::life_table::get_life_table,
        routes::playback::get_playback,
        routes::playback::play,
        routes::playback::pause,
        routes::metrics::list_metrics,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            services::selection::Selection,
            services::selection::MapCenter,
            routes::selection::SelectionUpdate,
            routes::map::MapView,
            routes::map::ChoroplethView,
            routes::map::MapViewUpdate,
            routes::map::RegionPointer,
            services::choropleth::Legend,
            services::choropleth::ColorStop,
            services::choropleth::RegionFeature,
            services::choropleth::RegionLevel,
            services::choropleth::FillValue,
            routes::regions::RegionDetail,
            services::charts::TimeSeriesChart,
            services::charts::ChartSeries,
            services::charts::TimeSeriesRow,
            services::charts::AxisSide,
            services::charts::ScatterPlot,
            services::charts::ScatterPoint,
            services::charts::RegionSummary,
            services::charts::MetricAverage,
            services::charts::CityPicker,
            services::charts::RelativeRiskChart,
            services::charts::RiskSeries,
            services::charts::AxisMode,
            services::charts::AxisTick,
            services::charts::ReferenceLine,
            services::charts::LineOrientation,
            services::charts::MmtInfo,
            services::charts::ExtremeRrInfo,
            services::charts::HoverReadout,
            services::percentile::PercentileTick,
            models::City,
            models::CurvePoint,
            models::MetricRange,
            models::BSplineCoefficient,
            routes::life_table::LifeTableView,
            services::life_table::Scenario,
            services::life_table::LifeTableRow,
            services::life_table::LifeTableCell,
            services::life_table::CellTrend,
            services::life_table::FinancialImpact,
            services::animation::PlaybackState,
            routes::metrics::MetricCatalogue,
            metrics::MetricConfig,
            metrics::DateRange,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "climate_dashboard=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    if config.map_token.is_none() {
        tracing::warn!("MAPBOX_TOKEN is not set; the map view will be unavailable");
    }
    // Shared query layer and selection
    let client = ClimateApiClient::new(&config.api_base_url);
    tracing::info!("Using climate API at {}", client.base_url());
    let queries = Arc::new(DashboardQueries::new(client));
    let selection = Arc::new(SelectionStore::new());

    let app_state = AppState {
        queries: queries.clone(),
        selection: selection.clone(),
        hovered: Arc::new(RwLock::new(None)),
        map_token: config.map_token.clone(),
    };

    // Spawn the playback scheduler
    let player = Player::new(selection, queries, config.playback_interval_ms);
    tokio::spawn(run_player(player.clone()));

    // CORS: the renderer reads views and writes selection state
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::PUT,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers(Any);

    // Build router
    // View routes share AppState; playback routes use the Player handle.
    let view_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/reload", post(routes::health::reload))
        .route(
            "/api/v1/selection",
            get(routes::selection::get_selection).put(routes::selection::update_selection),
        )
        .route(
            "/api/v1/selection/region",
            axum::routing::delete(routes::selection::reset_region),
        )
        .route("/api/v1/map", get(routes::map::get_map))
        .route("/api/v1/map/view", put(routes::map::update_map_view))
        .route("/api/v1/map/click", post(routes::map::click_region))
        .route("/api/v1/map/hover", post(routes::map::hover_region))
        .route(
            "/api/v1/regions/:nuts_id/detail",
            get(routes::regions::get_region_detail),
        )
        .route(
            "/api/v1/regions/:nuts_id/cities",
            get(routes::regions::get_region_cities),
        )
        .route("/api/v1/risk/curve", get(routes::risk::get_risk_curve))
        .route(
            "/api/v1/risk/coefficients",
            get(routes::risk::get_coefficients),
        )
        .route("/api/v1/risk/cities", get(routes::risk::get_all_cities))
        .with_state(app_state);

    // Stateless views
    let static_routes = Router::new()
        .route("/api/v1/life-table", get(routes::life_table::get_life_table))
        .route("/api/v1/metrics", get(routes::metrics::list_metrics));

    let playback_routes = Router::new()
        .route("/api/v1/playback", get(routes::playback::get_playback))
        .route("/api/v1/playback/play", post(routes::playback::play))
        .route("/api/v1/playback/pause", post(routes::playback::pause))
        .with_state(player);

    let app = Router::new()
        .merge(view_routes)
        .merge(static_routes)
        .merge(playback_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Dashboard view service listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
