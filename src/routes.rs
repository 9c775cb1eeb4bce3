use axum::{
    extract::{Path, State},
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::Settings,
    error::{ErrorResponse, WeatherError},
    rate_limit::{rate_limit, RateLimiter},
    weather::{
        types::{CurrentWeather, ForecastDay, WeatherRecord},
        OpenWeatherClient, WeatherCache, WeatherService,
    },
};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub weather: WeatherService,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(settings: Settings) -> Result<Self, WeatherError> {
        let settings = Arc::new(settings);
        let client = Arc::new(OpenWeatherClient::new(&settings)?);
        let cache = WeatherCache::new(settings.cache_max_capacity);
        let limiter = RateLimiter::per_minute(settings.rate_limit_requests_per_minute);
        let weather = WeatherService::new(client, cache, settings);

        Ok(Self { weather, limiter })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub cached_cities: u64,
    pub tracked_clients: usize,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather API",
        description = "API for retrieving weather data for multiple cities"
    ),
    paths(get_weather, get_weather_for_multiple, health),
    components(schemas(
        WeatherRecord,
        CurrentWeather,
        ForecastDay,
        ErrorResponse,
        HealthResponse
    ))
)]
pub struct ApiDoc;

// Route handlers
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_cities: state.weather.cached_entries().await,
        tracked_clients: state.limiter.tracked_clients(),
    })
}

#[utoipa::path(
    get,
    path = "/api/weather/{city}",
    params(("city" = String, Path, description = "City name")),
    responses(
        (status = 200, description = "Current weather for the city", body = WeatherRecord),
        (status = 404, description = "City not found", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 500, description = "Upstream failure", body = ErrorResponse)
    )
)]
pub async fn get_weather(
    State(state): State<AppState>,
    Path(city): Path<String>,
) -> Result<Json<WeatherRecord>, WeatherError> {
    if !state.weather.is_city_valid(&city).await {
        tracing::info!("City not found: {}", city);
        return Err(WeatherError::CityNotFound(city));
    }

    let record = state.weather.get_weather(&city).await?;
    Ok(Json(record))
}

#[utoipa::path(
    post,
    path = "/api/weather/multiple",
    request_body = Vec<String>,
    responses(
        (status = 200, description = "Weather for every requested city, in request order", body = [WeatherRecord]),
        (status = 400, description = "Too many cities", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse),
        (status = 500, description = "Upstream failure", body = ErrorResponse)
    )
)]
pub async fn get_weather_for_multiple(
    State(state): State<AppState>,
    Json(cities): Json<Vec<String>>,
) -> Result<Json<Vec<WeatherRecord>>, WeatherError> {
    let records = state.weather.get_weather_for_multiple(&cities).await?;
    Ok(Json(records))
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/weather/multiple", post(get_weather_for_multiple))
        .route("/api/weather/:city", get(get_weather))
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
