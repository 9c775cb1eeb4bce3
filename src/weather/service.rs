use super::cache::WeatherCache;
use super::openweather::OpenWeatherClient;
use super::types::WeatherRecord;
use crate::config::Settings;
use crate::error::WeatherError;
use futures_util::future::try_join_all;
use std::sync::Arc;

/// Cache-fronted access to the upstream provider.
#[derive(Clone)]
pub struct WeatherService {
    client: Arc<OpenWeatherClient>,
    cache: WeatherCache,
    settings: Arc<Settings>,
}

impl WeatherService {
    pub fn new(
        client: Arc<OpenWeatherClient>,
        cache: WeatherCache,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            client,
            cache,
            settings,
        }
    }

    pub async fn get_weather(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
        if let Some(cached) = self.cache.get(city).await {
            tracing::debug!("Cache hit for city: {}", city);
            return Ok(cached);
        }
        tracing::debug!("Cache miss for city: {}", city);

        let record = match self.client.current_weather(city).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(city = %city, error = %e, "Error fetching weather data");
                return Err(e);
            }
        };

        let record = if self.settings.include_forecast {
            match self.client.daily_forecast(city).await {
                Ok(days) => record.with_forecast(days),
                Err(e) => {
                    tracing::warn!(
                        city = %city,
                        error = %e,
                        "Forecast unavailable, serving current conditions only"
                    );
                    record
                }
            }
        } else {
            record
        };

        self.cache
            .put(city, record.clone(), self.settings.cache_ttl())
            .await;

        Ok(record)
    }

    /// Fetches every city concurrently. Results follow input order; the first
    /// failure aborts the remaining lookups.
    pub async fn get_weather_for_multiple(
        &self,
        cities: &[String],
    ) -> Result<Vec<WeatherRecord>, WeatherError> {
        if cities.len() > self.settings.max_cities_allowed {
            return Err(WeatherError::TooManyCities {
                max: self.settings.max_cities_allowed,
            });
        }

        try_join_all(cities.iter().map(|city| self.get_weather(city))).await
    }

    pub async fn cached_entries(&self) -> u64 {
        self.cache.entry_count().await
    }

    /// Never consults the cache.
    pub async fn is_city_valid(&self, city: &str) -> bool {
        self.client.probe_city(city).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weather::openweather::tests::{current_weather_json, test_settings};
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(settings: Settings) -> WeatherService {
        let client = Arc::new(OpenWeatherClient::new(&settings).unwrap());
        let cache = WeatherCache::new(settings.cache_max_capacity);
        WeatherService::new(client, cache, Arc::new(settings))
    }

    async fn mount_city(server: &MockServer, city: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", city))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_json(city)))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_get_weather_populates_cache() {
        let server = MockServer::start().await;
        mount_city(&server, "London", 1).await;
        let service = service_for(test_settings(&server.uri()));

        let first = service.get_weather("London").await.unwrap();
        let second = service.get_weather("london").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.city, "London");
    }

    #[tokio::test]
    async fn test_get_weather_failure_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;
        let service = service_for(test_settings(&server.uri()));

        assert!(service.get_weather("Paris").await.is_err());
        assert!(service.get_weather("Paris").await.is_err());
    }

    #[tokio::test]
    async fn test_multiple_preserves_input_order() {
        let server = MockServer::start().await;
        mount_city(&server, "London", 1).await;
        mount_city(&server, "Paris", 1).await;
        mount_city(&server, "Tokyo", 1).await;
        let service = service_for(test_settings(&server.uri()));

        let cities = vec!["Tokyo".to_string(), "London".to_string(), "Paris".to_string()];
        let records = service.get_weather_for_multiple(&cities).await.unwrap();

        let names: Vec<&str> = records.iter().map(|r| r.city.as_str()).collect();
        assert_eq!(names, vec!["Tokyo", "London", "Paris"]);
    }

    #[tokio::test]
    async fn test_multiple_over_cap_makes_no_upstream_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_json("City")))
            .expect(0)
            .mount(&server)
            .await;
        let service = service_for(test_settings(&server.uri()));

        let cities = vec!["City".to_string(); 6];
        let err = service.get_weather_for_multiple(&cities).await.unwrap_err();

        assert!(matches!(err, WeatherError::TooManyCities { max: 5 }));
    }

    #[tokio::test]
    async fn test_multiple_fails_when_any_city_fails() {
        let server = MockServer::start().await;
        // London may be cancelled before it reaches the server, so no call count
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_json("London")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Nowhere"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let service = service_for(test_settings(&server.uri()));

        let cities = vec!["London".to_string(), "Nowhere".to_string()];
        let result = service.get_weather_for_multiple(&cities).await;

        assert!(matches!(result, Err(WeatherError::UpstreamStatus { .. })));
    }

    #[tokio::test]
    async fn test_multiple_forwards_empty_and_duplicate_cities() {
        let server = MockServer::start().await;
        mount_city(&server, "", 1).await;
        // Concurrent duplicates may both miss the cache
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Rome"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_json("Rome")))
            .mount(&server)
            .await;
        let service = service_for(test_settings(&server.uri()));

        let cities = vec!["".to_string(), "Rome".to_string(), "Rome".to_string()];
        let records = service.get_weather_for_multiple(&cities).await.unwrap();

        let names: Vec<&str> = records.iter().map(|r| r.city.as_str()).collect();
        assert_eq!(names, vec!["", "Rome", "Rome"]);
        assert!(service.cache.get("").await.is_some());
        assert!(service.cache.get("rome").await.is_some());
    }

    #[tokio::test]
    async fn test_is_city_valid_ignores_cache() {
        let server = MockServer::start().await;
        mount_city(&server, "London", 1).await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .and(query_param_is_missing("units"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_json("London")))
            .expect(3)
            .mount(&server)
            .await;
        let service = service_for(test_settings(&server.uri()));

        assert!(service.is_city_valid("London").await);
        service.get_weather("London").await.unwrap();
        assert!(service.is_city_valid("London").await);
        assert!(service.is_city_valid("London").await);
    }

    #[tokio::test]
    async fn test_forecast_attached_when_enabled() {
        let server = MockServer::start().await;
        mount_city(&server, "London", 1).await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [
                    {
                        "dt": 1714564800,
                        "main": { "temp": 14.0, "feels_like": 13.0, "humidity": 60 },
                        "wind": { "speed": 3.0 },
                        "weather": [{ "description": "few clouds", "icon": "02d" }]
                    }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = test_settings(&server.uri());
        settings.include_forecast = true;
        let service = service_for(settings);

        let record = service.get_weather("London").await.unwrap();
        assert_eq!(record.forecast.len(), 1);
        assert_eq!(record.forecast[0].description, "few clouds");

        // Served from cache, forecast included
        let cached = service.get_weather("London").await.unwrap();
        assert_eq!(cached.forecast.len(), 1);
    }

    #[tokio::test]
    async fn test_forecast_failure_keeps_current_conditions() {
        let server = MockServer::start().await;
        mount_city(&server, "London", 1).await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/forecast"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut settings = test_settings(&server.uri());
        settings.include_forecast = true;
        let service = service_for(settings);

        let record = service.get_weather("London").await.unwrap();
        assert!(record.forecast.is_empty());
        assert_eq!(record.current.description, "Partly cloudy");
    }
}
