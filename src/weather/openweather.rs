use super::forecast::group_into_days;
use super::types::*;
use crate::config::Settings;
use crate::error::WeatherError;
use reqwest::Client;
use serde::de::DeserializeOwned;

const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";
const FORECAST_PATH: &str = "/data/2.5/forecast";

/// Single-attempt client for the OpenWeather REST API.
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(settings: &Settings) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .user_agent("WeatherApiServer/1.0")
            .timeout(settings.upstream_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    pub async fn current_weather(&self, city: &str) -> Result<WeatherRecord, WeatherError> {
        let response: CurrentWeatherResponse = self
            .get_json(city, CURRENT_WEATHER_PATH, &[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .await?;

        Ok(WeatherRecord::from_upstream(city, response))
    }

    pub async fn daily_forecast(&self, city: &str) -> Result<Vec<ForecastDay>, WeatherError> {
        let response: ForecastResponse = self
            .get_json(city, FORECAST_PATH, &[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .await?;

        Ok(group_into_days(&response))
    }

    /// Existence probe: true only when the provider answers 2xx.
    pub async fn probe_city(&self, city: &str) -> bool {
        let url = format!("{}{}", self.base_url, CURRENT_WEATHER_PATH);

        match self
            .client
            .get(&url)
            .query(&[("q", city), ("appid", self.api_key.as_str())])
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("City probe for {} failed: {}", city, e);
                false
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        city: &str,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|source| WeatherError::UpstreamRequest {
                city: city.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::UpstreamStatus {
                city: city.to_string(),
                status,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| WeatherError::UpstreamRequest {
                city: city.to_string(),
                source,
            })?;

        serde_json::from_slice(&bytes).map_err(|source| WeatherError::UpstreamParse {
            city: city.to_string(),
            source,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn test_settings(base_url: &str) -> Settings {
        Settings::from_lookup(|key| match key {
            "OPENWEATHER_API_KEY" => Some("test_key".to_string()),
            "OPENWEATHER_BASE_URL" => Some(base_url.to_string()),
            _ => None,
        })
        .unwrap()
    }

    pub(crate) fn current_weather_json(name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "main": { "temp": 20.0, "feels_like": 19.0, "humidity": 65 },
            "wind": { "speed": 5.0 },
            "weather": [{ "id": 802, "main": "Clouds", "description": "Partly cloudy", "icon": "03d" }]
        })
    }

    #[tokio::test]
    async fn test_current_weather_sends_metric_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .and(query_param("appid", "test_key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_json("London")))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(&test_settings(&server.uri())).unwrap();
        let record = client.current_weather("London").await.unwrap();

        assert_eq!(record.city, "London");
        assert_eq!(record.current.temperature, 20.0);
        assert_eq!(record.current.humidity, 65);
    }

    #[tokio::test]
    async fn test_current_weather_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(&test_settings(&server.uri())).unwrap();
        let err = client.current_weather("InvalidCity").await.unwrap_err();

        assert!(matches!(err, WeatherError::UpstreamStatus { .. }));
    }

    #[tokio::test]
    async fn test_current_weather_bad_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(&test_settings(&server.uri())).unwrap();
        let err = client.current_weather("London").await.unwrap_err();

        assert!(matches!(err, WeatherError::UpstreamParse { .. }));
    }

    #[tokio::test]
    async fn test_probe_city() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(200).set_body_json(current_weather_json("London")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Zzqq"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::new(&test_settings(&server.uri())).unwrap();

        assert!(client.probe_city("London").await);
        assert!(!client.probe_city("Zzqq").await);
    }

    #[tokio::test]
    async fn test_probe_unreachable_host() {
        // Nothing listens on port 9 locally
        let client = OpenWeatherClient::new(&test_settings("http://127.0.0.1:9")).unwrap();
        assert!(!client.probe_city("London").await);
    }
}
