use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Normalized weather for one city, as served by the API and held in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherRecord {
    pub city: String,
    pub current: CurrentWeather,
    pub forecast: Vec<ForecastDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ForecastDay {
    pub date: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub description: String,
    pub icon: String,
}

// OpenWeather payloads. Only the fields we read are declared.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeatherResponse {
    #[serde(default)]
    pub name: String,
    pub main: MainReadings,
    pub wind: WindReadings,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindReadings {
    pub speed: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherCondition {
    #[serde(default)]
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub list: Vec<ForecastSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastSlot {
    pub dt: i64,
    pub main: MainReadings,
    pub wind: WindReadings,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
}

impl WeatherRecord {
    /// Normalizes an upstream payload. `requested` is used when the provider
    /// omits the city name.
    pub fn from_upstream(requested: &str, response: CurrentWeatherResponse) -> Self {
        let (description, icon) = response
            .weather
            .into_iter()
            .next()
            .map(|c| (c.description, c.icon))
            .unwrap_or_default();

        let city = if response.name.trim().is_empty() {
            requested.to_string()
        } else {
            response.name
        };

        Self {
            city,
            current: CurrentWeather {
                temperature: response.main.temp,
                feels_like: response.main.feels_like,
                humidity: response.main.humidity.round() as i32,
                wind_speed: response.wind.speed,
                description,
                icon,
            },
            forecast: Vec::new(),
        }
    }

    pub fn with_forecast(mut self, forecast: Vec<ForecastDay>) -> Self {
        self.forecast = forecast;
        self
    }
}
