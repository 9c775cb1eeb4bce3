use super::types::{ForecastDay, ForecastResponse, ForecastSlot};
use chrono::{DateTime, NaiveDate, Timelike, Utc};
use std::collections::BTreeMap;

/// Collapses 3-hour forecast slots into one entry per UTC calendar day,
/// ascending by date.
pub fn group_into_days(response: &ForecastResponse) -> Vec<ForecastDay> {
    let mut days: BTreeMap<NaiveDate, Vec<(DateTime<Utc>, &ForecastSlot)>> = BTreeMap::new();

    for slot in &response.list {
        // Out-of-range timestamps are skipped
        let Some(ts) = DateTime::from_timestamp(slot.dt, 0) else {
            continue;
        };
        days.entry(ts.date_naive()).or_default().push((ts, slot));
    }

    days.into_values()
        .filter_map(|slots| summarize_day(&slots))
        .collect()
}

fn summarize_day(slots: &[(DateTime<Utc>, &ForecastSlot)]) -> Option<ForecastDay> {
    let (first_ts, _) = slots.first()?;
    let count = slots.len() as f64;

    let temp_sum: f64 = slots.iter().map(|(_, s)| s.main.temp).sum();
    let feels_sum: f64 = slots.iter().map(|(_, s)| s.main.feels_like).sum();
    let humidity_sum: f64 = slots.iter().map(|(_, s)| s.main.humidity).sum();
    let wind_sum: f64 = slots.iter().map(|(_, s)| s.wind.speed).sum();

    // Conditions come from the slot nearest midday
    let (_, midday) = slots
        .iter()
        .min_by_key(|(ts, _)| (ts.hour() as i32 - 12).abs())?;
    let (description, icon) = midday
        .weather
        .first()
        .map(|c| (c.description.clone(), c.icon.clone()))
        .unwrap_or_default();

    let date = first_ts
        .date_naive()
        .and_hms_opt(0, 0, 0)?
        .and_utc();

    Some(ForecastDay {
        date,
        temperature: temp_sum / count,
        feels_like: feels_sum / count,
        humidity: (humidity_sum / count).round() as i32,
        wind_speed: wind_sum / count,
        description,
        icon,
    })
}
