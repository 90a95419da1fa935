//! Flattens a POWER daily payload into one [`WeatherRow`] per calendar day.
//!
//! The payload is `properties.parameter.<CODE>.<YYYYMMDD> = value`, with
//! missing data reported as a fill value (normally `-999`).

use crate::config::Site;
use crate::error::{PowerError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

pub const DEFAULT_FILL_VALUE: f64 = -999.0;

/// One output record. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRow {
    pub site_code: String,
    pub points: String,
    pub latitude: f64,
    pub longitude: f64,
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub air_temp_c: Option<f64>,
    pub air_temp_max_c: Option<f64>,
    pub dewpoint_temp_c: Option<f64>,
    pub dewpoint_temp_max_c: Option<f64>,
    pub solar_radiation_kwh_m2: Option<f64>,
    pub solar_radiation_max_kwh_m2: Option<f64>,
    pub wind_speed_ms: Option<f64>,
    pub wind_speed_max_ms: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub wind_direction_max_deg: Option<f64>,
    pub cloud_cover_pct: Option<f64>,
    pub cloud_cover_max_pct: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub precipitation_max_mm: Option<f64>,
}

/// Per-parameter, per-date values from one payload, validated on construction.
#[derive(Debug, Clone)]
pub struct ParameterTable {
    series: BTreeMap<String, BTreeMap<String, Option<f64>>>,
    fill_value: f64,
}

impl ParameterTable {
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let parameter = payload
            .pointer("/properties/parameter")
            .ok_or_else(|| PowerError::normalize("response has no properties.parameter"))?
            .as_object()
            .ok_or_else(|| PowerError::normalize("properties.parameter is not an object"))?;

        let mut series = BTreeMap::new();
        for (code, by_date) in parameter {
            let by_date = by_date.as_object().ok_or_else(|| {
                PowerError::normalize(format!("parameter {code} is not a date mapping"))
            })?;

            let mut values = BTreeMap::new();
            for (date, value) in by_date {
                let value = match value {
                    Value::Null => None,
                    Value::Number(n) => n.as_f64(),
                    other => {
                        return Err(PowerError::normalize(format!(
                            "{code} on {date}: expected a number, got {other}"
                        )))
                    }
                };
                values.insert(date.clone(), value);
            }
            series.insert(code.clone(), values);
        }

        let fill_value = payload
            .pointer("/header/fill_value")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_FILL_VALUE);

        Ok(Self { series, fill_value })
    }

    pub fn fill_value(&self) -> f64 {
        self.fill_value
    }

    pub fn has_parameter(&self, code: &str) -> bool {
        self.series.contains_key(code)
    }

    /// Value for `code` on `date_key`, or `None` when absent or a fill value.
    pub fn value(&self, code: &str, date_key: &str) -> Option<f64> {
        let value = (*self.series.get(code)?.get(date_key)?)?;
        if value == self.fill_value || value == DEFAULT_FILL_VALUE {
            None
        } else {
            Some(value)
        }
    }

    /// Every date key that appears under any parameter, in raw form.
    fn date_keys(&self) -> impl Iterator<Item = &str> {
        self.series
            .values()
            .flat_map(|by_date| by_date.keys().map(String::as_str))
    }
}

/// Builds rows for `site` from a validated table. Dates outside `year` are
/// dropped; rows come out in ascending date order.
pub fn normalize(site: &Site, year: i32, table: &ParameterTable) -> Result<Vec<WeatherRow>> {
    let mut dates: BTreeMap<NaiveDate, &str> = BTreeMap::new();
    for key in table.date_keys() {
        let date = NaiveDate::parse_from_str(key, "%Y%m%d")
            .map_err(|_| PowerError::normalize(format!("invalid date key {key:?}")))?;
        if date.year() != year {
            warn!(site = %site.code, year, date = %date, "Dropping date outside requested year");
            continue;
        }
        dates.insert(date, key);
    }

    let rows = dates
        .into_iter()
        .map(|(date, key)| {
            let v = |code: &str| table.value(code, key);
            WeatherRow {
                site_code: site.code.clone(),
                points: site.point_id.clone(),
                latitude: site.latitude,
                longitude: site.longitude,
                date,
                year: date.year(),
                month: date.month(),
                day: date.day(),
                air_temp_c: v("T2M"),
                air_temp_max_c: v("T2M_MAX"),
                dewpoint_temp_c: v("T2MDEW"),
                dewpoint_temp_max_c: v("T2MDEW_MAX"),
                solar_radiation_kwh_m2: v("ALLSKY_SFC_SW_DWN"),
                solar_radiation_max_kwh_m2: v("ALLSKY_SFC_SW_DWN_MAX"),
                wind_speed_ms: v("WS2M"),
                wind_speed_max_ms: v("WS2M_MAX"),
                wind_direction_deg: v("WD2M"),
                wind_direction_max_deg: v("WD2M_MAX"),
                cloud_cover_pct: v("CLOUD_AMT_DAY"),
                cloud_cover_max_pct: v("CLOUD_AMT_DAY_MAX"),
                precipitation_mm: v("PRECTOTCORR"),
                precipitation_max_mm: v("PRECTOTCORR_MAX"),
            }
        })
        .collect();

    Ok(rows)
}
