use crate::config::Site;
use crate::request::DEFAULT_PARAMETERS;
use chrono::{Datelike, NaiveDate};
use serde_json::{json, Map, Value};

pub fn det_site() -> Site {
    Site {
        code: "DET".to_string(),
        point_id: "140065".to_string(),
        latitude: 44.69,
        longitude: -122.22,
    }
}

/// A POWER-shaped payload with every default parameter for each day of `year`.
pub fn year_payload(year: i32) -> Value {
    let Some(start) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        panic!("invalid year {year}");
    };

    let mut parameter = Map::new();
    for (i, code) in DEFAULT_PARAMETERS.iter().enumerate() {
        let series: Map<String, Value> = start
            .iter_days()
            .take_while(|d| d.year() == year)
            .map(|d| {
                let value = i as f64 + d.ordinal() as f64 / 100.0;
                (d.format("%Y%m%d").to_string(), json!(value))
            })
            .collect();
        parameter.insert(code.to_string(), Value::Object(series));
    }

    json!({
        "header": { "fill_value": -999.0 },
        "properties": { "parameter": parameter }
    })
}
