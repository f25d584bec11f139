//! NeoWs feed payload → flat [`Asteroid`] records.
//!
//! The feed nests entries under a date-keyed map:
//!
//! ```text
//! { "near_earth_objects": { "2024-01-01": [ { "id": "...", "close_approach_data": [...] } ] } }
//! ```
//!
//! A bare date-keyed map (without the `near_earth_objects` wrapper) is
//! accepted too. Any missing or malformed field fails the whole payload.

use serde_json::{Map, Value};

use crate::app::{RadarError, Result};
use crate::domain::window::parse_date;
use crate::domain::Asteroid;

const OBJECTS_KEY: &str = "near_earth_objects";

#[derive(Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, body: &str) -> Result<Vec<Asteroid>> {
        let root: Value = serde_json::from_str(body)?;
        let root = root
            .as_object()
            .ok_or_else(|| RadarError::parse("$", "expected a JSON object"))?;

        let (by_date, prefix) = match root.get(OBJECTS_KEY) {
            Some(objects) => (as_object(objects, OBJECTS_KEY)?, OBJECTS_KEY),
            None => (root, ""),
        };

        let mut asteroids = Vec::new();
        for (date, entries) in by_date {
            let key = join(prefix, date);
            let entries = entries
                .as_array()
                .ok_or_else(|| RadarError::parse(&key, "expected an array"))?;

            for (index, entry) in entries.iter().enumerate() {
                asteroids.push(parse_entry(entry, &format!("{key}[{index}]"))?);
            }
        }

        Ok(asteroids)
    }
}

fn parse_entry(entry: &Value, key: &str) -> Result<Asteroid> {
    let entry = as_object(entry, key)?;

    let approach = field(entry, key, "close_approach_data")?;
    let approach_key = format!("{key}.close_approach_data");
    let approach = approach
        .as_array()
        .and_then(|a| a.first())
        .ok_or_else(|| RadarError::parse(&approach_key, "expected a non-empty array"))?;
    let approach_key = format!("{approach_key}[0]");
    let approach = as_object(approach, &approach_key)?;

    let velocity_key = format!("{approach_key}.relative_velocity");
    let velocity = as_object(field(approach, &approach_key, "relative_velocity")?, &velocity_key)?;

    let distance_key = format!("{approach_key}.miss_distance");
    let distance = as_object(field(approach, &approach_key, "miss_distance")?, &distance_key)?;

    let diameter_key = format!("{key}.estimated_diameter");
    let diameter = as_object(field(entry, key, "estimated_diameter")?, &diameter_key)?;
    let km_key = format!("{diameter_key}.kilometers");
    let km = as_object(field(diameter, &diameter_key, "kilometers")?, &km_key)?;

    Ok(Asteroid {
        id: integer(entry, key, "id")?,
        codename: string(entry, key, "name")?,
        close_approach_date: date(approach, &approach_key, "close_approach_date")?,
        absolute_magnitude: number(entry, key, "absolute_magnitude_h")?,
        estimated_diameter_km: number(km, &km_key, "estimated_diameter_min")?,
        relative_velocity_km_s: number(velocity, &velocity_key, "kilometers_per_second")?,
        distance_from_earth_au: number(distance, &distance_key, "astronomical")?,
        is_potentially_hazardous: boolean(entry, key, "is_potentially_hazardous_asteroid")?,
    })
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn as_object<'a>(value: &'a Value, key: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| RadarError::parse(key, "expected an object"))
}

fn field<'a>(object: &'a Map<String, Value>, parent: &str, name: &str) -> Result<&'a Value> {
    object
        .get(name)
        .ok_or_else(|| RadarError::parse(join(parent, name), "missing field"))
}

fn string(object: &Map<String, Value>, parent: &str, name: &str) -> Result<String> {
    field(object, parent, name)?
        .as_str()
        .map(String::from)
        .ok_or_else(|| RadarError::parse(join(parent, name), "expected a string"))
}

/// Stored dates must be real calendar days so string order is date order.
fn date(object: &Map<String, Value>, parent: &str, name: &str) -> Result<String> {
    let value = string(object, parent, name)?;
    match parse_date(&value) {
        Ok(_) => Ok(value),
        Err(_) => Err(RadarError::parse(
            join(parent, name),
            format!("expected a YYYY-MM-DD date, got {value:?}"),
        )),
    }
}

/// NeoWs encodes most numbers as strings; accept both.
fn number(object: &Map<String, Value>, parent: &str, name: &str) -> Result<f64> {
    let value = field(object, parent, name)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|n| n.is_finite())
        .ok_or_else(|| RadarError::parse(join(parent, name), format!("expected a number, got {value}")))
}

fn integer(object: &Map<String, Value>, parent: &str, name: &str) -> Result<i64> {
    let value = field(object, parent, name)?;
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        RadarError::parse(join(parent, name), format!("expected an integer, got {value}"))
    })
}

fn boolean(object: &Map<String, Value>, parent: &str, name: &str) -> Result<bool> {
    field(object, parent, name)?
        .as_bool()
        .ok_or_else(|| RadarError::parse(join(parent, name), "expected a boolean"))
}
