//! Typed wire values: record references, coordinates, and dates.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::constants::{
    DATE_FORMAT, FIELD_OBJECT_ID, KEY_CLASS_NAME, KEY_TYPE, TYPE_DATE, TYPE_GEOPOINT, TYPE_POINTER,
};
use crate::error::{Error, Result};

/// A lightweight reference to a record without its field data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    pub class_name: String,
    pub object_id: String,
}

impl Pointer {
    pub fn new(class_name: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            object_id: object_id.into(),
        }
    }

    /// The wire descriptor: `{"__type":"Pointer","className":...,"objectId":...}`.
    pub fn to_json(&self) -> Value {
        json!({
            KEY_TYPE: TYPE_POINTER,
            KEY_CLASS_NAME: self.class_name,
            FIELD_OBJECT_ID: self.object_id,
        })
    }

    /// Decode a pointer descriptor, returning `None` for any other shape.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.get(KEY_TYPE)?.as_str()? != TYPE_POINTER {
            return None;
        }
        Some(Self {
            class_name: obj.get(KEY_CLASS_NAME)?.as_str()?.to_string(),
            object_id: obj.get(FIELD_OBJECT_ID)?.as_str()?.to_string(),
        })
    }
}

/// A geographic coordinate pair used by the geospatial operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Build a coordinate pair, rejecting out-of-range values.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidQuery(format!(
                "latitude {latitude} outside [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidQuery(format!(
                "longitude {longitude} outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// The wire descriptor: `{"__type":"GeoPoint","latitude":...,"longitude":...}`.
    pub fn to_json(&self) -> Value {
        json!({
            KEY_TYPE: TYPE_GEOPOINT,
            "latitude": self.latitude,
            "longitude": self.longitude,
        })
    }
}

/// Encode a datetime as the server's date descriptor with millisecond
/// precision: `{"__type":"Date","iso":"2024-01-15T10:30:00.000Z"}`.
pub fn encode_date(value: &DateTime<Utc>) -> Value {
    json!({
        KEY_TYPE: TYPE_DATE,
        "iso": value.format(DATE_FORMAT).to_string(),
    })
}

/// Decode either a date descriptor or a bare ISO-8601 string.
pub fn decode_date(value: &Value) -> Option<DateTime<Utc>> {
    let iso = match value {
        Value::String(s) => s.as_str(),
        Value::Object(obj) if obj.get(KEY_TYPE).and_then(Value::as_str) == Some(TYPE_DATE) => {
            obj.get("iso")?.as_str()?
        }
        _ => return None,
    };
    DateTime::parse_from_rfc3339(iso)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
