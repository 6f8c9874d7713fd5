//! Inbound message shapes and their normalization into [`LocationRecord`]s.
//!
//! Both nRF Cloud delivery paths (pushed webhooks and polled messages) are
//! parsed into explicit structures whose fields are all optional. Presence is
//! checked before a record is built; anything incomplete is ignored rather
//! than rejected.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::record::{LocationRecord, Source};

/// Message types that carry a location fix
pub const LOCATION_APP_IDS: [&str; 3] = ["GROUND_FIX", "GNSS", "LOCATION"];

/// Whether messages of this `appId` are considered for persistence
pub fn is_location_app_id(app_id: &str) -> bool {
    LOCATION_APP_IDS.contains(&app_id)
}

/// Read an optional field, treating a value of the wrong type as absent
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Coordinates as reported by nRF Cloud.
///
/// Ground-fix results use `lon` and `uncertainty`; GNSS payloads use `lng`
/// and `acc`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationFix {
    #[serde(default, deserialize_with = "lenient")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub uncertainty: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub acc: Option<f64>,
}

impl LocationFix {
    pub fn longitude(&self) -> Option<f64> {
        self.lon.or(self.lng)
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.uncertainty.or(self.acc)
    }

    /// Latitude and longitude, if both are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.longitude()?))
    }
}

/// An event time as either an RFC 3339 string or epoch milliseconds
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EventTime {
    Millis(f64),
    Text(String),
}

impl EventTime {
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            EventTime::Millis(ms) if ms.is_finite() => DateTime::from_timestamp_millis(*ms as i64),
            EventTime::Millis(_) => None,
            EventTime::Text(text) => parse_timestamp(text),
        }
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Body pushed to `/webhook`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(default, deserialize_with = "lenient")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<EventTime>,
    #[serde(default, deserialize_with = "lenient")]
    pub location: Option<LocationFix>,
}

impl WebhookEvent {
    /// Interpret a JSON body. Fields of the wrong type are read as absent;
    /// bodies that are not objects are treated as events without a location.
    pub fn from_payload(payload: &Value) -> Self {
        Self::deserialize(payload).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Webhook body does not match the location event shape");
            Self::default()
        })
    }

    /// Build the record to insert, or `None` when the event carries no
    /// complete location.
    pub fn into_record(self, raw: Value, received_at: DateTime<Utc>) -> Option<LocationRecord> {
        let fix = self.location?;
        let (lat, lng) = fix.coordinates()?;

        let timestamp = match &self.timestamp {
            None => received_at,
            Some(time) => time.to_utc().unwrap_or_else(|| {
                tracing::warn!(timestamp = ?time, "Unparseable event timestamp, using receipt time");
                received_at
            }),
        };

        Some(LocationRecord {
            device_id: self.device_id,
            timestamp,
            lat,
            lng,
            accuracy: fix.accuracy(),
            source: Source::NrfCloud,
            raw,
        })
    }
}

/// One item of the nRF Cloud `/messages` listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolledMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub received_at: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<MessageBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    #[serde(default, deserialize_with = "lenient")]
    pub app_id: Option<String>,
    /// Kept untyped: non-location app IDs carry scalars or other shapes here
    pub data: Option<Value>,
}

impl PolledMessage {
    pub fn from_item(item: &Value) -> Option<Self> {
        Self::deserialize(item).ok()
    }

    pub fn app_id(&self) -> Option<&str> {
        self.message.as_ref()?.app_id.as_deref()
    }

    /// Build the record to upsert for a listing item.
    ///
    /// Returns `None` for non-location app IDs, incomplete coordinates, or
    /// items that cannot be keyed (no device ID or receive time).
    pub fn to_record(&self, raw: &Value) -> Option<LocationRecord> {
        if !self.app_id().is_some_and(is_location_app_id) {
            return None;
        }

        let data = self.message.as_ref()?.data.as_ref()?;
        let fix = LocationFix::deserialize(data).ok()?;
        let (lat, lng) = fix.coordinates()?;

        let device_id = self.device_id.clone()?;
        let timestamp = parse_timestamp(self.received_at.as_deref()?)?;

        Some(LocationRecord {
            device_id: Some(device_id),
            timestamp,
            lat,
            lng,
            accuracy: fix.accuracy(),
            source: Source::NrfCloud,
            raw: raw.clone(),
        })
    }
}

/// Normalize a single listing item, if it is a usable location message
pub fn record_from_item(item: &Value) -> Option<LocationRecord> {
    PolledMessage::from_item(item)?.to_record(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn received() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    // =============================================================================
    // Webhook events
    // =============================================================================

    #[test]
    fn test_webhook_with_location_builds_record() {
        let body = json!({
            "deviceId": "d1",
            "location": { "lat": 10.0, "lon": 20.0, "uncertainty": 5.0 }
        });
        let record = WebhookEvent::from_payload(&body)
            .into_record(body.clone(), received())
            .unwrap();

        assert_eq!(record.device_id.as_deref(), Some("d1"));
        assert_eq!(record.lat, 10.0);
        assert_eq!(record.lng, 20.0);
        assert_eq!(record.accuracy, Some(5.0));
        assert_eq!(record.source, Source::NrfCloud);
        assert_eq!(record.timestamp, received());
        assert_eq!(record.raw, body);
    }

    #[test]
    fn test_webhook_without_location_is_ignored() {
        let body = json!({ "deviceId": "d1", "type": "ALERT" });
        assert!(WebhookEvent::from_payload(&body)
            .into_record(body.clone(), received())
            .is_none());
    }

    #[test]
    fn test_webhook_location_missing_longitude_is_ignored() {
        let body = json!({ "deviceId": "d1", "location": { "lat": 10.0 } });
        assert!(WebhookEvent::from_payload(&body)
            .into_record(body.clone(), received())
            .is_none());
    }

    #[test]
    fn test_webhook_mismatched_shape_is_ignored() {
        let body = json!({ "deviceId": 42, "location": "somewhere" });
        assert!(WebhookEvent::from_payload(&body)
            .into_record(body.clone(), received())
            .is_none());
    }

    #[test]
    fn test_webhook_zero_coordinates_are_present() {
        let body = json!({ "location": { "lat": 0.0, "lon": 0.0 } });
        let record = WebhookEvent::from_payload(&body)
            .into_record(body.clone(), received())
            .unwrap();
        assert_eq!((record.lat, record.lng), (0.0, 0.0));
        assert!(record.device_id.is_none());
    }

    #[test]
    fn test_webhook_timestamp_string() {
        let body = json!({
            "timestamp": "2024-04-30T08:15:30.250Z",
            "location": { "lat": 1.0, "lon": 2.0 }
        });
        let record = WebhookEvent::from_payload(&body)
            .into_record(body.clone(), received())
            .unwrap();
        assert_eq!(record.timestamp.timestamp_millis(), 1_714_464_930_250);
    }

    #[test]
    fn test_webhook_timestamp_millis() {
        let body = json!({ "timestamp": 1_714_464_930_250_i64, "location": { "lat": 1.0, "lon": 2.0 } });
        let record = WebhookEvent::from_payload(&body)
            .into_record(body.clone(), received())
            .unwrap();
        assert_eq!(record.timestamp.timestamp_millis(), 1_714_464_930_250);
    }

    #[test]
    fn test_webhook_unparseable_timestamp_falls_back_to_receipt() {
        let body = json!({ "timestamp": "yesterday", "location": { "lat": 1.0, "lon": 2.0 } });
        let record = WebhookEvent::from_payload(&body)
            .into_record(body.clone(), received())
            .unwrap();
        assert_eq!(record.timestamp, received());
    }

    #[test]
    fn test_webhook_timestamp_of_wrong_type_falls_back_to_receipt() {
        for timestamp in [json!(true), json!({ "s": 1 }), json!([1, 2])] {
            let body = json!({
                "deviceId": "d1",
                "timestamp": timestamp,
                "location": { "lat": 10, "lon": 20 }
            });
            let record = WebhookEvent::from_payload(&body)
                .into_record(body.clone(), received())
                .unwrap();
            assert_eq!(record.timestamp, received());
            assert_eq!(record.device_id.as_deref(), Some("d1"));
        }
    }

    #[test]
    fn test_webhook_non_numeric_uncertainty_is_dropped() {
        let body = json!({ "location": { "lat": 10, "lon": 20, "uncertainty": "5" } });
        let record = WebhookEvent::from_payload(&body)
            .into_record(body.clone(), received())
            .unwrap();
        assert_eq!((record.lat, record.lng), (10.0, 20.0));
        assert_eq!(record.accuracy, None);
    }

    #[test]
    fn test_webhook_numeric_device_id_keeps_location() {
        let body = json!({ "deviceId": 42, "location": { "lat": 10, "lon": 20 } });
        let record = WebhookEvent::from_payload(&body)
            .into_record(body.clone(), received())
            .unwrap();
        assert!(record.device_id.is_none());
        assert_eq!(record.raw["deviceId"], 42);
    }

    #[test]
    fn test_webhook_non_numeric_latitude_is_not_a_fix() {
        let body = json!({ "location": { "lat": "10", "lon": 20 } });
        assert!(WebhookEvent::from_payload(&body)
            .into_record(body.clone(), received())
            .is_none());
    }

    // =============================================================================
    // Polled messages
    // =============================================================================

    fn item(app_id: &str, data: Value) -> Value {
        json!({
            "deviceId": "nrf-1",
            "receivedAt": "2024-05-01T11:58:00.000Z",
            "message": { "appId": app_id, "messageType": "DATA", "data": data }
        })
    }

    #[test]
    fn test_allow_set() {
        for app_id in ["GROUND_FIX", "GNSS", "LOCATION"] {
            assert!(is_location_app_id(app_id));
        }
        assert!(!is_location_app_id("TEMP"));
        assert!(!is_location_app_id("gnss"));
    }

    #[test]
    fn test_ground_fix_item() {
        let raw = item("GROUND_FIX", json!({ "lat": 63.4, "lon": 10.4, "uncertainty": 250 }));
        let record = record_from_item(&raw).unwrap();

        assert_eq!(record.device_id.as_deref(), Some("nrf-1"));
        assert_eq!(record.timestamp.to_rfc3339(), "2024-05-01T11:58:00+00:00");
        assert_eq!(record.lng, 10.4);
        assert_eq!(record.accuracy, Some(250.0));
        assert_eq!(record.raw, raw);
    }

    #[test]
    fn test_gnss_item_uses_lng_and_acc() {
        let raw = item("GNSS", json!({ "lat": 63.4, "lng": 10.4, "acc": 12.5 }));
        let record = record_from_item(&raw).unwrap();
        assert_eq!(record.lng, 10.4);
        assert_eq!(record.accuracy, Some(12.5));
    }

    #[test]
    fn test_gnss_item_with_non_numeric_acc_is_kept() {
        let raw = item("GNSS", json!({ "lat": 1.0, "lng": 2.0, "acc": "12" }));
        let record = record_from_item(&raw).unwrap();
        assert_eq!((record.lat, record.lng), (1.0, 2.0));
        assert_eq!(record.accuracy, None);
    }

    #[test]
    fn test_ground_fix_string_uncertainty_falls_back_to_acc() {
        let raw = item("GROUND_FIX", json!({ "lat": 1.0, "lon": 2.0, "uncertainty": "n/a", "acc": 30 }));
        assert_eq!(record_from_item(&raw).unwrap().accuracy, Some(30.0));
    }

    #[test]
    fn test_item_with_numeric_device_id_is_skipped() {
        let mut raw = item("GNSS", json!({ "lat": 1.0, "lng": 2.0 }));
        raw["deviceId"] = json!(7);
        assert!(record_from_item(&raw).is_none());
    }

    #[test]
    fn test_other_app_id_is_skipped() {
        assert!(record_from_item(&item("TEMP", json!("23.5"))).is_none());
        assert!(record_from_item(&item("OTHER", json!({ "lat": 1.0, "lon": 2.0 }))).is_none());
    }

    #[test]
    fn test_location_item_without_coordinates_is_skipped() {
        assert!(record_from_item(&item("LOCATION", json!({ "uncertainty": 10 }))).is_none());
        assert!(record_from_item(&item("LOCATION", json!({ "lat": 1.0 }))).is_none());
    }

    #[test]
    fn test_unkeyable_item_is_skipped() {
        let mut raw = item("GNSS", json!({ "lat": 1.0, "lng": 2.0 }));
        raw["receivedAt"] = json!("not a date");
        assert!(record_from_item(&raw).is_none());

        let mut raw = item("GNSS", json!({ "lat": 1.0, "lng": 2.0 }));
        raw.as_object_mut().unwrap().remove("deviceId");
        assert!(record_from_item(&raw).is_none());
    }

    #[test]
    fn test_item_without_message_is_skipped() {
        assert!(record_from_item(&json!({ "deviceId": "x", "receivedAt": "2024-05-01T00:00:00Z" })).is_none());
        assert!(record_from_item(&json!("garbage")).is_none());
    }
}
