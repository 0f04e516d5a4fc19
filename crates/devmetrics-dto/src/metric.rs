use serde::{Deserialize, Serialize};

use crate::error::DtoError;

/// The two metric kinds the system understands. `(id, kind)` is the primary key everywhere
/// a metric is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// The wire envelope for one metric: `{id, kind, delta?, value?, hash?}`.
///
/// This is the single DTO shared by the HTTP JSON protocol, the snapshot file format, and
/// the SQL row mapping — there is deliberately no per-layer duplicate of this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Metric {
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            delta: None,
            value: Some(value),
            hash: None,
        }
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            delta: Some(delta),
            value: None,
            hash: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Enforces the §3 invariants: a counter carries `delta` and not `value`; a gauge the
    /// reverse.
    pub fn validate(&self) -> Result<(), DtoError> {
        if self.id.is_empty() {
            return Err(DtoError::EmptyId);
        }

        match self.kind {
            MetricKind::Counter => {
                if self.delta.is_none() {
                    return Err(DtoError::MissingDelta {
                        id: self.id.clone(),
                    });
                }
                if self.value.is_some() {
                    return Err(DtoError::UnexpectedValue {
                        id: self.id.clone(),
                    });
                }
            }
            MetricKind::Gauge => {
                if self.value.is_none() {
                    return Err(DtoError::MissingValue {
                        id: self.id.clone(),
                    });
                }
                if self.delta.is_some() {
                    return Err(DtoError::UnexpectedDelta {
                        id: self.id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// The exact textual form HMAC is computed over (§3). Gauges use Rust's `{:.6}` formatter
    /// to match Go's default `%f` (six fractional digits) byte-for-byte.
    pub fn canonical_string(&self) -> Result<String, DtoError> {
        match self.kind {
            MetricKind::Gauge => {
                let value = self.value.ok_or_else(|| DtoError::MissingValue {
                    id: self.id.clone(),
                })?;
                Ok(format!("{}:gauge:{:.6}", self.id, value))
            }
            MetricKind::Counter => {
                let delta = self.delta.ok_or_else(|| DtoError::MissingDelta {
                    id: self.id.clone(),
                })?;
                Ok(format!("{}:counter:{}", self.id, delta))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_canonical_string_uses_six_fractional_digits() {
        let m = Metric::gauge("RandomValue", 9.1);
        assert_eq!(m.canonical_string().unwrap(), "RandomValue:gauge:9.100000");
    }

    #[test]
    fn counter_canonical_string_is_base10() {
        let m = Metric::counter("PollCount", 555);
        assert_eq!(m.canonical_string().unwrap(), "PollCount:counter:555");
    }

    #[test]
    fn validate_rejects_counter_with_value() {
        let mut m = Metric::counter("C", 1);
        m.value = Some(1.0);
        assert!(matches!(
            m.validate(),
            Err(DtoError::UnexpectedValue { .. })
        ));
    }

    #[test]
    fn validate_rejects_gauge_without_value() {
        let m = Metric {
            id: "G".into(),
            kind: MetricKind::Gauge,
            delta: None,
            value: None,
            hash: None,
        };
        assert!(matches!(m.validate(), Err(DtoError::MissingValue { .. })));
    }

    #[test]
    fn json_round_trip_omits_absent_fields() {
        let m = Metric::gauge("Alloc", 42.5);
        let json = serde_json::to_string(&m).unwrap();
        assert!(!json.contains("delta"));
        assert!(!json.contains("hash"));

        let back: Metric = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
