//! Inbound vehicle telemetry.

use serde::Deserialize;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TelemetryError {
    #[error("malformed telemetry: {0}")]
    Malformed(String),
    #[error("telemetry speed is not finite")]
    NonFinite,
}

#[derive(Deserialize)]
struct SpeedReport {
    speed: f64,
}

/// Last reported vehicle speed. Last write wins; values never expire.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Telemetry {
    speed: f32,
    updates: u64,
}

impl Telemetry {
    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Number of accepted speed reports.
    #[inline]
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
        self.updates += 1;
    }

    /// Apply one inbound message. Only `{"speed": <number>}` is recognized;
    /// anything else is rejected and the previous speed is kept.
    pub fn apply_message(&mut self, raw: &str) -> Result<f32, TelemetryError> {
        let report: SpeedReport =
            serde_json::from_str(raw).map_err(|e| TelemetryError::Malformed(e.to_string()))?;
        let speed = report.speed as f32;
        if !speed.is_finite() {
            return Err(TelemetryError::NonFinite);
        }
        self.set_speed(speed);
        Ok(speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_reports_update_last_value() {
        let mut t = Telemetry::default();
        assert_eq!(t.apply_message(r#"{"speed": 3.5}"#), Ok(3.5));
        assert_eq!(t.apply_message(r#"{"speed": 1, "battery": 80}"#), Ok(1.0));
        assert_eq!(t.speed(), 1.0);
        assert_eq!(t.updates(), 2);
    }

    #[test]
    fn malformed_messages_keep_previous_speed() {
        let mut t = Telemetry::default();
        t.set_speed(4.0);
        for raw in [
            "Car connected.",
            r#"{"velocity": 2}"#,
            r#"{"speed": "fast"}"#,
            "[1, 2]",
        ] {
            assert!(matches!(
                t.apply_message(raw),
                Err(TelemetryError::Malformed(_))
            ));
        }
        assert_eq!(t.apply_message("{\"speed\": 1e300}"), Err(TelemetryError::NonFinite));
        assert_eq!(t.speed(), 4.0);
        assert_eq!(t.updates(), 1);
    }
}
