//! Weather readings as Control Change values

use notch_config::MappingConfig;
use notch_core::ObservationRecord;
use notch_midi::ControlMessage;

/// Reading range mapped linearly onto 0-127
#[derive(Debug, Clone, Copy)]
struct Span {
    low: f64,
    high: f64,
}

const TEMPERATURE: Span = Span { low: -30.0, high: 50.0 };
const HUMIDITY: Span = Span { low: 0.0, high: 100.0 };
const PRESSURE: Span = Span { low: 950.0, high: 1050.0 };
const WIND_SPEED: Span = Span { low: 0.0, high: 30.0 };

impl Span {
    fn scale(self, value: f64) -> u8 {
        let unit = (value - self.low) / (self.high - self.low);
        (unit * 127.0).round().clamp(0.0, 127.0) as u8
    }
}

/// One CC per mapped controller whose reading is present
pub fn derive_controls(record: &ObservationRecord, mapping: &MappingConfig) -> Vec<ControlMessage> {
    let readings = [
        (mapping.temperature_cc, record.temperature, TEMPERATURE),
        (mapping.humidity_cc, record.humidity.map(f64::from), HUMIDITY),
        (mapping.pressure_cc, record.pressure.map(f64::from), PRESSURE),
        (mapping.wind_speed_cc, record.wind_speed, WIND_SPEED),
    ];

    readings
        .into_iter()
        .filter_map(|(controller, value, span)| {
            Some(ControlMessage::ControlChange {
                controller: controller?,
                value: span.scale(value.filter(|v| v.is_finite())?),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_mapping() -> MappingConfig {
        MappingConfig {
            temperature_cc: Some(20),
            humidity_cc: Some(21),
            pressure_cc: Some(22),
            wind_speed_cc: Some(23),
        }
    }

    #[test]
    fn test_scaling_and_clamping() {
        assert_eq!(TEMPERATURE.scale(-30.0), 0);
        assert_eq!(TEMPERATURE.scale(50.0), 127);
        assert_eq!(TEMPERATURE.scale(10.0), 64);
        assert_eq!(TEMPERATURE.scale(-80.0), 0);
        assert_eq!(PRESSURE.scale(1100.0), 127);
        assert_eq!(HUMIDITY.scale(50.0), 64);
    }

    #[test]
    fn test_only_mapped_present_readings_sent() {
        let record = ObservationRecord {
            temperature: Some(10.0),
            humidity: Some(100),
            pressure: None,
            wind_speed: Some(0.0),
            ..Default::default()
        };

        let controls = derive_controls(&record, &full_mapping());
        assert_eq!(
            controls,
            vec![
                ControlMessage::ControlChange { controller: 20, value: 64 },
                ControlMessage::ControlChange { controller: 21, value: 127 },
                ControlMessage::ControlChange { controller: 23, value: 0 },
            ]
        );

        assert!(derive_controls(&record, &MappingConfig::default()).is_empty());
    }
}
