use alloc::string::String;
use alloc::vec::Vec;

use crittercam_api::{WeatherCondition, keys};
use serde_json::{Map, Value};

use super::DeviceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// The payload itself was not a mapping.
    NotAMapping,
    WrongType,
    UnknownValue,
    OutOfRange,
}

/// A field that fell back to its default during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: &'static str,
    pub kind: IssueKind,
}

impl FieldIssue {
    pub const fn new(field: &'static str, kind: IssueKind) -> Self {
        Self { field, kind }
    }
}

pub struct ConfigNormalizer;

impl ConfigNormalizer {
    /// Turns whatever the coordinator returned into a total [`DeviceConfig`].
    ///
    /// Fields are handled independently, so one malformed field never costs
    /// the others. Every fallback is logged.
    pub fn normalize(raw: Option<&Value>) -> DeviceConfig {
        let (config, issues) = Self::normalize_with_issues(raw);
        for issue in &issues {
            log::warn!(
                "Config field '{}' ignored ({:?}), using default",
                issue.field,
                issue.kind
            );
        }
        config
    }

    pub fn normalize_with_issues(raw: Option<&Value>) -> (DeviceConfig, Vec<FieldIssue>) {
        let mut issues = Vec::new();

        let map = match raw {
            None | Some(Value::Null) => {
                log::info!("No configuration received, using defaults");
                return (DeviceConfig::default(), issues);
            }
            Some(Value::Object(map)) => map,
            Some(_) => {
                issues.push(FieldIssue::new("<payload>", IssueKind::NotAMapping));
                return (DeviceConfig::default(), issues);
            }
        };

        let config = DeviceConfig {
            test_mode: extract_test_mode(map, &mut issues),
            weather_condition: extract_weather(map, &mut issues),
            next_wakeup_absolute_ms: extract_next_wakeup(map, &mut issues),
        };

        (config, issues)
    }
}

fn extract_test_mode(map: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> bool {
    match map.get(keys::TEST_MODE) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => {
            issues.push(FieldIssue::new(keys::TEST_MODE, IssueKind::WrongType));
            false
        }
    }
}

fn extract_weather(
    map: &Map<String, Value>,
    issues: &mut Vec<FieldIssue>,
) -> WeatherCondition {
    match map.get(keys::WEATHER_CONDITION) {
        None | Some(Value::Null) => WeatherCondition::default(),
        Some(Value::String(text)) => text.parse().unwrap_or_else(|_| {
            issues.push(FieldIssue::new(keys::WEATHER_CONDITION, IssueKind::UnknownValue));
            WeatherCondition::default()
        }),
        Some(_) => {
            issues.push(FieldIssue::new(keys::WEATHER_CONDITION, IssueKind::WrongType));
            WeatherCondition::default()
        }
    }
}

fn extract_next_wakeup(map: &Map<String, Value>, issues: &mut Vec<FieldIssue>) -> Option<i64> {
    let (field, value) = [keys::NEXT_WAKEUP_TIME_MS, keys::NEXT_WAKEUP_ABSOLUTE_MS]
        .into_iter()
        .find_map(|key| match map.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some((key, value)),
        })?;

    let Value::Number(number) = value else {
        issues.push(FieldIssue::new(field, IssueKind::WrongType));
        return None;
    };

    let millis = if let Some(millis) = number.as_i64() {
        millis
    } else if number.is_u64() {
        issues.push(FieldIssue::new(field, IssueKind::OutOfRange));
        return None;
    } else {
        // Whole-valued floats such as 1.7e12 are accepted.
        match number.as_f64() {
            Some(f) if f.is_finite() && (f as i64) as f64 == f => f as i64,
            _ => {
                issues.push(FieldIssue::new(field, IssueKind::WrongType));
                return None;
            }
        }
    };

    if millis <= 0 {
        issues.push(FieldIssue::new(field, IssueKind::OutOfRange));
        return None;
    }

    Some(millis)
}
