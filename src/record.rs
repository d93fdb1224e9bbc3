use crate::level::Level;
use crate::report::Exception;
use crate::value::Attribute;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::panic::Location;

/// Where a record was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub file: String,
    pub line: u32,
    pub module_path: Option<String>,
}

impl From<&Location<'_>> for Source {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            module_path: None,
        }
    }
}

/// A single log call: message, level and the attributes passed with it.
///
/// Attributes carried by the handler's chain or by the request context are
/// not part of the record; each handler merges them in when it emits.
#[derive(Debug, Clone)]
pub struct Record {
    pub time: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub source: Option<Source>,
    attrs: Vec<Attribute>,
}

impl Record {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            level,
            message: message.into(),
            source: None,
            attrs: Vec::new(),
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_attrs(mut self, attrs: impl IntoIterator<Item = Attribute>) -> Self {
        self.add_attrs(attrs);
        self
    }

    pub fn add_attrs(&mut self, attrs: impl IntoIterator<Item = Attribute>) {
        self.attrs.extend(attrs);
    }

    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    /// Same record with `attrs` placed before the existing attributes.
    pub fn with_prefix(&self, attrs: &[Attribute]) -> Record {
        let mut merged = Vec::with_capacity(attrs.len() + self.attrs.len());
        merged.extend_from_slice(attrs);
        merged.extend_from_slice(&self.attrs);
        Record {
            time: self.time,
            level: self.level,
            message: self.message.clone(),
            source: self.source.clone(),
            attrs: merged,
        }
    }
}

/// Flattened, serializable form of a record handed to a
/// [`LogSink`](crate::sink::LogSink).
///
/// `fields` holds every chain and record attribute keyed by its full group
/// path, in emission order. An [`ErrorReport`](crate::report::ErrorReport)
/// logged under the `error` key is moved out of `fields` into `exception`.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub message: String,
    pub target: Option<String>,
    pub module_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub service_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<Exception>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_keeps_both_orders() {
        let record = Record::new(Level::Info, "msg")
            .with_attrs([Attribute::int("c", 3), Attribute::int("d", 4)]);
        let merged = record.with_prefix(&[Attribute::int("a", 1), Attribute::int("b", 2)]);
        let keys: Vec<_> = merged.attrs().iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c", "d"]);
        assert_eq!(record.attrs().len(), 2);
        assert_eq!(merged.time, record.time);
    }

    #[test]
    fn log_record_serializes_level_upper_case() {
        let record = LogRecord {
            timestamp: Utc::now(),
            level: Level::Warn,
            message: "m".to_string(),
            target: None,
            module_path: None,
            file: None,
            line: None,
            fields: serde_json::Map::new(),
            service_name: Some("svc".to_string()),
            exception: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["level"], "WARN");
        assert_eq!(json["service_name"], "svc");
        assert!(json.get("exception").is_none());
    }
}
