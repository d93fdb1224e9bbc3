//! Typed attribute values.
//!
//! An [`Attribute`] is a key paired with a [`Value`]. Values form a closed set
//! of kinds; a [`Value::Group`] holds a nested, ordered attribute list and is
//! flattened by [`crate::chain::Chain::apply`] at emission time.

use chrono::{DateTime, SecondsFormat, Utc};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on chained [`LogValuer`] resolutions before giving up.
const MAX_LOG_VALUER_CALLS: usize = 100;

/// Opaque payload carried by [`Value::Any`].
///
/// Implemented for every `Debug + Send + Sync + 'static` type, so callers can
/// attach arbitrary data and sinks can downcast it back via [`AnyPayload::as_any`].
pub trait AnyPayload: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T> AnyPayload for T
where
    T: Any + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A value computed only when a record is actually emitted.
pub trait LogValuer: fmt::Debug + Send + Sync {
    fn log_value(&self) -> Value;
}

struct FnValuer<F>(F);

impl<F> fmt::Debug for FnValuer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnValuer(..)")
    }
}

impl<F> LogValuer for FnValuer<F>
where
    F: Fn() -> Value + Send + Sync,
{
    fn log_value(&self) -> Value {
        (self.0)()
    }
}

/// Discriminant of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    I64,
    U64,
    F64,
    String,
    Duration,
    Time,
    Any,
    Lazy,
    Group,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::I64 => "i64",
            Kind::U64 => "u64",
            Kind::F64 => "f64",
            Kind::String => "string",
            Kind::Duration => "duration",
            Kind::Time => "time",
            Kind::Any => "any",
            Kind::Lazy => "lazy",
            Kind::Group => "group",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    Duration(Duration),
    Time(DateTime<Utc>),
    Any(Arc<dyn AnyPayload>),
    Lazy(Arc<dyn LogValuer>),
    /// Ordered nested attributes. Keys may repeat.
    Group(Vec<Attribute>),
}

impl Value {
    pub fn any<T>(payload: T) -> Self
    where
        T: Any + fmt::Debug + Send + Sync,
    {
        Value::Any(Arc::new(payload))
    }

    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Value::Lazy(Arc::new(FnValuer(f)))
    }

    pub fn group(attrs: impl IntoIterator<Item = Attribute>) -> Self {
        Value::Group(attrs.into_iter().collect())
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Bool(_) => Kind::Bool,
            Value::I64(_) => Kind::I64,
            Value::U64(_) => Kind::U64,
            Value::F64(_) => Kind::F64,
            Value::String(_) => Kind::String,
            Value::Duration(_) => Kind::Duration,
            Value::Time(_) => Kind::Time,
            Value::Any(_) => Kind::Any,
            Value::Lazy(_) => Kind::Lazy,
            Value::Group(_) => Kind::Group,
        }
    }

    /// Follows [`Value::Lazy`] indirections until a concrete kind is reached.
    ///
    /// A valuer chain longer than 100 steps resolves to a string describing
    /// the failure instead of looping forever.
    pub fn resolve(&self) -> Value {
        let mut current = self.clone();
        for _ in 0..MAX_LOG_VALUER_CALLS {
            let Value::Lazy(valuer) = &current else {
                return current;
            };
            let next = valuer.log_value();
            current = next;
        }
        if current.kind() != Kind::Lazy {
            return current;
        }
        Value::String(format!(
            "log valuer resolved more than {MAX_LOG_VALUER_CALLS} times"
        ))
    }

    /// Members of a group value, or `None` for every other kind.
    pub fn as_group(&self) -> Option<&[Attribute]> {
        match self {
            Value::Group(attrs) => Some(attrs),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Any(payload) => (**payload).as_any().downcast_ref(),
            _ => None,
        }
    }

    /// JSON form used by the structured sinks.
    ///
    /// Durations become integer nanoseconds (saturating), timestamps RFC 3339
    /// strings, opaque payloads their `Debug` text and non-finite floats `null`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Bool(b) => Json::Bool(*b),
            Value::I64(i) => Json::from(*i),
            Value::U64(u) => Json::from(*u),
            Value::F64(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Duration(d) => Json::from(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)),
            Value::Time(t) => Json::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Any(payload) => Json::String(format!("{payload:?}")),
            Value::Lazy(_) => self.resolve().to_json(),
            Value::Group(attrs) => Json::Object(
                attrs
                    .iter()
                    .map(|attr| (attr.key.clone(), attr.value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Any(a), Value::Any(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Value::Lazy(a), Value::Lazy(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Value::Group(a), Value::Group(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Duration(v) => write!(f, "{v:?}"),
            Value::Time(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Any(v) => write!(f, "{v:?}"),
            Value::Lazy(_) => write!(f, "{}", self.resolve()),
            Value::Group(attrs) => {
                f.write_str("[")?;
                for (i, attr) in attrs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{attr}")?;
                }
                f.write_str("]")
            }
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value as $cast)
                }
            }
        )*
    };
}

impl_from! {
    i8 => I64 as i64,
    i16 => I64 as i64,
    i32 => I64 as i64,
    i64 => I64 as i64,
    isize => I64 as i64,
    u8 => U64 as u64,
    u16 => U64 as u64,
    u32 => U64 as u64,
    u64 => U64 as u64,
    usize => U64 as u64,
    f32 => F64 as f64,
    f64 => F64 as f64,
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Value::Duration(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Time(value)
    }
}

impl From<Vec<Attribute>> for Value {
    fn from(value: Vec<Attribute>) -> Self {
        Value::Group(value)
    }
}

/// A key/value pair attached to a scope or a single record.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub value: Value,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, Value::String(value.into()))
    }

    pub fn int(key: impl Into<String>, value: i64) -> Self {
        Self::new(key, Value::I64(value))
    }

    pub fn uint(key: impl Into<String>, value: u64) -> Self {
        Self::new(key, Value::U64(value))
    }

    pub fn float(key: impl Into<String>, value: f64) -> Self {
        Self::new(key, Value::F64(value))
    }

    pub fn boolean(key: impl Into<String>, value: bool) -> Self {
        Self::new(key, Value::Bool(value))
    }

    pub fn duration(key: impl Into<String>, value: Duration) -> Self {
        Self::new(key, Value::Duration(value))
    }

    pub fn time(key: impl Into<String>, value: DateTime<Utc>) -> Self {
        Self::new(key, Value::Time(value))
    }

    pub fn any<T>(key: impl Into<String>, payload: T) -> Self
    where
        T: Any + fmt::Debug + Send + Sync,
    {
        Self::new(key, Value::any(payload))
    }

    pub fn lazy<F>(key: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::new(key, Value::lazy(f))
    }

    pub fn group(key: impl Into<String>, attrs: impl IntoIterator<Item = Attribute>) -> Self {
        Self::new(key, Value::group(attrs))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
