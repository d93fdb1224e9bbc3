use crate::chain::{self, Chain};
use crate::context::Context;
use crate::handler::{vacant_key, HandleError, Handler};
use crate::level::Level;
use crate::record::Record;
use crate::value::Attribute;
use chrono::SecondsFormat;
use serde_json::{Map, Value as Json};
use std::io::Write;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, PoisonError};

/// Encodes each record as one JSON object per line.
///
/// Attributes are nested into objects following their group path, so a
/// handler scoped with `with_group("req")` writes `{"req": {"id": ...}}`.
/// Record attributes are nested under the chain's full group path. Groups
/// that never receive an attribute do not appear. Repeated or clashing keys
/// get a `#n` suffix, so every attribute the chain emits is written.
pub struct JsonHandler<W> {
    writer: Arc<Mutex<W>>,
    chain: Chain,
    min_level: Level,
}

impl<W> Clone for JsonHandler<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            chain: self.chain.clone(),
            min_level: self.min_level,
        }
    }
}

impl<W> JsonHandler<W>
where
    W: Write + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
            chain: Chain::new(),
            min_level: Level::Info,
        }
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Builds the JSON object for `record` without writing it.
    pub fn encode(&self, record: &Record) -> Json {
        let mut root = Map::new();
        root.insert(
            "time".to_string(),
            Json::String(record.time.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        root.insert("level".to_string(), Json::String(record.level.to_string()));
        root.insert("msg".to_string(), Json::String(record.message.clone()));

        let groups = self.chain.apply(|groups, attr| {
            insert_at(&mut root, groups, attr);
            ControlFlow::Continue(())
        });
        chain::apply_attrs(&groups, record.attrs(), |groups, attr| {
            insert_at(&mut root, groups, attr);
            ControlFlow::Continue(())
        });
        Json::Object(root)
    }
}

/// Places `attr` under `groups`, never replacing anything already written.
///
/// A leaf whose key is taken (by an earlier attribute, a group object or one
/// of the `time`/`level`/`msg` header fields) is written as `key#1`, `key#2`,
/// ... A group whose name is taken by a leaf opens its object under the first
/// such name not holding a leaf.
fn insert_at(root: &mut Map<String, Json>, groups: &[String], attr: &Attribute) {
    let mut target = root;
    for group in groups {
        let name = group_key(target, group);
        let slot = target
            .entry(name)
            .or_insert_with(|| Json::Object(Map::new()));
        let Json::Object(next) = slot else {
            return;
        };
        target = next;
    }
    let key = vacant_key(target, attr.key.clone());
    target.insert(key, attr.value.to_json());
}

/// `name`, or `name#n`, whichever first is free or already a group object.
fn group_key(target: &Map<String, Json>, name: &str) -> String {
    let mut candidate = name.to_string();
    let mut n = 0;
    while target.get(&candidate).is_some_and(|slot| !slot.is_object()) {
        n += 1;
        candidate = format!("{name}#{n}");
    }
    candidate
}

impl<W> Handler for JsonHandler<W>
where
    W: Write + Send + 'static,
{
    fn enabled(&self, _ctx: &Context, level: Level) -> bool {
        level >= self.min_level
    }

    fn handle(&self, _ctx: &Context, record: Record) -> Result<(), HandleError> {
        let line = serde_json::to_vec(&self.encode(&record))?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn with_attrs(&self, attrs: Vec<Attribute>) -> Arc<dyn Handler> {
        Arc::new(Self {
            chain: self.chain.with_attrs(attrs),
            ..self.clone()
        })
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        Arc::new(Self {
            chain: self.chain.with_group(name),
            ..self.clone()
        })
    }
}
