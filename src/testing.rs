//! In-memory handler for tests.
//!
//! [`TestingHandler`] renders every record as `LEVEL: message [k=v ...]` into
//! a shared [`BufferedWriter`]. Chain attributes come first with their group
//! path joined into the key, then the record's own attributes under the
//! chain's final group path. Group values attached to the record itself are
//! printed inline as `g=[k=v ...]`.

use crate::chain::Chain;
use crate::context::Context;
use crate::handler::{join_key, HandleError, Handler};
use crate::level::Level;
use crate::record::Record;
use crate::value::Attribute;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cloneable string buffer; clones append to the same storage.
#[derive(Clone, Default, Debug)]
pub struct BufferedWriter {
    buf: Arc<Mutex<String>>,
}

impl BufferedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_str(&self, s: &str) {
        self.lock().push_str(s);
    }

    pub fn contents(&self) -> String {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[derive(Clone)]
pub struct TestingHandler {
    out: BufferedWriter,
    chain: Chain,
    separator: String,
    min_level: Level,
}

impl TestingHandler {
    pub fn new(out: BufferedWriter) -> Self {
        Self {
            out,
            chain: Chain::new(),
            separator: ".".to_string(),
            min_level: Level::Debug,
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    fn render(&self, record: &Record) -> String {
        let mut parts = Vec::new();
        let groups = self.chain.apply(|groups, attr| {
            parts.push(format!(
                "{}={}",
                join_key(groups, &attr.key, &self.separator),
                attr.value
            ));
            ControlFlow::Continue(())
        });
        for attr in record.attrs() {
            if attr.value.as_group().is_some_and(<[Attribute]>::is_empty) {
                continue;
            }
            parts.push(format!(
                "{}={}",
                join_key(&groups, &attr.key, &self.separator),
                attr.value
            ));
        }

        format!("{}: {} [{}]", record.level, record.message, parts.join(" "))
    }
}

impl Handler for TestingHandler {
    fn enabled(&self, _ctx: &Context, level: Level) -> bool {
        level >= self.min_level
    }

    fn handle(&self, _ctx: &Context, record: Record) -> Result<(), HandleError> {
        let line = self.render(&record);
        self.out.write_str(&line);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn emit_all_levels(handler: &dyn Handler, attrs: &[Attribute]) {
        for level in Level::ALL {
            let record = Record::new(level, "test").with_attrs(attrs.to_vec());
            handler.handle(&Context::background(), record).unwrap();
        }
    }

    #[test]
    fn enabled_for_every_level_by_default() {
        let handler = TestingHandler::new(BufferedWriter::new());
        for level in Level::ALL {
            assert!(handler.enabled(&Context::background(), level));
        }
    }

    #[test]
    fn handle_without_attrs() {
        let out = BufferedWriter::new();
        emit_all_levels(&TestingHandler::new(out.clone()), &[]);
        assert_eq!(
            out.contents(),
            "DEBUG: test []INFO: test []WARN: test []ERROR: test []"
        );
    }

    #[test]
    fn handle_with_record_attrs() {
        let out = BufferedWriter::new();
        emit_all_levels(
            &TestingHandler::new(out.clone()),
            &[Attribute::string("key", "value"), Attribute::int("int", 1)],
        );
        assert_eq!(
            out.contents(),
            "DEBUG: test [key=value int=1]INFO: test [key=value int=1]\
             WARN: test [key=value int=1]ERROR: test [key=value int=1]"
        );
    }

    #[test]
    fn record_group_values_render_inline() {
        let out = BufferedWriter::new();
        let handler = TestingHandler::new(out.clone());
        let record = Record::new(Level::Info, "test").with_attrs([
            Attribute::string("key", "value"),
            Attribute::group(
                "g",
                [Attribute::int("int", 1), Attribute::group("g2", [Attribute::int("int", 2)])],
            ),
            Attribute::group("empty", []),
        ]);
        handler.handle(&Context::background(), record).unwrap();
        assert_eq!(out.contents(), "INFO: test [key=value g=[int=1 g2=[int=2]]]");
    }

    #[test]
    fn with_attrs_precede_record_attrs() {
        let out = BufferedWriter::new();
        let handler = TestingHandler::new(out.clone())
            .with_attrs(vec![Attribute::string("key", "value")]);
        emit_all_levels(handler.as_ref(), &[Attribute::int("int", 1)]);
        assert_eq!(
            out.contents(),
            "DEBUG: test [key=value int=1]INFO: test [key=value int=1]\
             WARN: test [key=value int=1]ERROR: test [key=value int=1]"
        );
    }

    #[test]
    fn with_group_prefixes_keys() {
        let out = BufferedWriter::new();
        let handler = TestingHandler::new(out.clone()).with_group("group");
        emit_all_levels(
            handler.as_ref(),
            &[Attribute::string("key", "value"), Attribute::int("int", 1)],
        );
        assert_eq!(
            out.contents(),
            "DEBUG: test [group.key=value group.int=1]INFO: test [group.key=value group.int=1]\
             WARN: test [group.key=value group.int=1]ERROR: test [group.key=value group.int=1]"
        );
    }

    #[test]
    fn interleaved_scopes_and_separator() {
        let out = BufferedWriter::new();
        let handler = TestingHandler::new(out.clone())
            .with_separator("/")
            .with_attrs(vec![Attribute::int("a", 1)])
            .with_group("G")
            .with_attrs(vec![Attribute::int("b", 2)])
            .with_group("H");
        let record = Record::new(Level::Info, "msg").with_attrs([
            Attribute::int("c", 3),
            Attribute::group("I", [Attribute::int("d", 4)]),
        ]);
        handler.handle(&Context::background(), record).unwrap();
        assert_eq!(out.contents(), "INFO: msg [a=1 G/b=2 G/H/c=3 G/H/I=[d=4]]");
    }
}
