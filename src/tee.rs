use crate::context::Context;
use crate::handler::{HandleError, Handler};
use crate::level::Level;
use crate::record::Record;
use crate::value::Attribute;
use std::sync::Arc;

/// Fans every record out to several handlers.
///
/// Each inner handler keeps its own chain, so scoping a tee scopes every
/// branch. A failing branch does not prevent the remaining ones from
/// receiving the record.
#[derive(Clone)]
pub struct TeeHandler {
    handlers: Vec<Arc<dyn Handler>>,
}

impl TeeHandler {
    pub fn new(handlers: impl IntoIterator<Item = Arc<dyn Handler>>) -> Self {
        Self {
            handlers: handlers.into_iter().collect(),
        }
    }
}

impl Handler for TeeHandler {
    fn enabled(&self, ctx: &Context, level: Level) -> bool {
        self.handlers.iter().any(|h| h.enabled(ctx, level))
    }

    /// **Returns**
    /// - `Ok(())` when every enabled branch accepted the record.
    /// - The branch's error when exactly one failed, otherwise
    ///   [`HandleError::Multiple`] in branch order.
    fn handle(&self, ctx: &Context, record: Record) -> Result<(), HandleError> {
        let mut errors = Vec::new();
        for handler in &self.handlers {
            if !handler.enabled(ctx, record.level) {
                continue;
            }
            if let Err(e) = handler.handle(ctx, record.clone()) {
                errors.push(e);
            }
        }
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(HandleError::Multiple(errors)),
        }
    }

    fn with_attrs(&self, attrs: Vec<Attribute>) -> Arc<dyn Handler> {
        Arc::new(Self {
            handlers: self
                .handlers
                .iter()
                .map(|h| h.with_attrs(attrs.clone()))
                .collect(),
        })
    }

    fn with_group(&self, name: &str) -> Arc<dyn Handler> {
        Arc::new(Self {
            handlers: self.handlers.iter().map(|h| h.with_group(name)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BufferedWriter, TestingHandler};

    struct Failing;

    impl Handler for Failing {
        fn enabled(&self, _ctx: &Context, _level: Level) -> bool {
            true
        }

        fn handle(&self, _ctx: &Context, _record: Record) -> Result<(), HandleError> {
            Err(HandleError::ChannelClosed)
        }

        fn with_attrs(&self, _attrs: Vec<Attribute>) -> Arc<dyn Handler> {
            Arc::new(Failing)
        }

        fn with_group(&self, _name: &str) -> Arc<dyn Handler> {
            Arc::new(Failing)
        }
    }

    fn pair() -> (BufferedWriter, BufferedWriter, TeeHandler) {
        let (l1, l2) = (BufferedWriter::new(), BufferedWriter::new());
        let tee = TeeHandler::new([
            TestingHandler::new(l1.clone()).with_group("l1"),
            TestingHandler::new(l2.clone()).with_group("l2"),
        ]);
        (l1, l2, tee)
    }

    #[test]
    fn enabled_when_any_branch_is() {
        let (_, _, tee) = pair();
        for level in Level::ALL {
            assert!(tee.enabled(&Context::background(), level));
        }
        let strict = TeeHandler::new([Arc::new(
            TestingHandler::new(BufferedWriter::new()).with_min_level(Level::Error),
        ) as Arc<dyn Handler>]);
        assert!(!strict.enabled(&Context::background(), Level::Warn));
    }

    #[test]
    fn handle_reaches_every_branch() {
        let (l1, l2, tee) = pair();
        for level in Level::ALL {
            let record = Record::new(level, "test")
                .with_attrs([Attribute::string("key", "value"), Attribute::int("int", 1)]);
            tee.handle(&Context::background(), record).unwrap();
        }
        assert_eq!(
            l1.contents(),
            "DEBUG: test [l1.key=value l1.int=1]INFO: test [l1.key=value l1.int=1]\
             WARN: test [l1.key=value l1.int=1]ERROR: test [l1.key=value l1.int=1]"
        );
        assert_eq!(
            l2.contents(),
            "DEBUG: test [l2.key=value l2.int=1]INFO: test [l2.key=value l2.int=1]\
             WARN: test [l2.key=value l2.int=1]ERROR: test [l2.key=value l2.int=1]"
        );
    }

    #[test]
    fn scoping_applies_to_every_branch() {
        let (l1, l2, tee) = pair();
        let scoped = tee
            .with_group("group")
            .with_attrs(vec![Attribute::string("key", "value")]);
        scoped
            .handle(&Context::background(), Record::new(Level::Warn, "test"))
            .unwrap();
        assert_eq!(l1.contents(), "WARN: test [l1.group.key=value]");
        assert_eq!(l2.contents(), "WARN: test [l2.group.key=value]");
    }

    #[test]
    fn failures_do_not_short_circuit() {
        let out = BufferedWriter::new();
        let tee = TeeHandler::new([
            Arc::new(Failing) as Arc<dyn Handler>,
            Arc::new(TestingHandler::new(out.clone())) as Arc<dyn Handler>,
            Arc::new(Failing) as Arc<dyn Handler>,
        ]);
        let err = tee
            .handle(&Context::background(), Record::new(Level::Error, "boom"))
            .unwrap_err();
        assert!(matches!(err, HandleError::Multiple(ref errors) if errors.len() == 2));
        assert_eq!(out.contents(), "ERROR: boom []");

        let single = TeeHandler::new([Arc::new(Failing) as Arc<dyn Handler>]);
        assert!(matches!(
            single.handle(&Context::background(), Record::new(Level::Error, "boom")),
            Err(HandleError::ChannelClosed)
        ));
    }
}
