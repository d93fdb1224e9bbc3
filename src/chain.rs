//! Immutable, structurally-shared record of `with_attrs` / `with_group`
//! operations applied to a logging handle.
//!
//! A [`Chain`] is a persistent singly-linked list: every operation allocates a
//! new head node pointing at the previous head, so handles derived from a
//! common ancestor share that ancestor's nodes and never observe each other's
//! additions. [`Chain::apply`] replays the operations oldest-first and hands
//! each leaf attribute to a visitor together with the group path in effect
//! when it was attached.
//!
//! ```
//! use log_scope::{Attribute, Chain};
//! use std::ops::ControlFlow;
//!
//! let chain = Chain::new()
//!     .with_attrs([Attribute::int("a", 1)])
//!     .with_group("G")
//!     .with_attrs([Attribute::int("b", 2)]);
//!
//! let mut seen = Vec::new();
//! let groups = chain.apply(|groups, attr| {
//!     seen.push(format!("{}:{}", groups.join("."), attr));
//!     ControlFlow::Continue(())
//! });
//!
//! assert_eq!(seen, [":a=1", "G:b=2"]);
//! assert_eq!(groups, ["G"]);
//! ```

use crate::value::{Attribute, Value};
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

/// A single recorded operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Opens a named scope for every later operation.
    Group(String),
    /// Attaches attributes under the scopes open at that point.
    Attrs(Vec<Attribute>),
}

struct Node {
    op: Op,
    parent: Option<Arc<Node>>,
}

impl Drop for Node {
    // Unlink uniquely owned ancestors one by one so that dropping a long
    // chain does not recurse once per node.
    fn drop(&mut self) {
        let mut next = self.parent.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.parent.take(),
                Err(_) => break,
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct Chain {
    head: Option<Arc<Node>>,
    len: usize,
}

impl Chain {
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Returns a chain whose latest operation attaches `attrs`.
    ///
    /// An empty `attrs` returns this chain unchanged without allocating.
    pub fn with_attrs(&self, attrs: impl IntoIterator<Item = Attribute>) -> Chain {
        let attrs: Vec<Attribute> = attrs.into_iter().collect();
        if attrs.is_empty() {
            return self.clone();
        }
        self.push(Op::Attrs(attrs))
    }

    /// Returns a chain whose latest operation opens the scope `name`.
    ///
    /// An empty `name` returns this chain unchanged without allocating.
    pub fn with_group(&self, name: impl Into<String>) -> Chain {
        let name = name.into();
        if name.is_empty() {
            return self.clone();
        }
        self.push(Op::Group(name))
    }

    fn push(&self, op: Op) -> Chain {
        Chain {
            head: Some(Arc::new(Node {
                op,
                parent: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Number of recorded operations.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// `true` when both chains have the very same head node (or are both empty).
    pub fn ptr_eq(&self, other: &Chain) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Recorded operations in creation order, oldest first.
    pub fn ops(&self) -> Vec<&Op> {
        let mut ops = Vec::with_capacity(self.len);
        let mut node = self.head.as_deref();
        while let Some(current) = node {
            ops.push(&current.op);
            node = current.parent.as_deref();
        }
        ops.reverse();
        ops
    }

    /// Every group name opened on this chain, outermost first.
    pub fn groups(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Group(name) => Some(name.clone()),
                Op::Attrs(_) => None,
            })
            .collect()
    }

    /// Replays the chain in creation order, calling `visit` once per leaf
    /// attribute with the group path in effect when it was attached.
    ///
    /// Group-valued attributes are flattened: their key extends the path for
    /// their members, and an empty group contributes nothing at all. Lazy
    /// values are resolved first so a lazily produced group is flattened the
    /// same way.
    ///
    /// Returning [`ControlFlow::Break`] from `visit` stops all further visits.
    /// The returned path always covers every group on the chain; sinks use it
    /// as the prefix for record-level attributes.
    pub fn apply<F>(&self, mut visit: F) -> Vec<String>
    where
        F: FnMut(&[String], &Attribute) -> ControlFlow<()>,
    {
        let mut path = Vec::new();
        let mut flow = ControlFlow::Continue(());
        for op in self.ops() {
            match op {
                Op::Group(name) => path.push(name.clone()),
                Op::Attrs(attrs) => {
                    if flow.is_continue() {
                        flow = walk(&mut path, attrs, &mut visit);
                    }
                }
            }
        }
        path
    }
}

/// Visits loose attributes (for example those of a single record) under
/// `prefix`, with the same flattening rules as [`Chain::apply`].
pub fn apply_attrs<F>(prefix: &[String], attrs: &[Attribute], mut visit: F) -> ControlFlow<()>
where
    F: FnMut(&[String], &Attribute) -> ControlFlow<()>,
{
    let mut path = prefix.to_vec();
    walk(&mut path, attrs, &mut visit)
}

fn walk<F>(path: &mut Vec<String>, attrs: &[Attribute], visit: &mut F) -> ControlFlow<()>
where
    F: FnMut(&[String], &Attribute) -> ControlFlow<()>,
{
    for attr in attrs {
        match &attr.value {
            Value::Group(members) => walk_group(path, &attr.key, members, visit)?,
            Value::Lazy(_) => {
                let resolved = Attribute {
                    key: attr.key.clone(),
                    value: attr.value.resolve(),
                };
                match &resolved.value {
                    Value::Group(members) => walk_group(path, &resolved.key, members, visit)?,
                    _ => visit(path, &resolved)?,
                }
            }
            _ => visit(path, attr)?,
        }
    }
    ControlFlow::Continue(())
}

fn walk_group<F>(
    path: &mut Vec<String>,
    key: &str,
    members: &[Attribute],
    visit: &mut F,
) -> ControlFlow<()>
where
    F: FnMut(&[String], &Attribute) -> ControlFlow<()>,
{
    if members.is_empty() {
        return ControlFlow::Continue(());
    }
    // A group with an empty key inlines its members.
    if key.is_empty() {
        return walk(path, members, visit);
    }
    path.push(key.to_owned());
    let flow = walk(path, members, visit);
    path.pop();
    flow
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ops()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(chain: &Chain) -> (Vec<(Vec<String>, String)>, Vec<String>) {
        let mut seen = Vec::new();
        let groups = chain.apply(|groups, attr| {
            seen.push((groups.to_vec(), attr.to_string()));
            ControlFlow::Continue(())
        });
        (seen, groups)
    }

    fn path(groups: &[&str]) -> Vec<String> {
        groups.iter().map(|g| g.to_string()).collect()
    }

    #[test]
    fn empty_operations_are_no_ops() {
        let base = Chain::new();
        let chain = base.with_attrs([]).with_group("").with_attrs(Vec::new()).with_group("");
        assert!(chain.is_empty());
        assert!(chain.ptr_eq(&base));
        assert_eq!(collect(&chain), (vec![], vec![]));

        let non_empty = Chain::new().with_attrs([Attribute::int("a", 1)]);
        assert!(non_empty.with_group("").ptr_eq(&non_empty));
        assert!(non_empty.with_attrs([]).ptr_eq(&non_empty));
        assert_eq!(non_empty.len(), 1);
    }

    #[test]
    fn visits_in_creation_order() {
        let chain = Chain::new()
            .with_attrs([Attribute::int("a", 1), Attribute::int("b", 2)])
            .with_attrs([Attribute::int("c", 3)])
            .with_attrs([Attribute::int("a", 4)]);
        let (seen, groups) = collect(&chain);
        let keys: Vec<_> = seen.into_iter().map(|(_, attr)| attr).collect();
        assert_eq!(keys, ["a=1", "b=2", "c=3", "a=4"]);
        assert!(groups.is_empty());
    }

    #[test]
    fn group_path_follows_open_order() {
        let chain = Chain::new()
            .with_group("A")
            .with_group("B")
            .with_attrs([Attribute::int("x", 1)]);
        let (seen, groups) = collect(&chain);
        assert_eq!(seen, vec![(path(&["A", "B"]), "x=1".to_string())]);
        assert_eq!(groups, path(&["A", "B"]));
    }

    #[test]
    fn nested_group_values_are_flattened() {
        let chain = Chain::new().with_attrs([Attribute::group(
            "G",
            [
                Attribute::int("x", 1),
                Attribute::group("G2", [Attribute::int("y", 2)]),
            ],
        )]);
        let (seen, groups) = collect(&chain);
        assert_eq!(
            seen,
            vec![
                (path(&["G"]), "x=1".to_string()),
                (path(&["G", "G2"]), "y=2".to_string()),
            ]
        );
        assert!(groups.is_empty());
    }

    #[test]
    fn empty_group_values_are_suppressed() {
        let chain = Chain::new()
            .with_attrs([Attribute::group("G", [])])
            .with_attrs([Attribute::int("z", 0)]);
        let (seen, _) = collect(&chain);
        assert_eq!(seen, vec![(vec![], "z=0".to_string())]);
    }

    #[test]
    fn group_without_attributes_only_shows_in_returned_path() {
        let chain = Chain::new().with_attrs([Attribute::int("a", 1)]).with_group("idle");
        let (seen, groups) = collect(&chain);
        assert_eq!(seen, vec![(vec![], "a=1".to_string())]);
        assert_eq!(groups, path(&["idle"]));
    }

    #[test]
    fn siblings_do_not_affect_shared_base() {
        let base = Chain::new().with_attrs([Attribute::int("a", 1)]);
        let before = collect(&base);

        let x = base.with_group("X").with_attrs([Attribute::int("x", 1)]);
        let y = base.with_group("Y").with_attrs([Attribute::int("y", 2)]);

        assert_eq!(collect(&base), before);
        assert_eq!(
            collect(&x).0,
            vec![(vec![], "a=1".to_string()), (path(&["X"]), "x=1".to_string())]
        );
        assert_eq!(
            collect(&y).0,
            vec![(vec![], "a=1".to_string()), (path(&["Y"]), "y=2".to_string())]
        );
        assert_eq!(collect(&x).1, path(&["X"]));
        assert_eq!(collect(&y).1, path(&["Y"]));
    }

    #[test]
    fn end_to_end_interleaving() {
        let chain = Chain::new()
            .with_attrs([Attribute::int("a", 1)])
            .with_group("G")
            .with_attrs([Attribute::int("b", 2)])
            .with_attrs([Attribute::int("c", 3)])
            .with_attrs([Attribute::group(
                "XXX",
                [Attribute::int("1", 0), Attribute::int("2", 0)],
            )])
            .with_group("H")
            .with_attrs([Attribute::int("d", 4)])
            .with_attrs([Attribute::int("e", 5)]);

        let (seen, groups) = collect(&chain);
        assert_eq!(
            seen,
            vec![
                (path(&[]), "a=1".to_string()),
                (path(&["G"]), "b=2".to_string()),
                (path(&["G"]), "c=3".to_string()),
                (path(&["G", "XXX"]), "1=0".to_string()),
                (path(&["G", "XXX"]), "2=0".to_string()),
                (path(&["G", "H"]), "d=4".to_string()),
                (path(&["G", "H"]), "e=5".to_string()),
            ]
        );
        assert_eq!(groups, path(&["G", "H"]));
        assert_eq!(chain.groups(), path(&["G", "H"]));
        assert_eq!(chain.len(), 8);
    }

    #[test]
    fn break_stops_every_later_visit() {
        let chain = Chain::new()
            .with_attrs([Attribute::int("a", 1), Attribute::int("b", 2)])
            .with_group("G")
            .with_attrs([Attribute::int("c", 3)])
            .with_group("H");

        let mut seen = Vec::new();
        let groups = chain.apply(|_, attr| {
            seen.push(attr.key.clone());
            if attr.key == "a" {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        assert_eq!(seen, ["a"]);
        assert_eq!(groups, path(&["G", "H"]));
    }

    #[test]
    fn break_inside_nested_group() {
        let chain = Chain::new()
            .with_attrs([Attribute::group(
                "G",
                [Attribute::int("x", 1), Attribute::int("y", 2)],
            )])
            .with_attrs([Attribute::int("z", 3)]);

        let mut seen = Vec::new();
        chain.apply(|_, attr| {
            seen.push(attr.key.clone());
            ControlFlow::Break(())
        });
        assert_eq!(seen, ["x"]);
    }

    #[test]
    fn lazy_group_is_flattened() {
        let chain = Chain::new().with_attrs([
            Attribute::lazy("req", || Value::group([Attribute::string("id", "r-1")])),
            Attribute::lazy("n", || Value::I64(9)),
        ]);
        let (seen, _) = collect(&chain);
        assert_eq!(
            seen,
            vec![
                (path(&["req"]), "id=r-1".to_string()),
                (vec![], "n=9".to_string()),
            ]
        );
    }

    #[test]
    fn empty_group_key_inlines_members() {
        let chain = Chain::new()
            .with_group("G")
            .with_attrs([Attribute::group("", [Attribute::int("x", 1)])]);
        let (seen, _) = collect(&chain);
        assert_eq!(seen, vec![(path(&["G"]), "x=1".to_string())]);
    }

    #[test]
    fn apply_attrs_uses_prefix() {
        let mut seen = Vec::new();
        let flow = apply_attrs(
            &path(&["G"]),
            &[Attribute::int("a", 1), Attribute::group("I", [Attribute::int("b", 2)])],
            |groups, attr| {
                seen.push((groups.join("."), attr.to_string()));
                ControlFlow::Continue(())
            },
        );
        assert!(flow.is_continue());
        assert_eq!(
            seen,
            vec![
                ("G".to_string(), "a=1".to_string()),
                ("G.I".to_string(), "b=2".to_string()),
            ]
        );
    }

    #[test]
    fn ops_are_reported_oldest_first() {
        let chain = Chain::new().with_group("x").with_attrs([Attribute::int("a", 1)]);
        assert_eq!(
            chain.ops(),
            vec![&Op::Group("x".to_string()), &Op::Attrs(vec![Attribute::int("a", 1)])]
        );
    }

    #[test]
    fn deep_chains_apply_and_drop() {
        let mut chain = Chain::new();
        for i in 0..200_000 {
            chain = chain.with_attrs([Attribute::int("i", i)]);
        }
        let mut count = 0;
        chain.apply(|_, _| {
            count += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(count, 200_000);
        drop(chain);
    }

    #[test]
    fn chains_are_shareable_across_threads() {
        let base = Chain::new().with_group("G").with_attrs([Attribute::int("a", 1)]);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let chain = base.with_attrs([Attribute::int("t", i)]);
                std::thread::spawn(move || collect(&chain))
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let (seen, groups) = handle.join().unwrap();
            assert_eq!(seen[1], (path(&["G"]), format!("t={i}")));
            assert_eq!(groups, path(&["G"]));
        }
    }
}
