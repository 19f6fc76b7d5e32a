//! Query cursors
//!
//! A cursor executes one compiled query over one node at a time and hands the
//! results to the host one pull at a time:
//!
//! ```text
//! Idle --exec--> Bound --pull--> Iterating --pull (none left)--> Exhausted
//!                  ^                                                 |
//!                  +---------------------- exec ---------------------+
//! ```
//!
//! The cursor does not own what it runs over. It keeps a weak reference to
//! the compiled query and to the tree the bound node lives in; the node
//! itself is kept as a path from the root. Results are re-homed under that
//! tree when they are handed out.
//!
//! The native iterators borrow the cursor, the query and the tree, so they
//! cannot outlive a single host call. The first pull after `exec` runs the
//! native match iteration to completion and records every match. Both pull
//! modes then read from that one traversal: match pulls walk the matches in
//! engine order, capture pulls walk their captures in document order. A
//! match that has handed out any result is never handed out again as a
//! whole, and its captures stop once it has been returned whole or removed.

use super::handle::{self, HandleKind};
use super::node::{self, NodeRef, SyntaxTree, path_of};
use super::query::{self, CompiledQuery};
use super::{Context, SubrSpec, marshal};
use crate::host::{Env, Value};
use crate::{Error, Result};
use std::cmp::Reverse;
use std::collections::{HashSet, VecDeque};
use std::ops::Range;
use std::rc::{Rc, Weak};
use tree_sitter::Point;

/// Where a cursor is in its execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Created, never executed
    Idle,
    /// Bound to a query and node, nothing pulled yet
    Bound,
    /// At least one result has been pulled
    Iterating,
    /// The last pull found nothing
    Exhausted,
}

/// Granularity of a pull
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Matches,
    Captures,
}

/// One pulled result.
///
/// For capture pulls `capture_count` is still the size of the owning match,
/// and `node` is the node of the single capture being reported.
#[derive(Clone)]
pub struct MatchResult {
    pub capture_count: usize,
    pub node: Option<NodeRef>,
    pub id: u32,
    pub pattern_index: usize,
}

struct Binding {
    query: Weak<CompiledQuery>,
    tree: Weak<SyntaxTree>,
    path: Vec<usize>,
}

struct RecordedMatch {
    id: u32,
    pattern_index: usize,
    captures: Vec<Vec<usize>>,
    delivered: usize,
}

/// One traversal of the bound query, shared by both pull modes
#[derive(Default)]
struct Traversal {
    matches: Vec<RecordedMatch>,
    match_order: VecDeque<usize>,
    capture_order: VecDeque<(usize, usize)>,
    // Matches that have handed out at least one result
    started: HashSet<u32>,
    // Matches with nothing left to hand out
    finished: HashSet<u32>,
}

impl Traversal {
    fn next(&mut self, mode: Pull) -> Option<(&RecordedMatch, Option<&Vec<usize>>)> {
        match mode {
            Pull::Matches => {
                while let Some(index) = self.match_order.pop_front() {
                    let id = self.matches[index].id;
                    if self.started.contains(&id) || self.finished.contains(&id) {
                        continue;
                    }
                    self.started.insert(id);
                    self.finished.insert(id);
                    let m = &self.matches[index];
                    return Some((m, m.captures.first()));
                }
                None
            }
            Pull::Captures => {
                while let Some((index, capture)) = self.capture_order.pop_front() {
                    let id = self.matches[index].id;
                    if self.finished.contains(&id) {
                        continue;
                    }
                    self.started.insert(id);
                    let m = &mut self.matches[index];
                    m.delivered += 1;
                    if m.delivered == m.captures.len() {
                        self.finished.insert(id);
                    }
                    let m = &self.matches[index];
                    return Some((m, m.captures.get(capture)));
                }
                None
            }
        }
    }

    /// Whether match `id` has handed out some but not all of its results
    fn in_flight(&self, id: u32) -> bool {
        self.started.contains(&id) && !self.finished.contains(&id)
    }
}

/// Payload of a `tree-sitter-query-cursor` handle
pub struct Cursor {
    native: tree_sitter::QueryCursor,
    binding: Option<Binding>,
    state: CursorState,
    traversal: Option<Traversal>,
}

impl Cursor {
    /// Create an idle cursor, optionally capping in-progress matches
    pub fn new(match_limit: Option<u32>) -> Self {
        let mut native = tree_sitter::QueryCursor::new();
        if let Some(limit) = match_limit {
            native.set_match_limit(limit);
        }
        Self {
            native,
            binding: None,
            state: CursorState::Idle,
            traversal: None,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Bind the cursor to `query` starting at `node`, discarding any
    /// results still pending from a previous execution
    pub fn exec(&mut self, query: &Rc<CompiledQuery>, node: &NodeRef) {
        tracing::debug!(
            "Executing {} query at depth {}",
            query.language(),
            node.path().len()
        );
        self.binding = Some(Binding {
            query: Rc::downgrade(query),
            tree: Rc::downgrade(node.tree()),
            path: node.path().to_vec(),
        });
        self.state = CursorState::Bound;
        self.traversal = None;
    }

    /// Next whole match, or `None` once exhausted
    pub fn next_match(&mut self) -> Result<Option<MatchResult>> {
        self.pull(Pull::Matches)
    }

    /// Next single capture, or `None` once exhausted
    pub fn next_capture(&mut self) -> Result<Option<MatchResult>> {
        self.pull(Pull::Captures)
    }

    /// Drop the remaining captures of match `id`.
    ///
    /// Only a match that is in flight (some of its captures handed out,
    /// others still queued) is affected; any other id is ignored.
    pub fn remove_match(&mut self, id: u32) {
        if self.state != CursorState::Iterating {
            return;
        }
        if let Some(traversal) = self.traversal.as_mut() {
            if traversal.in_flight(id) {
                tracing::trace!("Removing match {}", id);
                traversal.finished.insert(id);
            }
        }
    }

    /// Restrict execution to the half-open byte range (0-based)
    pub fn set_byte_range(&mut self, range: Range<usize>) {
        self.native.set_byte_range(range);
    }

    /// Restrict execution to the half-open point range (0-based rows)
    pub fn set_point_range(&mut self, range: Range<Point>) {
        self.native.set_point_range(range);
    }

    /// Whether the last execution dropped matches because of the match limit
    pub fn did_exceed_match_limit(&self) -> bool {
        self.native.did_exceed_match_limit()
    }

    fn pull(&mut self, mode: Pull) -> Result<Option<MatchResult>> {
        match self.state {
            CursorState::Idle | CursorState::Exhausted => return Ok(None),
            CursorState::Bound | CursorState::Iterating => {}
        }
        if self.traversal.is_none() {
            self.traversal = Some(self.run()?);
        }
        let tree = self.bound_tree()?;

        let next = self.traversal.as_mut().and_then(|traversal| {
            traversal.next(mode).map(|(m, node)| MatchResult {
                capture_count: m.captures.len(),
                node: node.map(|path| NodeRef::new(Rc::clone(&tree), path.clone())),
                id: m.id,
                pattern_index: m.pattern_index,
            })
        });
        match next {
            Some(result) => {
                self.state = CursorState::Iterating;
                Ok(Some(result))
            }
            None => {
                tracing::trace!("Cursor exhausted");
                self.state = CursorState::Exhausted;
                Ok(None)
            }
        }
    }

    fn bound_tree(&self) -> Result<Rc<SyntaxTree>> {
        self.binding
            .as_ref()
            .and_then(|binding| binding.tree.upgrade())
            .ok_or(Error::Released("tree-sitter-tree"))
    }

    /// Run the native iteration for the current binding and record its matches
    fn run(&mut self) -> Result<Traversal> {
        let binding = self.binding.as_ref().ok_or(Error::Released("tree-sitter-node"))?;
        let compiled = binding
            .query
            .upgrade()
            .ok_or(Error::Released("tree-sitter-query"))?;
        let tree = binding
            .tree
            .upgrade()
            .ok_or(Error::Released("tree-sitter-tree"))?;
        let node = tree
            .resolve(&binding.path)
            .ok_or(Error::Released("tree-sitter-node"))?;
        let native_query = compiled.native()?;
        let text = tree.source().as_bytes();

        let mut traversal = Traversal::default();
        // (start byte, end byte, match, capture) for ordering captures
        let mut positions = Vec::new();
        for m in self.native.matches(&native_query, node, text) {
            let index = traversal.matches.len();
            for (capture, c) in m.captures.iter().enumerate() {
                positions.push((c.node.start_byte(), c.node.end_byte(), index, capture));
            }
            traversal.matches.push(RecordedMatch {
                id: m.id(),
                pattern_index: m.pattern_index,
                captures: m.captures.iter().map(|c| path_of(c.node)).collect(),
                delivered: 0,
            });
            traversal.match_order.push_back(index);
        }

        // Document order; an enclosing node comes before the nodes it contains
        positions.sort_by_key(|&(start, end, _, _)| (start, Reverse(end)));
        traversal.capture_order = positions
            .into_iter()
            .map(|(_, _, index, capture)| (index, capture))
            .collect();

        tracing::trace!(
            "Recorded {} matches, {} captures",
            traversal.matches.len(),
            traversal.capture_order.len()
        );
        Ok(traversal)
    }
}

/// Package a result as a `tree-sitter-query-match` record
fn make_match(env: &mut Env, ctx: &Context, result: MatchResult) -> Result<Value> {
    let node = match result.node {
        Some(node) => handle::wrap(env, ctx, HandleKind::Node, node)?,
        None => Value::Nil,
    };
    let args = [
        Value::count(result.capture_count),
        node,
        Value::from(i64::from(result.id)),
        Value::count(result.pattern_index),
    ];
    Ok(env.funcall(&ctx.symbols.match_create, &args)?)
}

fn cursor_new(env: &mut Env, ctx: &Context, _args: &[Value]) -> Result<Value> {
    let cursor = Cursor::new(ctx.config.match_limit);
    handle::wrap(env, ctx, HandleKind::QueryCursor, cursor)
}

fn cursor_p(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    Ok(Value::boolean(handle::is_handle(ctx, &args[0], HandleKind::QueryCursor)))
}

fn cursor_exec(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let ptr = handle::extract(ctx, &args[0], HandleKind::QueryCursor)?;
    let query = query::extract(ctx, &args[1])?;
    let node = node::extract_node(ctx, &args[2])?;
    let mut cursor = handle::borrow_mut::<Cursor>(&ptr, &args[0], HandleKind::QueryCursor)?;
    cursor.exec(&query, &node);
    Ok(Value::Nil)
}

fn next(env: &mut Env, ctx: &Context, value: &Value, mode: Pull) -> Result<Value> {
    let ptr = handle::extract(ctx, value, HandleKind::QueryCursor)?;
    let result = {
        let mut cursor = handle::borrow_mut::<Cursor>(&ptr, value, HandleKind::QueryCursor)?;
        match mode {
            Pull::Matches => cursor.next_match()?,
            Pull::Captures => cursor.next_capture()?,
        }
    };
    match result {
        Some(result) => make_match(env, ctx, result),
        None => Ok(Value::Nil),
    }
}

fn cursor_next_match(env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    next(env, ctx, &args[0], Pull::Matches)
}

fn cursor_next_capture(env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    next(env, ctx, &args[0], Pull::Captures)
}

fn cursor_remove_match(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let ptr = handle::extract(ctx, &args[0], HandleKind::QueryCursor)?;
    let id = marshal::integer(&args[1])?;
    let mut cursor = handle::borrow_mut::<Cursor>(&ptr, &args[0], HandleKind::QueryCursor)?;
    // Ids outside the native range can never be pending
    if let Ok(id) = u32::try_from(id) {
        cursor.remove_match(id);
    }
    Ok(Value::Nil)
}

fn cursor_set_byte_range(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let ptr = handle::extract(ctx, &args[0], HandleKind::QueryCursor)?;
    let start = marshal::position(&args[1])?;
    let end = marshal::position(&args[2])?;
    let mut cursor = handle::borrow_mut::<Cursor>(&ptr, &args[0], HandleKind::QueryCursor)?;
    cursor.set_byte_range(start..end);
    Ok(Value::Nil)
}

fn cursor_set_point_range(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let ptr = handle::extract(ctx, &args[0], HandleKind::QueryCursor)?;
    let start = marshal::point(&args[1])?;
    let end = marshal::point(&args[2])?;
    let mut cursor = handle::borrow_mut::<Cursor>(&ptr, &args[0], HandleKind::QueryCursor)?;
    cursor.set_point_range(start..end);
    Ok(Value::Nil)
}

fn cursor_did_exceed_match_limit(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let ptr = handle::extract(ctx, &args[0], HandleKind::QueryCursor)?;
    let cursor = handle::borrow::<Cursor>(&ptr, &args[0], HandleKind::QueryCursor)?;
    Ok(Value::boolean(cursor.did_exceed_match_limit()))
}

pub(crate) const FUNCTIONS: &[SubrSpec] = &[
    SubrSpec {
        name: "tree-sitter-query-cursor-new",
        min_args: 0,
        max_args: 0,
        doc: "Create a new cursor for executing a given query\n\n(fn)",
        body: cursor_new,
    },
    SubrSpec {
        name: "tree-sitter-query-cursor-p",
        min_args: 1,
        max_args: 1,
        doc: "Return t if OBJECT is a tree-sitter-query-cursor.\n\n(fn OBJECT)",
        body: cursor_p,
    },
    SubrSpec {
        name: "tree-sitter-query-cursor-exec",
        min_args: 3,
        max_args: 3,
        doc: "Start running a given query on a given node.\n\n(fn QCURSOR QUERY NODE)",
        body: cursor_exec,
    },
    SubrSpec {
        name: "tree-sitter-query-cursor-next-match",
        min_args: 1,
        max_args: 1,
        doc: "Advance to the next match of the currently running query.\n\
              Return nil when there are no more matches.\n\n(fn QCURSOR)",
        body: cursor_next_match,
    },
    SubrSpec {
        name: "tree-sitter-query-cursor-next-capture",
        min_args: 1,
        max_args: 1,
        doc: "Advance to the next capture of the currently running query.\n\
              Return nil when there are no more captures.\n\n(fn QCURSOR)",
        body: cursor_next_capture,
    },
    SubrSpec {
        name: "tree-sitter-query-cursor-remove-match",
        min_args: 2,
        max_args: 2,
        doc: "Remove the pending match ID so it is not returned again.\n\n(fn QCURSOR ID)",
        body: cursor_remove_match,
    },
    SubrSpec {
        name: "tree-sitter-query-cursor-set-byte-range",
        min_args: 3,
        max_args: 3,
        doc: "Set the range of positions in which the query will be executed.\n\n\
              (fn QCURSOR START-BYTE END-BYTE)",
        body: cursor_set_byte_range,
    },
    SubrSpec {
        name: "tree-sitter-query-cursor-set-point-range",
        min_args: 3,
        max_args: 3,
        doc: "Set the range of (ROW . COLUMN) positions in which the query will be executed.\n\n\
              (fn QCURSOR START-POINT END-POINT)",
        body: cursor_set_point_range,
    },
    SubrSpec {
        name: "tree-sitter-query-cursor-did-exceed-match-limit",
        min_args: 1,
        max_args: 1,
        doc: "Return t if the last execution dropped matches because of the match limit.\n\n\
              (fn QCURSOR)",
        body: cursor_did_exceed_match_limit,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::{load_rust, loaded, parse};
    use crate::Signal;

    //          0         1         2         3
    //          0123456789012345678901234567890123456
    const SOURCE: &str = "fn main() { let a = 1; let b = a; }";

    struct Fixture {
        env: Env,
        _module: crate::Module,
        lang: Value,
        root: Value,
        cursor: Value,
    }

    impl Fixture {
        fn new() -> Self {
            let (mut env, module) = loaded();
            let lang = load_rust(&mut env);
            let tree = parse(&mut env, &lang, SOURCE);
            let root = env.call("tree-sitter-tree-root-node", &[tree]).unwrap();
            let cursor = env.call("tree-sitter-query-cursor-new", &[]).unwrap();
            Self {
                env,
                _module: module,
                lang,
                root,
                cursor,
            }
        }

        fn query(&mut self, source: &str) -> Value {
            self.env
                .call("tree-sitter-query-new", &[self.lang.clone(), Value::from(source)])
                .unwrap()
        }

        fn exec(&mut self, query: &Value) {
            let args = [self.cursor.clone(), query.clone(), self.root.clone()];
            assert!(self.env.call("tree-sitter-query-cursor-exec", &args).unwrap().is_nil());
        }

        fn next(&mut self, function: &str) -> std::result::Result<Value, Signal> {
            self.env.call(function, &[self.cursor.clone()])
        }

        fn next_match(&mut self) -> Value {
            self.next("tree-sitter-query-cursor-next-match").unwrap()
        }

        fn next_capture(&mut self) -> Value {
            self.next("tree-sitter-query-cursor-next-capture").unwrap()
        }

        fn field(&mut self, record: &Value, field: &str) -> Value {
            self.env
                .call(&format!("tree-sitter-query-match-{}", field), &[record.clone()])
                .unwrap()
        }

        fn node_text(&mut self, record: &Value) -> String {
            let node = self.field(record, "node");
            let text = self.env.call("tree-sitter-node-text", &[node]).unwrap();
            text.as_str().unwrap().to_string()
        }

        fn drain_texts(&mut self, function: &str) -> Vec<String> {
            let mut texts = Vec::new();
            loop {
                let result = self.next(function).unwrap();
                if result.is_nil() {
                    return texts;
                }
                texts.push(self.node_text(&result));
            }
        }
    }

    #[test]
    fn test_idle_cursor_returns_nil() {
        let mut f = Fixture::new();
        assert!(f.next_match().is_nil());
        assert!(f.next_capture().is_nil());
    }

    #[test]
    fn test_matches_in_document_order() {
        let mut f = Fixture::new();
        let query = f.query("(identifier) @id");
        f.exec(&query);

        let first = f.next_match();
        assert_eq!(f.field(&first, "capture-count").as_int(), Some(1));
        assert_eq!(f.field(&first, "pattern-index").as_int(), Some(0));
        assert_eq!(f.node_text(&first), "main");

        let rest = f.drain_texts("tree-sitter-query-cursor-next-match");
        assert_eq!(rest, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_exhaustion_persists_until_exec() {
        let mut f = Fixture::new();
        let query = f.query("(integer_literal) @n");
        f.exec(&query);

        assert!(!f.next_match().is_nil());
        for _ in 0..3 {
            assert!(f.next_match().is_nil());
            assert!(f.next_capture().is_nil());
        }

        f.exec(&query);
        assert!(!f.next_match().is_nil());
    }

    #[test]
    fn test_reexec_discards_pending_matches() {
        let mut f = Fixture::new();
        let identifiers = f.query("(identifier) @id");
        let literals = f.query("(integer_literal) @n");

        f.exec(&identifiers);
        let first = f.next_match();
        assert_eq!(f.node_text(&first), "main");

        f.exec(&literals);
        let texts = f.drain_texts("tree-sitter-query-cursor-next-match");
        assert_eq!(texts, vec!["1"]);
    }

    #[test]
    fn test_captures_report_each_capture_node() {
        let mut f = Fixture::new();
        let query = f.query("(let_declaration pattern: (identifier) @name value: (_) @value)");
        f.exec(&query);

        let first = f.next_capture();
        assert_eq!(f.field(&first, "capture-count").as_int(), Some(2));
        assert_eq!(f.node_text(&first), "a");
        let rest = f.drain_texts("tree-sitter-query-cursor-next-capture");
        assert_eq!(rest, vec!["1", "b", "a"]);
    }

    #[test]
    fn test_removed_match_never_resurfaces() {
        let mut f = Fixture::new();
        let query = f.query("(let_declaration pattern: (identifier) @name value: (_) @value)");
        f.exec(&query);

        let first = f.next_capture();
        let id = f.field(&first, "id");
        f.env
            .call("tree-sitter-query-cursor-remove-match", &[f.cursor.clone(), id.clone()])
            .unwrap();

        let mut remaining = Vec::new();
        loop {
            let result = f.next_capture();
            if result.is_nil() {
                break;
            }
            assert!(!f.field(&result, "id").eq(&id));
            remaining.push(f.node_text(&result));
        }
        assert_eq!(remaining, vec!["b", "a"]);
    }

    #[test]
    fn test_remove_unknown_match_is_noop() {
        let mut f = Fixture::new();
        let query = f.query("(identifier) @id");
        f.exec(&query);
        for id in [9999, -1] {
            f.env
                .call("tree-sitter-query-cursor-remove-match", &[f.cursor.clone(), Value::Int(id)])
                .unwrap();
        }
        assert_eq!(f.drain_texts("tree-sitter-query-cursor-next-match").len(), 4);
    }

    #[test]
    fn test_byte_range_is_one_based() {
        let mut f = Fixture::new();
        let query = f.query("(identifier) @id");
        // Bytes 22..35 (0-based) cover "let b = a; }"
        f.env
            .call(
                "tree-sitter-query-cursor-set-byte-range",
                &[f.cursor.clone(), Value::Int(23), Value::Int(36)],
            )
            .unwrap();
        f.exec(&query);

        let mut starts = Vec::new();
        loop {
            let result = f.next_match();
            if result.is_nil() {
                break;
            }
            let node = f.field(&result, "node");
            let start = f.env.call("tree-sitter-node-start-byte", &[node.clone()]).unwrap();
            let end = f.env.call("tree-sitter-node-end-byte", &[node]).unwrap();
            assert!(start.as_int().unwrap() >= 23 && end.as_int().unwrap() <= 36);
            starts.push(start.as_int().unwrap());
        }
        assert_eq!(starts, vec![28, 32]);
    }

    #[test]
    fn test_point_range_uses_both_points() {
        let mut f = Fixture::new();
        let query = f.query("(identifier) @id");
        // Row 1, columns 0..9 cover "fn main()"
        let start = Value::cons(Value::Int(1), Value::Int(0));
        let end = Value::cons(Value::Int(1), Value::Int(9));
        f.env
            .call("tree-sitter-query-cursor-set-point-range", &[f.cursor.clone(), start, end])
            .unwrap();
        f.exec(&query);
        assert_eq!(f.drain_texts("tree-sitter-query-cursor-next-match"), vec!["main"]);
    }

    #[test]
    fn test_capture_less_pattern_has_nil_node() {
        let mut f = Fixture::new();
        let query = f.query("(integer_literal)");
        f.exec(&query);
        let result = f.next_match();
        assert_eq!(f.field(&result, "capture-count").as_int(), Some(0));
        assert!(f.field(&result, "node").is_nil());
    }

    #[test]
    fn test_text_predicates_see_source() {
        let mut f = Fixture::new();
        let query = f.query(r#"((identifier) @id (#eq? @id "a"))"#);
        f.exec(&query);
        assert_eq!(f.drain_texts("tree-sitter-query-cursor-next-match"), vec!["a", "a"]);
    }

    #[test]
    fn test_wrong_type_leaves_cursor_untouched() {
        let mut f = Fixture::new();
        let query = f.query("(identifier) @id");
        f.exec(&query);
        let first = f.next_match();
        assert_eq!(f.node_text(&first), "main");

        // Cursor and query swapped: nothing is rebound
        let args = [query.clone(), f.cursor.clone(), f.root.clone()];
        let err = f.env.call("tree-sitter-query-cursor-exec", &args).unwrap_err();
        assert_eq!(err.symbol.name(), "wrong-type-argument");
        assert_eq!(err.data[0].to_string(), "tree-sitter-query-cursor-p");

        let args = [f.cursor.clone(), f.lang.clone(), f.root.clone()];
        let err = f.env.call("tree-sitter-query-cursor-exec", &args).unwrap_err();
        assert_eq!(err.data[0].to_string(), "tree-sitter-query-p");

        for function in [
            "tree-sitter-query-cursor-next-match",
            "tree-sitter-query-cursor-next-capture",
        ] {
            let err = f.env.call(function, &[query.clone()]).unwrap_err();
            assert_eq!(err.symbol.name(), "wrong-type-argument");
        }

        // The first execution continues where it left off
        let second = f.next_match();
        assert_eq!(f.node_text(&second), "a");
    }

    #[test]
    fn test_cursor_predicate() {
        let mut f = Fixture::new();
        let query = f.query("(identifier) @id");
        let cursor = f.cursor.clone();
        assert!(f.env.call("tree-sitter-query-cursor-p", &[cursor]).unwrap().eq(&Value::T));
        assert!(f.env.call("tree-sitter-query-cursor-p", &[query]).unwrap().is_nil());
        assert!(f.env.call("tree-sitter-query-cursor-p", &[Value::Int(1)]).unwrap().is_nil());
    }

    #[test]
    fn test_reclaimed_query_fails_closed() {
        let mut f = Fixture::new();
        let query = f.query("(identifier) @id");
        f.exec(&query);
        drop(query);
        let err = f.next("tree-sitter-query-cursor-next-match").unwrap_err();
        assert_eq!(err.symbol.name(), "tree-sitter-error");
    }

    #[test]
    fn test_results_outlive_the_cursor() {
        let mut f = Fixture::new();
        let query = f.query("(integer_literal) @n");
        f.exec(&query);
        let result = f.next_match();
        let cursor = std::mem::replace(&mut f.cursor, Value::Nil);
        drop(cursor);
        assert_eq!(f.node_text(&result), "1");
    }

    #[test]
    fn test_state_machine() {
        let mut cursor = Cursor::new(None);
        assert_eq!(cursor.state(), CursorState::Idle);
        assert!(cursor.next_match().unwrap().is_none());
        assert_eq!(cursor.state(), CursorState::Idle);

        let lang: tree_sitter::Language = tree_sitter_rust::LANGUAGE.into();
        let query = Rc::new(CompiledQuery::compile(&lang, "rust", "(identifier) @id").unwrap());
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&lang).unwrap();
        let tree = parser.parse(SOURCE, None).unwrap();
        let tree = Rc::new(SyntaxTree::new(tree, SOURCE.to_string(), "rust"));
        let root = NodeRef::root(Rc::clone(&tree));

        cursor.exec(&query, &root);
        assert_eq!(cursor.state(), CursorState::Bound);
        let first = cursor.next_match().unwrap().unwrap();
        assert_eq!(cursor.state(), CursorState::Iterating);
        assert_eq!(first.node.unwrap().text().unwrap(), "main");
        while cursor.next_match().unwrap().is_some() {}
        assert_eq!(cursor.state(), CursorState::Exhausted);
        cursor.exec(&query, &root);
        assert_eq!(cursor.state(), CursorState::Bound);
    }

    fn bound_cursor(source: &str) -> (Cursor, Rc<CompiledQuery>, NodeRef) {
        let lang: tree_sitter::Language = tree_sitter_rust::LANGUAGE.into();
        let query = Rc::new(CompiledQuery::compile(&lang, "rust", source).unwrap());
        let tree = crate::bridge::grammar::parse(&lang, "rust", SOURCE).unwrap();
        let root = NodeRef::root(Rc::new(tree));
        let mut cursor = Cursor::new(None);
        cursor.exec(&query, &root);
        (cursor, query, root)
    }

    fn texts(results: impl IntoIterator<Item = MatchResult>) -> Vec<String> {
        results
            .into_iter()
            .map(|r| r.node.unwrap().text().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_remove_before_first_pull_is_noop() {
        let mut f = Fixture::new();
        let query = f.query("(identifier) @id");
        f.exec(&query);
        for id in 0..4 {
            f.env
                .call("tree-sitter-query-cursor-remove-match", &[f.cursor.clone(), Value::Int(id)])
                .unwrap();
        }
        assert_eq!(
            f.drain_texts("tree-sitter-query-cursor-next-match"),
            vec!["main", "a", "b", "a"]
        );
    }

    #[test]
    fn test_remove_unreached_match_is_noop() {
        let (mut cursor, _query, _root) = bound_cursor("(identifier) @id");
        let first = cursor.next_match().unwrap().unwrap();
        assert_eq!(texts([first]), vec!["main"]);

        let unreached = cursor.traversal.as_ref().unwrap().matches[2].id;
        cursor.remove_match(unreached);

        let rest: Vec<_> = std::iter::from_fn(|| cursor.next_match().unwrap()).collect();
        assert_eq!(texts(rest), vec!["a", "b", "a"]);
    }

    #[test]
    fn test_remove_fully_returned_match_is_noop() {
        let (mut cursor, _query, _root) = bound_cursor("(identifier) @id");
        let first = cursor.next_match().unwrap().unwrap();
        cursor.remove_match(first.id);
        let rest: Vec<_> = std::iter::from_fn(|| cursor.next_match().unwrap()).collect();
        assert_eq!(rest.len(), 3);
    }

    #[test]
    fn test_interleaved_pulls_never_repeat() {
        let mut f = Fixture::new();
        let query = f.query("(identifier) @id");
        f.exec(&query);

        let mut seen = Vec::new();
        for function in [
            "tree-sitter-query-cursor-next-match",
            "tree-sitter-query-cursor-next-capture",
            "tree-sitter-query-cursor-next-match",
            "tree-sitter-query-cursor-next-capture",
        ] {
            let result = f.next(function).unwrap();
            seen.push(f.node_text(&result));
        }
        assert_eq!(seen, vec!["main", "a", "b", "a"]);
        assert!(f.next_capture().is_nil());
        assert!(f.next_match().is_nil());
    }

    #[test]
    fn test_match_pull_skips_partly_captured_match() {
        let (mut cursor, _query, _root) =
            bound_cursor("(let_declaration pattern: (identifier) @name value: (_) @value)");

        let first = cursor.next_capture().unwrap().unwrap();
        let first_id = first.id;
        assert_eq!(texts([first]), vec!["a"]);

        // The first let is in flight, so the match pull moves on to the second
        let second = cursor.next_match().unwrap().unwrap();
        assert_ne!(second.id, first_id);
        assert_eq!(texts([second]), vec!["b"]);

        // The remaining capture of the first let is still delivered once
        let third = cursor.next_capture().unwrap().unwrap();
        assert_eq!(third.id, first_id);
        assert_eq!(texts([third]), vec!["1"]);
        assert!(cursor.next_capture().unwrap().is_none());
        assert_eq!(cursor.state(), CursorState::Exhausted);
    }
}
