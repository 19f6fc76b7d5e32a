//! Trees and node references
//!
//! A parsed tree is owned by its `tree-sitter-tree` handle together with the
//! text it was parsed from. Node handles cannot hold a borrowed
//! `tree_sitter::Node`, so a node is stored as its tree owner plus the path
//! of child indices leading to it from the root. Re-homing a native node
//! under a tree owner means recording that path against the owner.

use super::handle::{self, HandleKind};
use super::{Context, SubrSpec, marshal};
use crate::host::{Env, Value};
use crate::{Error, Result};
use std::rc::Rc;
use tree_sitter::Node;

/// A parsed tree and its source text
pub struct SyntaxTree {
    tree: tree_sitter::Tree,
    source: String,
    language: String,
}

impl SyntaxTree {
    pub fn new(tree: tree_sitter::Tree, source: String, language: impl Into<String>) -> Self {
        Self {
            tree,
            source,
            language: language.into(),
        }
    }

    pub fn tree(&self) -> &tree_sitter::Tree {
        &self.tree
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Walk `path` from the root
    pub fn resolve(&self, path: &[usize]) -> Option<Node<'_>> {
        path.iter()
            .try_fold(self.tree.root_node(), |node, &index| node.child(index))
    }
}

/// Child-index path from the root of `node`'s tree to `node`
pub fn path_of(node: Node<'_>) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = node;
    while let Some(parent) = current.parent() {
        let index = (0..parent.child_count())
            .find(|&i| parent.child(i).is_some_and(|child| child.id() == current.id()))
            .unwrap_or(0);
        path.push(index);
        current = parent;
    }
    path.reverse();
    path
}

/// Payload of a `tree-sitter-tree` handle
pub struct TreeHandle {
    inner: Rc<SyntaxTree>,
}

impl TreeHandle {
    pub fn new(tree: SyntaxTree) -> Self {
        Self { inner: Rc::new(tree) }
    }

    pub fn inner(&self) -> &Rc<SyntaxTree> {
        &self.inner
    }
}

/// Payload of a `tree-sitter-node` handle.
///
/// Holding a node keeps its tree alive.
#[derive(Clone)]
pub struct NodeRef {
    tree: Rc<SyntaxTree>,
    path: Vec<usize>,
}

impl NodeRef {
    pub fn new(tree: Rc<SyntaxTree>, path: Vec<usize>) -> Self {
        Self { tree, path }
    }

    /// The root node of `tree`
    pub fn root(tree: Rc<SyntaxTree>) -> Self {
        Self::new(tree, Vec::new())
    }

    pub fn tree(&self) -> &Rc<SyntaxTree> {
        &self.tree
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// The native node this reference points at
    pub fn node(&self) -> Result<Node<'_>> {
        self.tree
            .resolve(&self.path)
            .ok_or(Error::Released("tree-sitter-node"))
    }

    /// Source text covered by the node
    pub fn text(&self) -> Result<&str> {
        let node = self.node()?;
        node.utf8_text(self.tree.source().as_bytes())
            .map_err(|e| Error::Parse(format!("node text is not UTF-8: {}", e)))
    }
}

/// Build a host node value for `path` under the tree owner `tree`
pub fn rehome(env: &mut Env, ctx: &Context, tree: &Rc<SyntaxTree>, path: Vec<usize>) -> Result<Value> {
    handle::wrap(env, ctx, HandleKind::Node, NodeRef::new(Rc::clone(tree), path))
}

/// Extract the tree behind a tree handle
pub fn extract_tree(ctx: &Context, value: &Value) -> Result<Rc<SyntaxTree>> {
    let ptr = handle::extract(ctx, value, HandleKind::Tree)?;
    let tree = handle::borrow::<TreeHandle>(&ptr, value, HandleKind::Tree)?;
    Ok(Rc::clone(tree.inner()))
}

/// Extract a node reference
pub fn extract_node(ctx: &Context, value: &Value) -> Result<NodeRef> {
    let ptr = handle::extract(ctx, value, HandleKind::Node)?;
    let node = handle::borrow::<NodeRef>(&ptr, value, HandleKind::Node)?;
    Ok(node.clone())
}

fn tree_p(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    Ok(Value::boolean(handle::is_handle(ctx, &args[0], HandleKind::Tree)))
}

fn node_p(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    Ok(Value::boolean(handle::is_handle(ctx, &args[0], HandleKind::Node)))
}

fn tree_root_node(env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let tree = extract_tree(ctx, &args[0])?;
    rehome(env, ctx, &tree, Vec::new())
}

fn node_type(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let node = extract_node(ctx, &args[0])?;
    let kind = node.node()?.kind();
    Ok(Value::from(kind))
}

fn node_start_byte(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let node = extract_node(ctx, &args[0])?;
    let start = node.node()?.start_byte();
    Ok(marshal::make_position(start))
}

fn node_end_byte(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let node = extract_node(ctx, &args[0])?;
    let end = node.node()?.end_byte();
    Ok(marshal::make_position(end))
}

fn node_start_point(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let node = extract_node(ctx, &args[0])?;
    let point = node.node()?.start_position();
    Ok(marshal::make_point(point))
}

fn node_end_point(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let node = extract_node(ctx, &args[0])?;
    let point = node.node()?.end_position();
    Ok(marshal::make_point(point))
}

fn node_text(_env: &mut Env, ctx: &Context, args: &[Value]) -> Result<Value> {
    let node = extract_node(ctx, &args[0])?;
    Ok(Value::from(node.text()?))
}

pub(crate) const FUNCTIONS: &[SubrSpec] = &[
    SubrSpec {
        name: "tree-sitter-tree-p",
        min_args: 1,
        max_args: 1,
        doc: "Return t if OBJECT is a tree-sitter-tree.\n\n(fn OBJECT)",
        body: tree_p,
    },
    SubrSpec {
        name: "tree-sitter-tree-root-node",
        min_args: 1,
        max_args: 1,
        doc: "Return the root node of TREE.\n\n(fn TREE)",
        body: tree_root_node,
    },
    SubrSpec {
        name: "tree-sitter-node-p",
        min_args: 1,
        max_args: 1,
        doc: "Return t if OBJECT is a tree-sitter-node.\n\n(fn OBJECT)",
        body: node_p,
    },
    SubrSpec {
        name: "tree-sitter-node-type",
        min_args: 1,
        max_args: 1,
        doc: "Return the grammar type of NODE as a string.\n\n(fn NODE)",
        body: node_type,
    },
    SubrSpec {
        name: "tree-sitter-node-start-byte",
        min_args: 1,
        max_args: 1,
        doc: "Return the position where NODE starts.\n\n(fn NODE)",
        body: node_start_byte,
    },
    SubrSpec {
        name: "tree-sitter-node-end-byte",
        min_args: 1,
        max_args: 1,
        doc: "Return the position just after NODE ends.\n\n(fn NODE)",
        body: node_end_byte,
    },
    SubrSpec {
        name: "tree-sitter-node-start-point",
        min_args: 1,
        max_args: 1,
        doc: "Return the (ROW . COLUMN) where NODE starts.\n\n(fn NODE)",
        body: node_start_point,
    },
    SubrSpec {
        name: "tree-sitter-node-end-point",
        min_args: 1,
        max_args: 1,
        doc: "Return the (ROW . COLUMN) where NODE ends.\n\n(fn NODE)",
        body: node_end_point,
    },
    SubrSpec {
        name: "tree-sitter-node-text",
        min_args: 1,
        max_args: 1,
        doc: "Return the source text covered by NODE.\n\n(fn NODE)",
        body: node_text,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::{load_rust, loaded, parse};

    const SOURCE: &str = "fn main() {\n    let answer = 42;\n}\n";

    #[test]
    fn test_path_roundtrip() {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&tree_sitter_rust::LANGUAGE.into()).unwrap();
        let tree = parser.parse(SOURCE, None).unwrap();
        let syntax = SyntaxTree::new(tree, SOURCE.to_string(), "rust");

        let root = syntax.tree().root_node();
        let literal = root.descendant_for_byte_range(29, 31).unwrap();
        assert_eq!(literal.kind(), "integer_literal");

        let path = path_of(literal);
        let resolved = syntax.resolve(&path).unwrap();
        assert_eq!(resolved.id(), literal.id());
        assert!(path_of(root).is_empty());
    }

    #[test]
    fn test_node_functions() {
        let (mut env, _module) = loaded();
        let lang = load_rust(&mut env);
        let tree = parse(&mut env, &lang, SOURCE);
        let root = env.call("tree-sitter-tree-root-node", &[tree]).unwrap();

        assert!(env.call("tree-sitter-node-p", &[root.clone()]).unwrap().eq(&Value::T));
        assert_eq!(
            env.call("tree-sitter-node-type", &[root.clone()]).unwrap().as_str(),
            Some("source_file")
        );
        assert_eq!(env.call("tree-sitter-node-start-byte", &[root.clone()]).unwrap().as_int(), Some(1));
        assert_eq!(
            env.call("tree-sitter-node-end-byte", &[root.clone()]).unwrap().as_int(),
            Some(SOURCE.len() as i64 + 1)
        );
        assert_eq!(
            env.call("tree-sitter-node-start-point", &[root.clone()]).unwrap().to_string(),
            "(1 . 0)"
        );
        assert_eq!(env.call("tree-sitter-node-text", &[root]).unwrap().as_str(), Some(SOURCE));
    }

    #[test]
    fn test_node_keeps_tree_alive() {
        let (mut env, module) = loaded();
        let lang = load_rust(&mut env);
        let tree = parse(&mut env, &lang, SOURCE);
        let root = env.call("tree-sitter-tree-root-node", &[tree.clone()]).unwrap();

        drop(tree);
        let node = extract_node(module.context(), &root).unwrap();
        assert_eq!(node.node().unwrap().kind(), "source_file");
    }

    #[test]
    fn test_wrong_types() {
        let (mut env, _module) = loaded();
        let lang = load_rust(&mut env);
        let err = env.call("tree-sitter-tree-root-node", &[lang.clone()]).unwrap_err();
        assert_eq!(err.data[0].to_string(), "tree-sitter-tree-p");
        let err = env.call("tree-sitter-node-text", &[lang]).unwrap_err();
        assert_eq!(err.data[0].to_string(), "tree-sitter-node-p");
    }
}
