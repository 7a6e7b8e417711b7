//! Per-method radix tree.
//!
//! # Shape
//!
//! Every registered pattern is cut into static text and wildcard tokens.
//! Static text is stored compressed: a node holds the longest prefix its
//! descendants share, and is split in two when a new pattern diverges halfway
//! through it. Wildcards get their own nodes hanging off the static node that
//! ends in `/`:
//!
//! ```text
//! GET /users/:id          ""
//! GET /users/:id/posts     └─ "/users/"            priority 4
//! GET /users/new              ├─ "new"             priority 1
//! GET /usage                  ├─ :id               priority 2
//!                             │   └─ "/posts"      priority 1
//!                             ...
//! ```
//!
//! # Matching order
//!
//! At each node the walk probes, in order:
//!
//! 1. the static child whose prefix the remaining path starts with (at most
//!    one can, since siblings never share a first character);
//! 2. the param child, which consumes up to the next `/` and must capture at
//!    least one byte;
//! 3. the catch-all child, which consumes everything left, `/` included.
//!
//! A static branch that dead-ends falls back to the param child, so
//! `/users/new/edit` still reaches `/users/:id/edit` when `/users/new` is a
//! sibling. The walk is read-only and allocates only when it captures a
//! parameter.

use std::mem;
use std::sync::Arc;

use crate::error::RouteError;
use crate::params::Params;

/// What a node matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Literal text.
    Static,
    /// `:name`, one non-empty segment.
    Param,
    /// `*name`, the rest of the path.
    CatchAll,
}

/// One fragment of a registered pattern.
#[derive(Clone, Debug)]
pub struct Node<T> {
    /// Static text, or the parameter name for wildcard nodes.
    prefix: Arc<str>,
    kind: NodeKind,
    /// Number of routes reachable through this node.
    priority: u32,
    /// Static children, heaviest first.
    children: Vec<Node<T>>,
    param: Option<Box<Node<T>>>,
    catch_all: Option<Box<Node<T>>>,
    value: Option<T>,
    param_names: Box<[Arc<str>]>,
}

/// Result of [`Tree::find`].
#[derive(Debug)]
pub enum Lookup<'t, T> {
    Found(Match<'t, T>),
    /// No route, but one exists for the path with a trailing `/` added or removed.
    TrailingSlash,
    NotFound,
}

/// A successful match: the route's value and what its wildcards captured.
#[derive(Debug)]
pub struct Match<'t, T> {
    pub value: &'t T,
    pub params: Params,
}

/// A radix tree over path patterns, one per HTTP method.
#[derive(Clone, Debug)]
pub struct Tree<T> {
    root: Node<T>,
    len: usize,
}

/// A pattern cut into tokens.
#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Static(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

/// Pattern under insertion, carried down for error messages.
struct Route<'a> {
    path: &'a str,
    names: Box<[Arc<str>]>,
}

impl<T> Tree<T> {
    pub fn new() -> Self {
        Self { root: Node::new(NodeKind::Static, ""), len: 0 }
    }

    /// Number of registered patterns.
    pub fn len(&self) -> usize { self.len }
    pub fn is_empty(&self) -> bool { self.len == 0 }
    pub fn root(&self) -> &Node<T> { &self.root }

    /// Adds `path` with `value`.
    ///
    /// On error the tree still matches exactly what it matched before,
    /// although a static node may have been split.
    pub fn insert(&mut self, path: &str, value: T) -> Result<(), RouteError> {
        let tokens = tokenize(path)?;
        let names = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Param(n) | Token::CatchAll(n) => Some(Arc::from(*n)),
                Token::Static(_) => None,
            })
            .collect();
        let route = Route { path, names };

        self.root.insert(&route, &tokens, value)?;
        self.len += 1;
        Ok(())
    }

    /// Looks up `path`. Never mutates the tree.
    pub fn find(&self, path: &str) -> Lookup<'_, T> {
        let mut raw = Vec::new();
        if let Some(node) = self.root.walk(path, &mut raw) {
            if let Some(value) = node.value.as_ref() {
                let mut params = Params::new();
                for (name, value) in raw {
                    params.push(Arc::clone(name), value);
                }
                return Lookup::Found(Match { value, params });
            }
        }

        if self.has_trailing_slash_twin(path) {
            Lookup::TrailingSlash
        } else {
            Lookup::NotFound
        }
    }

    /// True if `path` matches a route, ignoring captures.
    pub fn contains(&self, path: &str) -> bool {
        self.root.walk(path, &mut Vec::new()).is_some()
    }

    fn has_trailing_slash_twin(&self, path: &str) -> bool {
        match path.strip_suffix('/') {
            Some("") => false,
            Some(trimmed) => self.contains(trimmed),
            None => self.contains(&format!("{path}/")),
        }
    }
}

impl<T> Default for Tree<T> {
    fn default() -> Self { Self::new() }
}

impl<T> Node<T> {
    fn new(kind: NodeKind, prefix: &str) -> Self {
        Self {
            prefix: Arc::from(prefix),
            kind,
            priority: 0,
            children: Vec::new(),
            param: None,
            catch_all: None,
            value: None,
            param_names: Box::default(),
        }
    }

    pub fn prefix(&self) -> &str { &self.prefix }
    pub fn kind(&self) -> NodeKind { self.kind }
    pub fn priority(&self) -> u32 { self.priority }
    pub fn value(&self) -> Option<&T> { self.value.as_ref() }

    /// Parameter names from the root to this node; empty unless the node ends a route.
    pub fn param_names(&self) -> &[Arc<str>] { &self.param_names }

    /// Children in probe order: static (heaviest first), then param, then catch-all.
    pub fn children(&self) -> impl Iterator<Item = &Node<T>> {
        self.children
            .iter()
            .chain(self.param.as_deref())
            .chain(self.catch_all.as_deref())
    }

    // ── Insertion ─────────────────────────────────────────────────────────────

    /// Inserts `tokens` below this node, whose own text is already consumed.
    fn insert(&mut self, route: &Route<'_>, tokens: &[Token<'_>], value: T) -> Result<(), RouteError> {
        match tokens.split_first() {
            None => {
                if self.value.is_some() {
                    return Err(RouteError::Duplicate(route.path.to_owned()));
                }
                self.value = Some(value);
                self.param_names = route.names.clone();
            }
            Some((Token::Static(text), rest)) => self.insert_static(route, text, rest, value)?,
            Some((Token::Param(name), rest)) => {
                if self.catch_all.is_some() {
                    return Err(RouteError::CatchAllConflict(route.path.to_owned()));
                }
                match &mut self.param {
                    Some(param) if &*param.prefix != *name => {
                        return Err(RouteError::ParamConflict {
                            path: route.path.to_owned(),
                            existing: param.prefix.to_string(),
                            new: (*name).to_owned(),
                        });
                    }
                    Some(param) => param.insert(route, rest, value)?,
                    None => {
                        let mut param = Node::new(NodeKind::Param, name);
                        param.insert(route, rest, value)?;
                        self.param = Some(Box::new(param));
                    }
                }
            }
            Some((Token::CatchAll(name), _)) => {
                if let Some(existing) = &self.catch_all {
                    return Err(if &*existing.prefix == *name {
                        RouteError::Duplicate(route.path.to_owned())
                    } else {
                        RouteError::CatchAllConflict(route.path.to_owned())
                    });
                }
                if !self.children.is_empty() || self.param.is_some() {
                    return Err(RouteError::CatchAllConflict(route.path.to_owned()));
                }
                let mut catch_all = Node::new(NodeKind::CatchAll, name);
                catch_all.insert(route, &[], value)?;
                self.catch_all = Some(Box::new(catch_all));
            }
        }

        self.priority += 1;
        Ok(())
    }

    /// Inserts static `text` (then `tokens`) among this node's static children.
    fn insert_static(
        &mut self,
        route: &Route<'_>,
        text: &str,
        tokens: &[Token<'_>],
        value: T,
    ) -> Result<(), RouteError> {
        let first = text.chars().next();
        match self.children.iter().position(|c| c.prefix.chars().next() == first) {
            Some(i) => {
                let child = &mut self.children[i];
                let shared = common_prefix(&child.prefix, text);
                if shared < child.prefix.len() {
                    child.split(shared);
                }
                if shared == text.len() {
                    child.insert(route, tokens, value)?;
                } else {
                    child.insert_static(route, &text[shared..], tokens, value)?;
                    child.priority += 1;
                }
            }
            None => {
                if self.catch_all.is_some() {
                    return Err(RouteError::CatchAllConflict(route.path.to_owned()));
                }
                let mut child = Node::new(NodeKind::Static, text);
                child.insert(route, tokens, value)?;
                self.children.push(child);
            }
        }

        self.children.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then_with(|| a.prefix.cmp(&b.prefix))
        });
        Ok(())
    }

    /// Cuts this static node after `at` bytes; the tail keeps everything below.
    fn split(&mut self, at: usize) {
        let tail = Node {
            prefix: Arc::from(&self.prefix[at..]),
            kind: NodeKind::Static,
            priority: self.priority,
            children: mem::take(&mut self.children),
            param: self.param.take(),
            catch_all: self.catch_all.take(),
            value: self.value.take(),
            param_names: mem::take(&mut self.param_names),
        };
        self.prefix = Arc::from(&self.prefix[..at]);
        self.children = vec![tail];
    }

    // ── Matching ──────────────────────────────────────────────────────────────

    /// Walks `rest`, the path left after this node's own text.
    ///
    /// Returns the node that ends the route. When it returns `None`, `raw` is
    /// exactly as it was on entry.
    fn walk<'t, 'p>(
        &'t self,
        rest: &'p str,
        raw: &mut Vec<(&'t Arc<str>, &'p str)>,
    ) -> Option<&'t Self> {
        if rest.is_empty() && self.value.is_some() {
            return Some(self);
        }

        if !rest.is_empty() {
            for child in &self.children {
                if let Some(tail) = rest.strip_prefix(&*child.prefix) {
                    if let Some(hit) = child.walk(tail, raw) {
                        return Some(hit);
                    }
                    break;
                }
            }

            if let Some(param) = &self.param {
                let end = rest.find('/').unwrap_or(rest.len());
                if end > 0 {
                    raw.push((&param.prefix, &rest[..end]));
                    if let Some(hit) = param.walk(&rest[end..], raw) {
                        return Some(hit);
                    }
                    raw.pop();
                }
            }
        }

        if let Some(catch_all) = &self.catch_all {
            raw.push((&catch_all.prefix, rest));
            return Some(catch_all);
        }

        None
    }
}

/// Byte length of the longest common prefix, on a char boundary.
fn common_prefix(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|&((_, x), y)| x != y)
        .map_or_else(|| a.len().min(b.len()), |((i, _), _)| i)
}

/// Validates `path` and returns the names of its wildcards, in order.
pub fn pattern_params(path: &str) -> Result<Vec<&str>, RouteError> {
    Ok(tokenize(path)?
        .into_iter()
        .filter_map(|t| match t {
            Token::Param(name) | Token::CatchAll(name) => Some(name),
            Token::Static(_) => None,
        })
        .collect())
}

/// Cuts a pattern into static text and wildcard tokens, validating it.
fn tokenize(path: &str) -> Result<Vec<Token<'_>>, RouteError> {
    if path.is_empty() {
        return Err(RouteError::Empty);
    }
    if !path.starts_with('/') {
        return Err(RouteError::MissingLeadingSlash(path.to_owned()));
    }

    let bytes = path.as_bytes();
    let mut tokens = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let marker = bytes[i];
        if marker != b':' && marker != b'*' {
            i += 1;
            continue;
        }
        // i > 0: byte 0 is '/'
        if bytes[i - 1] != b'/' {
            return Err(RouteError::MisplacedWildcard { path: path.to_owned(), at: i });
        }
        if start < i {
            tokens.push(Token::Static(&path[start..i]));
        }

        let end = path[i + 1..].find('/').map_or(bytes.len(), |o| i + 1 + o);
        let name = &path[i + 1..end];
        if name.is_empty() || name.contains([':', '*']) {
            return Err(RouteError::InvalidParamName { path: path.to_owned(), at: i });
        }
        if seen.contains(&name) {
            return Err(RouteError::DuplicateParamName {
                path: path.to_owned(),
                name: name.to_owned(),
            });
        }
        seen.push(name);

        if marker == b'*' {
            if end != bytes.len() {
                return Err(RouteError::CatchAllNotLast(path.to_owned()));
            }
            tokens.push(Token::CatchAll(name));
        } else {
            tokens.push(Token::Param(name));
        }
        start = end;
        i = end;
    }

    if start < bytes.len() {
        tokens.push(Token::Static(&path[start..]));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(routes: &[&'static str]) -> Tree<&'static str> {
        let mut tree = Tree::new();
        for route in routes {
            tree.insert(route, *route)
                .unwrap_or_else(|e| panic!("insert {route}: {e}"));
        }
        tree
    }

    /// Matched route and its params as `name=value` strings.
    fn hit(tree: &Tree<&'static str>, path: &str) -> Option<(&'static str, Vec<String>)> {
        match tree.find(path) {
            Lookup::Found(m) => Some((
                *m.value,
                m.params.iter().map(|p| format!("{}={}", p.name(), p.value())).collect(),
            )),
            _ => None,
        }
    }

    #[test]
    fn static_routes_match_exactly_with_no_params() {
        let routes = ["/", "/about", "/about/team", "/abort", "/contact", "/a"];
        let t = tree(&routes);
        for route in routes {
            assert_eq!(hit(&t, route), Some((route, vec![])), "{route}");
        }
        assert_eq!(t.len(), routes.len());
        assert!(hit(&t, "/abou").is_none());
        assert!(hit(&t, "/about/teams").is_none());
    }

    #[test]
    fn named_param_captures_one_segment() {
        let t = tree(&["/users/:id"]);
        assert_eq!(hit(&t, "/users/42"), Some(("/users/:id", vec!["id=42".into()])));
        assert!(hit(&t, "/users/42/posts").is_none());
        assert!(matches!(t.find("/users/"), Lookup::NotFound));
    }

    #[test]
    fn params_are_ordered_as_captured() {
        let t = tree(&["/repos/:owner/:repo/issues/:number"]);
        let (_, params) = hit(&t, "/repos/rust-lang/rust/issues/1").unwrap();
        assert_eq!(params, ["owner=rust-lang", "repo=rust", "number=1"]);
    }

    #[test]
    fn catch_all_takes_the_rest_including_slashes() {
        let t = tree(&["/files/*rest"]);
        assert_eq!(hit(&t, "/files/a/b/c"), Some(("/files/*rest", vec!["rest=a/b/c".into()])));
        assert_eq!(hit(&t, "/files/"), Some(("/files/*rest", vec!["rest=".into()])));
        assert!(matches!(t.find("/files"), Lookup::TrailingSlash));
    }

    #[test]
    fn static_beats_param_regardless_of_registration_order() {
        let forward = tree(&["/users/:id", "/users/new", "/users/:id/edit"]);
        let backward = tree(&["/users/:id/edit", "/users/new", "/users/:id"]);

        for t in [&forward, &backward] {
            assert_eq!(hit(t, "/users/new"), Some(("/users/new", vec![])));
            assert_eq!(hit(t, "/users/42"), Some(("/users/:id", vec!["id=42".into()])));
            assert_eq!(hit(t, "/users/newbie"), Some(("/users/:id", vec!["id=newbie".into()])));
            // static branch dead-ends, walk falls back to the param
            assert_eq!(
                hit(t, "/users/new/edit"),
                Some(("/users/:id/edit", vec!["id=new".into()]))
            );
        }
    }

    #[test]
    fn trailing_slash_mismatch_is_reported() {
        let t = tree(&["/profile", "/settings/"]);
        assert!(matches!(t.find("/profile/"), Lookup::TrailingSlash));
        assert!(matches!(t.find("/settings"), Lookup::TrailingSlash));
        assert!(matches!(t.find("/nowhere"), Lookup::NotFound));
        assert!(matches!(Tree::<()>::new().find("/"), Lookup::NotFound));
    }

    #[test]
    fn conflicting_param_names_fail() {
        let mut t = tree(&["/users/:id"]);
        assert_eq!(
            t.insert("/users/:name", "x"),
            Err(RouteError::ParamConflict {
                path: "/users/:name".into(),
                existing: "id".into(),
                new: "name".into(),
            })
        );
        assert_eq!(hit(&t, "/users/1"), Some(("/users/:id", vec!["id=1".into()])));
    }

    #[test]
    fn catch_all_has_no_siblings() {
        let mut t = tree(&["/static/*path"]);
        assert!(matches!(t.insert("/static/app.js", "x"), Err(RouteError::CatchAllConflict(_))));
        assert!(matches!(t.insert("/static/:file", "x"), Err(RouteError::CatchAllConflict(_))));
        assert!(matches!(t.insert("/static/*other", "x"), Err(RouteError::CatchAllConflict(_))));

        let mut t = tree(&["/static/app.js"]);
        assert!(matches!(t.insert("/static/*path", "x"), Err(RouteError::CatchAllConflict(_))));

        // diverging before the slash is not a sibling
        let t = tree(&["/static/*path", "/statistics", "/static"]);
        assert_eq!(hit(&t, "/statistics"), Some(("/statistics", vec![])));
        assert_eq!(hit(&t, "/static"), Some(("/static", vec![])));
        assert_eq!(hit(&t, "/static/x/y"), Some(("/static/*path", vec!["path=x/y".into()])));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut t = tree(&["/a/:b", "/files/*p"]);
        assert_eq!(t.insert("/a/:b", "x"), Err(RouteError::Duplicate("/a/:b".into())));
        assert_eq!(t.insert("/files/*p", "x"), Err(RouteError::Duplicate("/files/*p".into())));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn malformed_patterns_fail() {
        let mut t = Tree::new();
        assert_eq!(t.insert("", ()), Err(RouteError::Empty));
        assert!(matches!(t.insert("users", ()), Err(RouteError::MissingLeadingSlash(_))));
        assert!(matches!(t.insert("/files/*rest/x", ()), Err(RouteError::CatchAllNotLast(_))));
        assert!(matches!(t.insert("/v:version", ()), Err(RouteError::MisplacedWildcard { .. })));
        assert!(matches!(t.insert("/users/:", ()), Err(RouteError::InvalidParamName { .. })));
        assert!(matches!(t.insert("/users/:a:b", ()), Err(RouteError::InvalidParamName { .. })));
        assert!(matches!(t.insert("/x/:id/y/:id", ()), Err(RouteError::DuplicateParamName { .. })));
        assert!(t.is_empty());
    }

    #[test]
    fn priority_counts_routes_and_orders_siblings() {
        let t = tree(&["/a", "/b/1", "/b/2", "/b/3", "/c/1", "/c/2"]);
        let top = t.root().children().next().unwrap();
        assert_eq!(top.prefix(), "/");
        assert_eq!(top.priority(), 6);

        let order: Vec<_> = top.children().map(|c| (c.prefix(), c.priority())).collect();
        assert_eq!(order, [("b/", 3), ("c/", 2), ("a", 1)]);
    }

    #[test]
    fn terminal_nodes_record_param_names() {
        let t = tree(&["/orgs/:org/members/*rest"]);
        let mut node = t.root();
        while let Some(next) = node.children().next() {
            node = next;
        }
        assert_eq!(node.kind(), NodeKind::CatchAll);
        let names: Vec<&str> = node.param_names().iter().map(|n| &**n).collect();
        assert_eq!(names, ["org", "rest"]);
    }

    #[test]
    fn splits_respect_multibyte_characters() {
        let t = tree(&["/café", "/cafè", "/caff"]);
        assert_eq!(hit(&t, "/café"), Some(("/café", vec![])));
        assert_eq!(hit(&t, "/cafè"), Some(("/cafè", vec![])));
        assert_eq!(hit(&t, "/caff"), Some(("/caff", vec![])));
    }

    #[test]
    fn tokenizer_cuts_static_and_wildcards() {
        assert_eq!(
            tokenize("/a/:b/c/*d").unwrap(),
            [Token::Static("/a/"), Token::Param("b"), Token::Static("/c/"), Token::CatchAll("d")]
        );
        assert_eq!(tokenize("/").unwrap(), [Token::Static("/")]);
        assert_eq!(pattern_params("/a/:b/c/*d").unwrap(), ["b", "d"]);
        assert!(pattern_params("nope").is_err());
    }
}
