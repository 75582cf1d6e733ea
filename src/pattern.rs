
use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

use seahash::SeaHasher;

use crate::datatype::Literal;
use crate::error::{FragstreamError, Result};

// ------------- Hashers -------------
// Variable names and nodes are not integers, so use the fast seahash.
pub type TermHasher = BuildHasherDefault<SeaHasher>;

// ------------- Node -------------
/// A concrete term: an IRI or a typed literal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    Iri(Arc<str>),
    Literal(Literal),
}

impl Node {
    pub fn iri(iri: impl AsRef<str>) -> Self {
        Node::Iri(Arc::from(iri.as_ref()))
    }
    pub fn literal(literal: impl Into<Literal>) -> Self {
        Node::Literal(literal.into())
    }
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Node::Iri(iri) => Some(iri),
            _ => None,
        }
    }
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Node::Literal(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Node::Iri(iri) => write!(f, "<{}>", iri),
            Node::Literal(l) => write!(f, "{}", l),
        }
    }
}

// ------------- Term -------------
/// One position of a pattern: a named variable or a concrete node.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    Var(Arc<str>),
    Node(Node),
}

impl Term {
    pub fn var(name: impl AsRef<str>) -> Self {
        Term::Var(Arc::from(name.as_ref()))
    }
    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }
    pub fn is_bound(&self) -> bool {
        !self.is_var()
    }
    pub fn as_var(&self) -> Option<&str> {
        match self {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Term::Node(n) => Some(n),
            _ => None,
        }
    }
    // Substitute the term if the solution binds it.
    fn resolve(&self, solution: &Solution) -> Term {
        match self {
            Term::Var(v) => match solution.get(v) {
                Some(node) => Term::Node(node.clone()),
                None => self.clone(),
            },
            Term::Node(_) => self.clone(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "?{}", v),
            Term::Node(n) => write!(f, "{}", n),
        }
    }
}

impl From<Node> for Term {
    fn from(node: Node) -> Self { Term::Node(node) }
}

// ------------- Triple -------------
/// A fully grounded pattern, as delivered to stream consumers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Triple {
    pub s: Node,
    pub p: Node,
    pub o: Node,
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.s, self.p, self.o)
    }
}

// ------------- Pattern -------------
/// A templated query fragment with zero or more free variables.
///
/// Patterns are immutable; substitution produces new patterns. Streams hold
/// their pattern by value and never mutate it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pattern {
    pub s: Term,
    pub p: Term,
    pub o: Term,
}

impl Pattern {
    pub fn new(s: Term, p: Term, o: Term) -> Self {
        Self { s, p, o }
    }

    /// The variable names in this pattern, in s, p, o order.
    pub fn variables(&self) -> Vec<&str> {
        let mut vars = Vec::with_capacity(3);
        for term in [&self.s, &self.p, &self.o] {
            if let Term::Var(v) = term {
                vars.push(v.as_ref());
            }
        }
        vars
    }

    pub fn is_bound(&self) -> bool {
        self.s.is_bound() && self.p.is_bound() && self.o.is_bound()
    }

    /// Substitute every variable the solution binds, producing a pattern
    /// with fewer (or no) free variables.
    pub fn apply(&self, solution: &Solution) -> Pattern {
        Pattern {
            s: self.s.resolve(solution),
            p: self.p.resolve(solution),
            o: self.o.resolve(solution),
        }
    }

    /// Substitute a single variable.
    pub fn bind_var(&self, name: &str, node: &Node) -> Pattern {
        let mut solution = Solution::new();
        solution.insert(name, node.clone());
        self.apply(&solution)
    }

    /// Ground the pattern into a triple. Every free variable must be bound
    /// by the solution; a source handing back a solution that cannot ground
    /// its own pattern has broken the read contract.
    pub fn ground(&self, solution: &Solution) -> Result<Triple> {
        let grounded = self.apply(solution);
        match (grounded.s, grounded.p, grounded.o) {
            (Term::Node(s), Term::Node(p), Term::Node(o)) => Ok(Triple { s, p, o }),
            _ => Err(FragstreamError::Protocol(format!(
                "solution {} does not ground pattern {}",
                solution, self
            ))),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.s, self.p, self.o)
    }
}

// ------------- Solution -------------
/// A variable → node mapping produced by a source for one pattern match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Solution {
    bindings: HashMap<Arc<str>, Node, TermHasher>,
}

impl Solution {
    pub fn new() -> Self {
        Self { bindings: HashMap::default() }
    }
    pub fn insert(&mut self, name: impl AsRef<str>, node: Node) {
        self.bindings.insert(Arc::from(name.as_ref()), node);
    }
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.bindings.get(name)
    }
    pub fn len(&self) -> usize {
        self.bindings.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.bindings.iter().map(|(k, v)| (k.as_ref(), v))
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = String::new();
        for (name, node) in self.bindings.iter() {
            s += &format!("?{}={},", name, node);
        }
        s.pop();
        write!(f, "{{{}}}", s)
    }
}
