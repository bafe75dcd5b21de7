//! Reference [`TypeOracle`] over a declared nominal type table.
//!
//! Types are written as small expressions (`Pet|NotFound|error?`) and related
//! through declared supertypes. Aliases behave as reference wrappers: the
//! oracle sees through them, and alias cycles are reported and cut.

use crate::oracle::{Marker, PrimitiveKind, TypeOracle};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

/// Nesting beyond this is treated as a self-referential alias
const MAX_SUBTYPE_DEPTH: usize = 64;

/// A type expression
///
/// Equality treats union members as a set.
#[derive(Debug, Clone)]
pub enum TypeExpr {
    /// The nil type, written `()` or `nil`
    Nil,
    /// A named type (primitive, declared or marker)
    Named(String),
    /// A union of member types
    Union(Vec<TypeExpr>),
}

impl PartialEq for TypeExpr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeExpr::Nil, TypeExpr::Nil) => true,
            (TypeExpr::Named(a), TypeExpr::Named(b)) => a == b,
            (TypeExpr::Union(a), TypeExpr::Union(b)) => {
                a.len() == b.len() && a.iter().all(|m| b.contains(m))
            }
            _ => false,
        }
    }
}

impl Eq for TypeExpr {}

impl TypeExpr {
    /// Create a named type
    pub fn named(name: impl Into<String>) -> Self {
        TypeExpr::Named(name.into())
    }

    /// `self|()`
    pub fn optional(self) -> Self {
        match self {
            TypeExpr::Union(mut members) => {
                if !members.contains(&TypeExpr::Nil) {
                    members.push(TypeExpr::Nil);
                }
                TypeExpr::Union(members)
            }
            TypeExpr::Nil => TypeExpr::Nil,
            other => TypeExpr::Union(vec![other, TypeExpr::Nil]),
        }
    }

    /// Builds a normalized union: nested unions are spliced, duplicates dropped
    pub fn union_of(members: impl IntoIterator<Item = TypeExpr>) -> Option<Self> {
        let mut flat: Vec<TypeExpr> = Vec::new();
        for member in members {
            match member {
                TypeExpr::Union(inner) => {
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }

        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(TypeExpr::Union(flat)),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TypeExpr::Nil => write!(f, "()"),
            TypeExpr::Named(name) => write!(f, "{}", name),
            TypeExpr::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    match member {
                        TypeExpr::Union(_) => write!(f, "({})", member)?,
                        _ => write!(f, "{}", member)?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Error produced when a type expression cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type expression `{input}`: {message}")]
pub struct TypeSyntaxError {
    pub input: String,
    pub message: String,
}

impl FromStr for TypeExpr {
    type Err = TypeSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeParser {
            input: s,
            chars: s.char_indices().peekable(),
        };
        let expr = parser.parse_union()?;
        parser.skip_whitespace();
        if let Some((pos, c)) = parser.chars.next() {
            return Err(parser.error(format!("unexpected `{}` at {}", c, pos)));
        }
        Ok(expr)
    }
}

/// Recursive-descent parser for `A|B?|(C|D)|()` style expressions
struct TypeParser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> TypeParser<'a> {
    fn error(&self, message: impl Into<String>) -> TypeSyntaxError {
        TypeSyntaxError {
            input: self.input.to_string(),
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if matches!(self.chars.peek(), Some((_, c)) if *c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn parse_union(&mut self) -> Result<TypeExpr, TypeSyntaxError> {
        let mut members = vec![self.parse_optional()?];
        while self.eat('|') {
            members.push(self.parse_optional()?);
        }
        TypeExpr::union_of(members).ok_or_else(|| self.error("empty union"))
    }

    fn parse_optional(&mut self) -> Result<TypeExpr, TypeSyntaxError> {
        let mut expr = self.parse_atom()?;
        while self.eat('?') {
            expr = expr.optional();
        }
        Ok(expr)
    }

    fn parse_atom(&mut self) -> Result<TypeExpr, TypeSyntaxError> {
        if self.eat('(') {
            if self.eat(')') {
                return Ok(TypeExpr::Nil);
            }
            let inner = self.parse_union()?;
            if !self.eat(')') {
                return Err(self.error("missing `)`"));
            }
            return Ok(inner);
        }

        self.skip_whitespace();
        let mut name = String::new();
        while let Some((_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | ':' | '.') {
                name.push(*c);
                self.chars.next();
            } else {
                break;
            }
        }

        match name.as_str() {
            "" => Err(self.error("expected a type name")),
            "nil" => Ok(TypeExpr::Nil),
            _ => Ok(TypeExpr::Named(name)),
        }
    }
}

/// Names bound to the well-known marker types
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MarkerNames {
    pub continuation: String,
    pub error: String,
    pub request_interceptor: String,
    pub request_error_interceptor: String,
    pub response_interceptor: String,
    pub response_error_interceptor: String,
}

impl Default for MarkerNames {
    fn default() -> Self {
        Self {
            continuation: "NextService".to_string(),
            error: "error".to_string(),
            request_interceptor: "RequestInterceptor".to_string(),
            request_error_interceptor: "RequestErrorInterceptor".to_string(),
            response_interceptor: "ResponseInterceptor".to_string(),
            response_error_interceptor: "ResponseErrorInterceptor".to_string(),
        }
    }
}

/// A declared type
#[derive(Debug, Clone, Default)]
struct Declaration {
    supertypes: Vec<String>,
    alias: Option<TypeExpr>,
}

/// Nominal type table implementing [`TypeOracle`]
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    declarations: HashMap<String, Declaration>,
    markers: MarkerNames,
}

impl TypeTable {
    /// Create a table with the given marker names
    pub fn new(markers: MarkerNames) -> Self {
        debug!("Initializing TypeTable with markers {:?}", markers);
        Self {
            declarations: HashMap::new(),
            markers,
        }
    }

    /// Declare `name` as a nominal subtype of each of `supertypes`
    pub fn declare<I, S>(&mut self, name: impl Into<String>, supertypes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.declarations.entry(name.into()).or_default();
        entry.supertypes.extend(supertypes.into_iter().map(Into::into));
        self
    }

    /// Declare `name` as an alias (reference wrapper) of `target`
    pub fn alias(&mut self, name: impl Into<String>, target: TypeExpr) -> &mut Self {
        self.declarations.entry(name.into()).or_default().alias = Some(target);
        self
    }

    /// Whether `name` was declared
    pub fn is_declared(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
    }

    /// Resolve aliases at the top of `ty`.
    ///
    /// Cycles are cut at the first repeated name, which is returned as-is.
    pub fn resolve(&self, ty: &TypeExpr) -> TypeExpr {
        let mut resolving_stack: HashSet<&str> = HashSet::new();
        let mut current = ty;

        while let TypeExpr::Named(name) = current {
            let Some(target) = self
                .declarations
                .get(name)
                .and_then(|decl| decl.alias.as_ref())
            else {
                break;
            };

            if !resolving_stack.insert(name.as_str()) {
                warn!("Circular alias detected for type: {}", name);
                break;
            }
            current = target;
        }

        current.clone()
    }

    fn is_subtype_at(&self, sub: &TypeExpr, sup: &TypeExpr, depth: usize) -> bool {
        if depth > MAX_SUBTYPE_DEPTH {
            warn!("Subtype check of {} against {} is too deep", sub, sup);
            return false;
        }

        let sub = self.resolve(sub);
        let sup = self.resolve(sup);

        match (&sub, &sup) {
            (TypeExpr::Union(members), _) => members
                .iter()
                .all(|m| self.is_subtype_at(m, &sup, depth + 1)),
            (_, TypeExpr::Union(members)) => members
                .iter()
                .any(|m| self.is_subtype_at(&sub, m, depth + 1)),
            (TypeExpr::Nil, TypeExpr::Nil) => true,
            (TypeExpr::Named(a), TypeExpr::Named(b)) => self.is_nominal_subtype(a, b),
            _ => false,
        }
    }

    /// Breadth-first walk of declared supertypes
    fn is_nominal_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([sub]);

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name) {
                continue;
            }
            let Some(decl) = self.declarations.get(name) else {
                continue;
            };
            for parent in &decl.supertypes {
                if parent == sup {
                    return true;
                }
                queue.push_back(parent.as_str());
            }
        }

        false
    }

    fn parse_primitive_kind(name: &str) -> Option<PrimitiveKind> {
        match name {
            "string" => Some(PrimitiveKind::String),
            "int" => Some(PrimitiveKind::Int),
            "float" => Some(PrimitiveKind::Float),
            "decimal" => Some(PrimitiveKind::Decimal),
            "boolean" => Some(PrimitiveKind::Boolean),
            _ => None,
        }
    }
}

impl TypeOracle for TypeTable {
    type Type = TypeExpr;

    fn is_subtype(&self, sub: &TypeExpr, sup: &TypeExpr) -> bool {
        self.is_subtype_at(sub, sup, 0)
    }

    fn decompose_union(&self, ty: &TypeExpr) -> Vec<TypeExpr> {
        match self.resolve(ty) {
            TypeExpr::Union(members) => members,
            other => vec![other],
        }
    }

    fn build_union(&self, members: &[TypeExpr]) -> Option<TypeExpr> {
        TypeExpr::union_of(members.iter().cloned())
    }

    fn primitive_kind_of(&self, ty: &TypeExpr) -> Option<PrimitiveKind> {
        match self.resolve(ty) {
            TypeExpr::Named(name) => Self::parse_primitive_kind(&name),
            _ => None,
        }
    }

    fn resolve_alias(&self, ty: &TypeExpr) -> TypeExpr {
        self.resolve(ty)
    }

    fn marker(&self, marker: Marker) -> TypeExpr {
        let name = match marker {
            Marker::Nil => return TypeExpr::Nil,
            Marker::Continuation => &self.markers.continuation,
            Marker::Error => &self.markers.error,
            Marker::RequestInterceptor => &self.markers.request_interceptor,
            Marker::RequestErrorInterceptor => &self.markers.request_error_interceptor,
            Marker::ResponseInterceptor => &self.markers.response_interceptor,
            Marker::ResponseErrorInterceptor => &self.markers.response_error_interceptor,
        };
        TypeExpr::Named(name.clone())
    }
}
