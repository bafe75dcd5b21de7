//! The type-system seam.
//!
//! The analyzer never looks inside a type. Every question it asks about one
//! (subtyping, union shape, primitive kind) goes through a [`TypeOracle`].
//! A semantic-model backend implements this trait; [`crate::type_table`]
//! provides a small nominal implementation used by the CLI and the tests.

use std::fmt;

/// Well-known types the analyzer needs to name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// "Pass control to the next stage unchanged"
    Continuation,
    /// Supertype of every error value
    Error,
    /// The nil type
    Nil,
    RequestInterceptor,
    RequestErrorInterceptor,
    ResponseInterceptor,
    ResponseErrorInterceptor,
}

/// Primitive kinds a route parameter may be declared with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Int,
    Float,
    Decimal,
    Boolean,
}

/// External type oracle.
///
/// Implementations must be total and free of side effects: the analyzer
/// calls them freely and in any order.
pub trait TypeOracle {
    /// Opaque type handle
    type Type: Clone + PartialEq + fmt::Debug;

    /// Whether `sub` is a subtype of `sup`
    fn is_subtype(&self, sub: &Self::Type, sup: &Self::Type) -> bool;

    /// Members of a union; a non-union type decomposes to itself
    fn decompose_union(&self, ty: &Self::Type) -> Vec<Self::Type>;

    /// Union of `members`, `None` when empty
    fn build_union(&self, members: &[Self::Type]) -> Option<Self::Type>;

    /// Primitive kind of `ty`, if it is one
    fn primitive_kind_of(&self, ty: &Self::Type) -> Option<PrimitiveKind>;

    /// Strips reference/alias wrappers
    fn resolve_alias(&self, ty: &Self::Type) -> Self::Type {
        ty.clone()
    }

    /// Handle for a well-known marker type
    fn marker(&self, marker: Marker) -> Self::Type;
}

/// Flattens `ty` into its non-union members, seeing through aliases.
///
/// Member order follows the oracle's decomposition order.
pub fn flatten_members<O: TypeOracle + ?Sized>(oracle: &O, ty: &O::Type) -> Vec<O::Type> {
    let mut members = Vec::new();
    let mut expanded: Vec<O::Type> = Vec::new();
    let mut pending = vec![oracle.resolve_alias(ty)];

    while let Some(current) = pending.pop() {
        let parts = oracle.decompose_union(&current);
        if parts.len() == 1 && parts[0] == current {
            if !members.contains(&current) {
                members.push(current);
            }
            continue;
        }
        // a union reachable from itself through an alias
        if expanded.contains(&current) {
            continue;
        }
        expanded.push(current);
        // reversed so the stack yields members in declaration order
        for part in parts.into_iter().rev() {
            pending.push(oracle.resolve_alias(&part));
        }
    }

    members
}
