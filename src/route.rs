//! Structural route model and the host/target route matcher.
//!
//! An interceptor *hosts* a route pattern; an endpoint is the *target*. The
//! matcher is host-permissive and target-exact: it answers true only when the
//! host pattern is broad enough to cover every concrete call the target
//! pattern accepts.

use crate::error::RouteError;
use crate::oracle::{PrimitiveKind, TypeOracle};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static STRING_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^/]+$").expect("string segment regex"));
static INT_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("int segment regex"));
static FLOAT_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+$").expect("float segment regex"));
static BOOLEAN_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(true|false)$").expect("boolean segment regex"));

/// Method name that matches every target method
pub const DEFAULT_METHOD: &str = "default";

/// One segment of a route pattern
#[derive(Debug, Clone, PartialEq)]
pub enum RouteSegment<T> {
    /// Exact path text
    Literal(String),
    /// A single typed path parameter
    TypedParam(T),
    /// A typed parameter consuming the rest of the path
    TypedRestParam(T),
}

impl<T> RouteSegment<T> {
    pub fn literal(text: impl Into<String>) -> Self {
        RouteSegment::Literal(text.into())
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, RouteSegment::TypedRestParam(_))
    }
}

/// A route pattern
#[derive(Debug, Clone, PartialEq)]
pub enum Route<T> {
    /// The service root, `.`
    DotRoute,
    /// The whole path as one typed rest parameter
    RestRoute(T),
    /// An ordered list of segments
    SegmentList(Vec<RouteSegment<T>>),
}

impl<T> Route<T> {
    /// Build a segment-list route, rejecting a rest parameter before the tail
    pub fn segments(segments: Vec<RouteSegment<T>>) -> Result<Self, RouteError> {
        let route = Route::SegmentList(segments);
        route.validate()?;
        Ok(route)
    }

    /// Check the route is well-formed
    pub fn validate(&self) -> Result<(), RouteError> {
        if let Route::SegmentList(segments) = self {
            let tail = segments.len().saturating_sub(1);
            if let Some(position) = segments
                .iter()
                .position(|s| s.is_rest())
                .filter(|&p| p < tail)
            {
                return Err(RouteError::RestNotInTail { position });
            }
        }
        Ok(())
    }
}

impl<T: fmt::Display> fmt::Display for RouteSegment<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RouteSegment::Literal(text) => write!(f, "{}", text),
            RouteSegment::TypedParam(ty) => write!(f, "[{}]", ty),
            RouteSegment::TypedRestParam(ty) => write!(f, "[{}...]", ty),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Route<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Route::DotRoute => write!(f, "."),
            Route::RestRoute(ty) => write!(f, "[{}...]", ty),
            Route::SegmentList(segments) if segments.is_empty() => write!(f, "."),
            Route::SegmentList(segments) => {
                for (i, segment) in segments.iter().enumerate() {
                    if i > 0 {
                        write!(f, "/")?;
                    }
                    write!(f, "{}", segment)?;
                }
                Ok(())
            }
        }
    }
}

/// Decides whether a host route subsumes a target route
pub struct RouteMatcher<'o, O: TypeOracle + ?Sized> {
    oracle: &'o O,
}

impl<'o, O: TypeOracle + ?Sized> RouteMatcher<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self { oracle }
    }

    /// Whether `(host_method, host_route)` covers `(target_method, target_route)`
    pub fn matches(
        &self,
        host_method: &str,
        host_route: &Route<O::Type>,
        target_method: &str,
        target_route: &Route<O::Type>,
    ) -> bool {
        if !Self::methods_compatible(host_method, target_method) {
            debug!(
                "Method {} does not cover target method {}",
                host_method, target_method
            );
            return false;
        }

        let compatible = self.paths_compatible(host_route, target_route);
        debug!(
            "Host route {:?} {} target route {:?}",
            host_route,
            if compatible { "covers" } else { "does not cover" },
            target_route
        );
        compatible
    }

    fn methods_compatible(host_method: &str, target_method: &str) -> bool {
        host_method.eq_ignore_ascii_case(DEFAULT_METHOD)
            || host_method.eq_ignore_ascii_case(target_method)
    }

    fn paths_compatible(&self, host: &Route<O::Type>, target: &Route<O::Type>) -> bool {
        match host {
            // Conservative: the root only covers the root
            Route::DotRoute => matches!(target, Route::DotRoute),
            Route::RestRoute(ty) => {
                let host_segments = [RouteSegment::TypedRestParam(ty.clone())];
                match target {
                    Route::DotRoute => true,
                    Route::RestRoute(target_ty) => self.segment_lists_compatible(
                        &host_segments,
                        &[RouteSegment::TypedRestParam(target_ty.clone())],
                    ),
                    Route::SegmentList(target_segments) => {
                        self.segment_lists_compatible(&host_segments, target_segments)
                    }
                }
            }
            Route::SegmentList(host_segments) => match target {
                Route::DotRoute => host_segments.is_empty(),
                Route::RestRoute(target_ty) => self.segment_lists_compatible(
                    host_segments,
                    &[RouteSegment::TypedRestParam(target_ty.clone())],
                ),
                Route::SegmentList(target_segments) => {
                    self.segment_lists_compatible(host_segments, target_segments)
                }
            },
        }
    }

    /// Pairwise comparison; a trailing host rest segment repeats to cover
    /// any remaining target segments
    fn segment_lists_compatible(
        &self,
        host: &[RouteSegment<O::Type>],
        target: &[RouteSegment<O::Type>],
    ) -> bool {
        let Some(last) = host.last() else {
            return target.is_empty();
        };
        if host.len() > target.len() {
            return false;
        }

        target.iter().enumerate().all(|(i, target_segment)| {
            let host_segment = match host.get(i) {
                Some(segment) => segment,
                None if last.is_rest() => last,
                None => return false,
            };
            self.segments_compatible(host_segment, target_segment)
        })
    }

    fn segments_compatible(
        &self,
        host: &RouteSegment<O::Type>,
        target: &RouteSegment<O::Type>,
    ) -> bool {
        use RouteSegment::{Literal, TypedParam, TypedRestParam};

        match (host, target) {
            (Literal(host_text), Literal(target_text)) => host_text == target_text,
            (TypedParam(host_ty) | TypedRestParam(host_ty), Literal(text)) => {
                self.literal_matches(text, host_ty)
            }
            (
                TypedParam(host_ty) | TypedRestParam(host_ty),
                TypedParam(target_ty) | TypedRestParam(target_ty),
            ) => {
                self.oracle.primitive_kind_of(host_ty) == Some(PrimitiveKind::String)
                    || self.oracle.is_subtype(target_ty, host_ty)
            }
            (Literal(_), _) => false,
        }
    }

    fn literal_matches(&self, text: &str, ty: &O::Type) -> bool {
        let pattern = match self.oracle.primitive_kind_of(ty) {
            Some(PrimitiveKind::String) => &*STRING_SEGMENT,
            Some(PrimitiveKind::Int) => &*INT_SEGMENT,
            Some(PrimitiveKind::Float | PrimitiveKind::Decimal) => &*FLOAT_SEGMENT,
            Some(PrimitiveKind::Boolean) => &*BOOLEAN_SEGMENT,
            None => return false,
        };
        pattern.is_match(text)
    }
}
