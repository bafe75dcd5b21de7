//! Interceptor nodes and result-type decomposition.
//!
//! The four interceptor kinds form a closed enum. The error kinds reuse the
//! logic of their base kind; only the handler they guard and (for response
//! error interceptors) route applicability differ, so everything is a match
//! on [`MiddlewareKind`] rather than per-kind behaviour objects.

use crate::oracle::{flatten_members, Marker, TypeOracle};
use crate::route::{Route, RouteMatcher};
use log::debug;
use std::fmt;

/// The category of one interceptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MiddlewareKind {
    RequestInterceptor,
    RequestErrorInterceptor,
    ResponseInterceptor,
    ResponseErrorInterceptor,
}

impl MiddlewareKind {
    /// Classification order; the first marker the value is a subtype of wins
    pub const PRIORITY: [MiddlewareKind; 4] = [
        MiddlewareKind::RequestInterceptor,
        MiddlewareKind::RequestErrorInterceptor,
        MiddlewareKind::ResponseInterceptor,
        MiddlewareKind::ResponseErrorInterceptor,
    ];

    /// Runs before the target resource
    pub fn is_request_side(self) -> bool {
        matches!(
            self,
            MiddlewareKind::RequestInterceptor | MiddlewareKind::RequestErrorInterceptor
        )
    }

    /// The marker type identifying this kind
    pub fn marker(self) -> Marker {
        match self {
            MiddlewareKind::RequestInterceptor => Marker::RequestInterceptor,
            MiddlewareKind::RequestErrorInterceptor => Marker::RequestErrorInterceptor,
            MiddlewareKind::ResponseInterceptor => Marker::ResponseInterceptor,
            MiddlewareKind::ResponseErrorInterceptor => Marker::ResponseErrorInterceptor,
        }
    }
}

impl fmt::Display for MiddlewareKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            MiddlewareKind::RequestInterceptor => "RequestInterceptor",
            MiddlewareKind::RequestErrorInterceptor => "RequestErrorInterceptor",
            MiddlewareKind::ResponseInterceptor => "ResponseInterceptor",
            MiddlewareKind::ResponseErrorInterceptor => "ResponseErrorInterceptor",
        };
        write!(f, "{}", name)
    }
}

/// Index of a node in a pipeline arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A service endpoint as seen by the analyzer
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor<T> {
    /// Accessor/method name (`get`, `post`, ...)
    pub method_name: String,
    /// Route pattern the endpoint serves
    pub route: Route<T>,
    /// Declared result type; `None` means nil
    pub declared_result: Option<T>,
}

impl<T> EndpointDescriptor<T> {
    pub fn new(method_name: impl Into<String>, route: Route<T>, declared_result: Option<T>) -> Self {
        Self {
            method_name: method_name.into(),
            route,
            declared_result,
        }
    }
}

/// A classified declared result type
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition<T> {
    /// Control may pass on to the next stage
    pub can_continue: bool,
    /// Non-error part of the result
    pub success_type: Option<T>,
    /// Error part of the result
    pub error_type: Option<T>,
}

impl<T> Decomposition<T> {
    fn empty(can_continue: bool) -> Self {
        Self {
            can_continue,
            success_type: None,
            error_type: None,
        }
    }
}

/// Splits a declared result type into continuation, success and error parts.
///
/// `kind` is `None` for endpoints. Response interceptors may also continue by
/// returning nil, including an absent result type.
pub fn decompose_result<O: TypeOracle + ?Sized>(
    oracle: &O,
    raw: Option<&O::Type>,
    kind: Option<MiddlewareKind>,
) -> Decomposition<O::Type> {
    let nil_continues = kind == Some(MiddlewareKind::ResponseInterceptor);

    let Some(raw) = raw else {
        return Decomposition::empty(nil_continues);
    };

    let continuation = oracle.marker(Marker::Continuation);
    let nil = oracle.marker(Marker::Nil);
    let members = flatten_members(oracle, raw);

    let has_continuation = members
        .iter()
        .any(|m| oracle.is_subtype(m, &continuation));
    let has_nil = members.iter().any(|m| oracle.is_subtype(m, &nil));
    let can_continue = has_continuation || (nil_continues && has_nil);

    let residual: Vec<O::Type> = if can_continue {
        let pass_through = oracle
            .build_union(&[continuation, nil])
            .unwrap_or_else(|| oracle.marker(Marker::Continuation));
        members
            .into_iter()
            .filter(|m| !oracle.is_subtype(m, &pass_through))
            .collect()
    } else {
        members
    };

    if residual.is_empty() {
        debug!("Result type {:?} only continues", raw);
        return Decomposition::empty(can_continue);
    }

    let error_marker = oracle.marker(Marker::Error);
    let (errors, successes): (Vec<_>, Vec<_>) = residual
        .into_iter()
        .partition(|m| oracle.is_subtype(m, &error_marker));

    let decomposition = Decomposition {
        can_continue,
        success_type: oracle.build_union(&successes),
        error_type: oracle.build_union(&errors),
    };
    debug!("Decomposed {:?} into {:?}", raw, decomposition);
    decomposition
}

/// One interceptor in a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    pub kind: MiddlewareKind,
    /// Route pattern; request-side kinds only
    pub route: Option<Route<T>>,
    /// Method name; request-side kinds only
    pub method_name: Option<String>,
    pub can_continue: bool,
    pub success_type: Option<T>,
    pub error_type: Option<T>,
    /// Next node in request order
    pub next_req: Option<NodeId>,
    /// Next node in response order
    pub next_resp: Option<NodeId>,
}

impl<T> Node<T> {
    /// Create an unlinked node from a kind and its decomposed result type
    pub fn new(
        kind: MiddlewareKind,
        route: Option<Route<T>>,
        method_name: Option<String>,
        decomposition: Decomposition<T>,
    ) -> Self {
        Self {
            kind,
            route,
            method_name,
            can_continue: decomposition.can_continue,
            success_type: decomposition.success_type,
            error_type: decomposition.error_type,
            next_req: None,
            next_resp: None,
        }
    }

    /// Whether this node runs for `endpoint`.
    ///
    /// Response interceptors run for every endpoint; response error
    /// interceptors never match by route.
    pub fn applies_to<O>(&self, matcher: &RouteMatcher<'_, O>, endpoint: &EndpointDescriptor<T>) -> bool
    where
        O: TypeOracle<Type = T> + ?Sized,
    {
        match self.kind {
            MiddlewareKind::ResponseInterceptor => true,
            MiddlewareKind::ResponseErrorInterceptor => false,
            MiddlewareKind::RequestInterceptor | MiddlewareKind::RequestErrorInterceptor => {
                match (&self.method_name, &self.route) {
                    (Some(method), Some(route)) => {
                        matcher.matches(method, route, &endpoint.method_name, &endpoint.route)
                    }
                    _ => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::RouteSegment;
    use crate::type_table::{TypeExpr, TypeTable};

    fn ty(s: &str) -> TypeExpr {
        s.parse().unwrap()
    }

    fn table() -> TypeTable {
        let mut table = TypeTable::default();
        table.declare("NotFound", ["error"]);
        table.declare("Unauthorized", ["error"]);
        table
    }

    #[test]
    fn test_absent_type_is_nil() {
        let table = table();
        let d = decompose_result(&table, None, None);

        assert!(!d.can_continue);
        assert_eq!(d.success_type, None);
        assert_eq!(d.error_type, None);
    }

    #[test]
    fn test_partition_success_and_error() {
        let table = table();
        let raw = ty("Pet|NotFound|Unauthorized");
        let d = decompose_result(&table, Some(&raw), None);

        assert!(!d.can_continue);
        assert_eq!(d.success_type, Some(ty("Pet")));
        assert_eq!(d.error_type, Some(ty("NotFound|Unauthorized")));
    }

    #[test]
    fn test_continuation_is_stripped() {
        let table = table();
        let raw = ty("NextService|Unauthorized|error?");
        let d = decompose_result(&table, Some(&raw), Some(MiddlewareKind::RequestInterceptor));

        assert!(d.can_continue);
        assert_eq!(d.success_type, None);
        assert_eq!(d.error_type, Some(ty("Unauthorized|error")));
    }

    #[test]
    fn test_only_continuation_leaves_nothing() {
        let table = table();
        let raw = ty("NextService?");
        let d = decompose_result(&table, Some(&raw), Some(MiddlewareKind::RequestInterceptor));

        assert!(d.can_continue);
        assert_eq!(d.success_type, None);
        assert_eq!(d.error_type, None);
    }

    #[test]
    fn test_continuation_through_alias() {
        let mut table = table();
        table.alias("Next", ty("NextService"));
        table.alias("Outcome", ty("Next|Pet"));

        let d = decompose_result(&table, Some(&ty("Outcome")), None);
        assert!(d.can_continue);
        assert_eq!(d.success_type, Some(ty("Pet")));
    }

    #[test]
    fn test_nil_without_marker_does_not_continue_requests() {
        let table = table();
        let raw = ty("Pet?");
        let d = decompose_result(&table, Some(&raw), Some(MiddlewareKind::RequestInterceptor));

        assert!(!d.can_continue);
        assert_eq!(d.success_type, Some(ty("Pet|()")));
    }

    #[test]
    fn test_response_interceptor_continues_on_nil() {
        let table = table();
        let raw = ty("Pet?");
        let d = decompose_result(&table, Some(&raw), Some(MiddlewareKind::ResponseInterceptor));

        assert!(d.can_continue);
        assert_eq!(d.success_type, Some(ty("Pet")));

        let absent = decompose_result(&table, None, Some(MiddlewareKind::ResponseInterceptor));
        assert!(absent.can_continue);
        assert_eq!(absent.success_type, None);
    }

    #[test]
    fn test_response_error_interceptor_does_not_continue_on_nil() {
        let table = table();
        let d = decompose_result(&table, None, Some(MiddlewareKind::ResponseErrorInterceptor));
        assert!(!d.can_continue);
    }

    #[test]
    fn test_applicability_by_kind() {
        let table = table();
        let matcher = RouteMatcher::new(&table);
        let endpoint = EndpointDescriptor::new(
            "get",
            Route::segments(vec![RouteSegment::literal("pets")]).unwrap(),
            None,
        );
        let any_path = Route::RestRoute(ty("string"));
        let decomposition = || decompose_result(&table, None, None);

        let request = Node::new(
            MiddlewareKind::RequestInterceptor,
            Some(any_path.clone()),
            Some("default".to_string()),
            decomposition(),
        );
        let post_only = Node::new(
            MiddlewareKind::RequestInterceptor,
            Some(any_path),
            Some("post".to_string()),
            decomposition(),
        );
        let response = Node::new(MiddlewareKind::ResponseInterceptor, None, None, decomposition());
        let response_error =
            Node::new(MiddlewareKind::ResponseErrorInterceptor, None, None, decomposition());

        assert!(request.applies_to(&matcher, &endpoint));
        assert!(!post_only.applies_to(&matcher, &endpoint));
        assert!(response.applies_to(&matcher, &endpoint));
        assert!(!response_error.applies_to(&matcher, &endpoint));
    }

    #[test]
    fn test_kind_helpers() {
        assert!(MiddlewareKind::RequestErrorInterceptor.is_request_side());
        assert!(!MiddlewareKind::ResponseInterceptor.is_request_side());
    }
}
