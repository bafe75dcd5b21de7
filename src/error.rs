use thiserror::Error;

/// Result type alias for the analyzer core
pub type Result<T> = std::result::Result<T, Error>;

/// Structural failures raised while building a pipeline or walking it
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A declared middleware value is none of the four interceptor kinds
    #[error("middleware #{index} is not a recognized interceptor kind")]
    UnrecognizedMiddleware { index: usize },

    /// A request-side interceptor was declared without a route or method
    #[error("request interceptor #{index} has no route or method")]
    MissingRoute { index: usize },

    #[error(transparent)]
    Route(#[from] RouteError),

    /// A pipeline link points outside the node arena
    #[error("node {node} links to missing node via {link}")]
    DanglingLink { node: usize, link: &'static str },

    /// The traversal exceeded the pipeline-length bound (cyclic links)
    #[error("traversal exceeded {limit} hops; pipeline links form a cycle")]
    TraversalBound { limit: usize },
}

/// Route shape errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// A rest parameter appeared before the last segment
    #[error("rest parameter at segment {position} is not in tail position")]
    RestNotInTail { position: usize },

    /// A route string could not be parsed
    #[error("invalid route syntax: {0}")]
    Syntax(String),
}
