//! Pipeline construction.
//!
//! A [`Pipeline`] is an arena of [`Node`]s with two singly-linked chains
//! threaded through it:
//!
//! - the request chain, in declaration order, over request-side nodes;
//! - the response links, in reverse declaration order: every node's
//!   `next_resp` points at the nearest response-side node declared before it.
//!
//! The response traversal of the target resource starts at the earliest
//! declared response-side node.

use crate::error::{Error, Result};
use crate::interceptor::{decompose_result, MiddlewareKind, Node, NodeId};
use crate::oracle::TypeOracle;
use crate::route::Route;
use log::{debug, info};

/// A resolved middleware declaration from the upstream semantic layer
#[derive(Debug, Clone, PartialEq)]
pub struct MiddlewareDecl<T> {
    /// Type of the middleware value, classified against the marker types
    pub value_type: T,
    /// Route of the handler; request-side kinds only
    pub route: Option<Route<T>>,
    /// Method of the handler; request-side kinds only
    pub method_name: Option<String>,
    /// Declared result type of the handler; `None` means nil
    pub declared_result: Option<T>,
}

impl<T> MiddlewareDecl<T> {
    /// A request-side declaration with a route
    pub fn routed(
        value_type: T,
        method_name: impl Into<String>,
        route: Route<T>,
        declared_result: Option<T>,
    ) -> Self {
        Self {
            value_type,
            route: Some(route),
            method_name: Some(method_name.into()),
            declared_result,
        }
    }

    /// A response-side declaration
    pub fn unrouted(value_type: T, declared_result: Option<T>) -> Self {
        Self {
            value_type,
            route: None,
            method_name: None,
            declared_result,
        }
    }
}

/// Classified, linked interceptor pipeline for one service
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline<T> {
    nodes: Vec<Node<T>>,
    first_req: Option<NodeId>,
    first_resp: Option<NodeId>,
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            first_req: None,
            first_resp: None,
        }
    }
}

impl<T> Pipeline<T> {
    /// A pipeline with no interceptors
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a pipeline from pre-linked nodes, checking every link is in range
    pub fn from_parts(
        nodes: Vec<Node<T>>,
        first_req: Option<NodeId>,
        first_resp: Option<NodeId>,
    ) -> Result<Self> {
        let len = nodes.len();
        let in_range = |link: Option<NodeId>| link.map_or(true, |id| id.0 < len);

        for (index, node) in nodes.iter().enumerate() {
            if !in_range(node.next_req) {
                return Err(Error::DanglingLink {
                    node: index,
                    link: "next_req",
                });
            }
            if !in_range(node.next_resp) {
                return Err(Error::DanglingLink {
                    node: index,
                    link: "next_resp",
                });
            }
        }
        if !in_range(first_req) {
            return Err(Error::DanglingLink {
                node: len,
                link: "first_req",
            });
        }
        if !in_range(first_resp) {
            return Err(Error::DanglingLink {
                node: len,
                link: "first_resp",
            });
        }

        Ok(Self {
            nodes,
            first_req,
            first_resp,
        })
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<T>> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Entry of the request chain
    pub fn first_req(&self) -> Option<NodeId> {
        self.first_req
    }

    /// Entry of the response chain
    pub fn first_resp(&self) -> Option<NodeId> {
        self.first_resp
    }
}

/// Builds a [`Pipeline`] from ordered middleware declarations
pub struct PipelineBuilder<'o, O: TypeOracle + ?Sized> {
    oracle: &'o O,
}

impl<'o, O: TypeOracle + ?Sized> PipelineBuilder<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self { oracle }
    }

    /// Classify, decompose and link `declarations`.
    ///
    /// `None` (no or unusable middleware declaration) yields an empty
    /// pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if a value matches no interceptor kind, a request-side
    /// interceptor lacks a route or method, or a route is malformed.
    pub fn build(&self, declarations: Option<&[MiddlewareDecl<O::Type>]>) -> Result<Pipeline<O::Type>> {
        let Some(declarations) = declarations else {
            debug!("No middleware declared; building empty pipeline");
            return Ok(Pipeline::empty());
        };

        let mut nodes = Vec::with_capacity(declarations.len());
        for (index, decl) in declarations.iter().enumerate() {
            nodes.push(self.build_node(index, decl)?);
        }

        let (first_req, first_resp) = Self::link(&mut nodes);
        info!(
            "Built pipeline with {} interceptors (first request {:?}, first response {:?})",
            nodes.len(),
            first_req,
            first_resp
        );

        Ok(Pipeline {
            nodes,
            first_req,
            first_resp,
        })
    }

    /// Find the interceptor kind of `value_type`
    pub fn classify(&self, value_type: &O::Type) -> Option<MiddlewareKind> {
        MiddlewareKind::PRIORITY
            .into_iter()
            .find(|kind| self.oracle.is_subtype(value_type, &self.oracle.marker(kind.marker())))
    }

    fn build_node(&self, index: usize, decl: &MiddlewareDecl<O::Type>) -> Result<Node<O::Type>> {
        let kind = self
            .classify(&decl.value_type)
            .ok_or(Error::UnrecognizedMiddleware { index })?;
        debug!("Middleware #{} classified as {}", index, kind);

        let (route, method_name) = if kind.is_request_side() {
            let (Some(route), Some(method)) = (&decl.route, &decl.method_name) else {
                return Err(Error::MissingRoute { index });
            };
            route.validate()?;
            (Some(route.clone()), Some(method.clone()))
        } else {
            (None, None)
        };

        let decomposition = decompose_result(self.oracle, decl.declared_result.as_ref(), Some(kind));
        Ok(Node::new(kind, route, method_name, decomposition))
    }

    /// Thread both chains through `nodes`; returns the two chain heads
    fn link(nodes: &mut [Node<O::Type>]) -> (Option<NodeId>, Option<NodeId>) {
        let mut first_req = None;
        let mut first_resp = None;
        let mut last_req: Option<usize> = None;
        let mut last_resp: Option<NodeId> = None;

        for index in 0..nodes.len() {
            let kind = nodes[index].kind;
            nodes[index].next_resp = last_resp;
            nodes[index].next_req = None;

            if kind.is_request_side() {
                match last_req {
                    Some(previous) => nodes[previous].next_req = Some(NodeId(index)),
                    None => first_req = Some(NodeId(index)),
                }
                last_req = Some(index);
            } else {
                first_resp = first_resp.or(Some(NodeId(index)));
                last_resp = Some(NodeId(index));
            }
        }

        (first_req, first_resp)
    }
}
