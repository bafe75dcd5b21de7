//! Return-type inference over an interceptor pipeline.
//!
//! For one endpoint, every way a request can travel through the pipeline is
//! explored: interceptors that pass control on, interceptors that answer
//! early, errors diverted to error interceptors, and the target resource
//! running and its result travelling back through the response chain. Each
//! path ends in a *leaf*: a type the caller can observe, tagged with where it
//! came from.
//!
//! The traversal runs on an explicit work-list so that long pipelines do not
//! translate into deep call stacks. Every step carries the number of links
//! followed so far; a well-formed pipeline never needs more than
//! `2 * len + 2`, so exceeding that bound means the links form a cycle.

use crate::error::{Error, Result};
use crate::interceptor::{
    decompose_result, Decomposition, EndpointDescriptor, MiddlewareKind, Node, NodeId,
};
use crate::oracle::TypeOracle;
use crate::pipeline::Pipeline;
use crate::route::RouteMatcher;
use log::{debug, trace};

/// Where an observed type originates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// An interceptor answered or failed without the target resource
    FromInterceptors,
    /// The target resource ran and produced it
    FromTargetResource,
}

impl Provenance {
    fn from_target(from_target: bool) -> Self {
        if from_target {
            Provenance::FromTargetResource
        } else {
            Provenance::FromInterceptors
        }
    }
}

/// Types a caller of one endpoint can observe, by provenance
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnTypes<T> {
    pub from_interceptors: Option<T>,
    pub from_target_resource: Option<T>,
}

impl<T> ReturnTypes<T> {
    pub fn is_empty(&self) -> bool {
        self.from_interceptors.is_none() && self.from_target_resource.is_none()
    }
}

/// A type reaching the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf<T> {
    pub ty: T,
    pub provenance: Provenance,
}

/// One pending unit of traversal work
#[derive(Debug)]
enum Step<T> {
    /// Request travelling forward, arriving at `at` (`None`: the target)
    Request { at: Option<NodeId>, hops: usize },
    /// Response travelling back, arriving at `at` (`None`: the caller)
    Response {
        at: Option<NodeId>,
        carried: T,
        from_target: bool,
        hops: usize,
    },
}

impl<T> Step<T> {
    fn hops(&self) -> usize {
        match self {
            Step::Request { hops, .. } | Step::Response { hops, .. } => *hops,
        }
    }
}

/// Computes [`ReturnTypes`] for endpoints of a pipeline
pub struct ReturnTypeInferrer<'o, O: TypeOracle + ?Sized> {
    oracle: &'o O,
    matcher: RouteMatcher<'o, O>,
}

impl<'o, O: TypeOracle + ?Sized> ReturnTypeInferrer<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self {
            oracle,
            matcher: RouteMatcher::new(oracle),
        }
    }

    /// Infer the observable result types of `endpoint` behind `pipeline`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint route is malformed or the pipeline
    /// links form a cycle.
    pub fn infer(
        &self,
        pipeline: &Pipeline<O::Type>,
        endpoint: &EndpointDescriptor<O::Type>,
    ) -> Result<ReturnTypes<O::Type>> {
        let leaves = self.collect_leaves(pipeline, endpoint)?;

        let union_of = |provenance: Provenance| {
            let members: Vec<O::Type> = leaves
                .iter()
                .filter(|leaf| leaf.provenance == provenance)
                .fold(Vec::new(), |mut acc, leaf| {
                    if !acc.contains(&leaf.ty) {
                        acc.push(leaf.ty.clone());
                    }
                    acc
                });
            self.oracle.build_union(&members)
        };

        let return_types = ReturnTypes {
            from_interceptors: union_of(Provenance::FromInterceptors),
            from_target_resource: union_of(Provenance::FromTargetResource),
        };
        debug!(
            "Return types of {} {:?}: {:?}",
            endpoint.method_name, endpoint.route, return_types
        );
        Ok(return_types)
    }

    /// Walk every path and collect leaves, in a deterministic order
    pub fn collect_leaves(
        &self,
        pipeline: &Pipeline<O::Type>,
        endpoint: &EndpointDescriptor<O::Type>,
    ) -> Result<Vec<Leaf<O::Type>>> {
        endpoint.route.validate()?;

        let target = decompose_result(self.oracle, endpoint.declared_result.as_ref(), None);
        let mut walk = Walk {
            pipeline,
            limit: 2 * pipeline.len() + 2,
            stack: Vec::new(),
            leaves: Vec::new(),
        };

        walk.push(Step::Request {
            at: pipeline.first_req(),
            hops: 0,
        })?;

        while let Some(step) = walk.stack.pop() {
            trace!("Inference step {:?}", step);
            match step {
                Step::Request { at: None, hops } => walk.enter_target(&target, hops)?,
                Step::Request { at: Some(id), hops } => {
                    self.request_step(&mut walk, endpoint, id, hops)?
                }
                Step::Response {
                    at,
                    carried,
                    from_target,
                    hops,
                } => self.response_step(&mut walk, at, carried, from_target, hops)?,
            }
        }

        Ok(walk.leaves)
    }

    fn request_step(
        &self,
        walk: &mut Walk<'_, O::Type>,
        endpoint: &EndpointDescriptor<O::Type>,
        id: NodeId,
        hops: usize,
    ) -> Result<()> {
        let pipeline = walk.pipeline;
        let Some(node) = pipeline.node(id) else {
            return Ok(());
        };

        let applicable = node.applies_to(&self.matcher, endpoint);
        debug!(
            "{} {} {} {} {:?}",
            node.kind,
            id,
            if applicable { "applies to" } else { "skips" },
            endpoint.method_name,
            endpoint.route
        );

        // Explored in push order
        let mut deferred = Vec::new();

        if node.can_continue || !applicable {
            deferred.push(Step::Request {
                at: node.next_req,
                hops: hops + 1,
            });
        }
        if !applicable {
            return walk.push_all(deferred);
        }

        if let Some(error) = &node.error_type {
            if let Some(handler) = walk.find_along(
                node.next_req,
                |n| n.next_req,
                MiddlewareKind::RequestErrorInterceptor,
            )? {
                deferred.push(Step::Request {
                    at: Some(handler),
                    hops: hops + 1,
                });
            } else if let Some(handler) = walk.find_along(
                pipeline.first_resp(),
                |n| n.next_resp,
                MiddlewareKind::ResponseErrorInterceptor,
            )? {
                deferred.push(Step::Response {
                    at: Some(handler),
                    carried: error.clone(),
                    from_target: false,
                    hops: hops + 1,
                });
            } else {
                walk.leaf(error.clone(), Provenance::FromInterceptors);
            }
        }

        if let Some(success) = &node.success_type {
            deferred.push(Step::Response {
                at: node.next_resp,
                carried: success.clone(),
                from_target: false,
                hops: hops + 1,
            });
        }

        walk.push_all(deferred)
    }

    fn response_step(
        &self,
        walk: &mut Walk<'_, O::Type>,
        at: Option<NodeId>,
        carried: O::Type,
        from_target: bool,
        hops: usize,
    ) -> Result<()> {
        let pipeline = walk.pipeline;
        let Some(node) = at.and_then(|id| pipeline.node(id)) else {
            walk.leaf(carried, Provenance::from_target(from_target));
            return Ok(());
        };

        if node.can_continue {
            walk.leaf(carried, Provenance::from_target(from_target));
        }

        let mut deferred = Vec::new();

        if let Some(error) = &node.error_type {
            match walk.find_along(
                node.next_resp,
                |n| n.next_resp,
                MiddlewareKind::ResponseErrorInterceptor,
            )? {
                Some(handler) => deferred.push(Step::Response {
                    at: Some(handler),
                    carried: error.clone(),
                    from_target: false,
                    hops: hops + 1,
                }),
                None => walk.leaf(error.clone(), Provenance::FromInterceptors),
            }
        }

        if let Some(success) = &node.success_type {
            deferred.push(Step::Response {
                at: node.next_resp,
                carried: success.clone(),
                from_target: false,
                hops: hops + 1,
            });
        }

        walk.push_all(deferred)
    }
}

/// Per-call traversal state
struct Walk<'p, T> {
    pipeline: &'p Pipeline<T>,
    limit: usize,
    stack: Vec<Step<T>>,
    leaves: Vec<Leaf<T>>,
}

impl<'p, T: Clone + std::fmt::Debug> Walk<'p, T> {
    fn push(&mut self, step: Step<T>) -> Result<()> {
        if step.hops() > self.limit {
            return Err(Error::TraversalBound { limit: self.limit });
        }
        self.stack.push(step);
        Ok(())
    }

    /// Push in reverse so steps pop in the order given
    fn push_all(&mut self, steps: Vec<Step<T>>) -> Result<()> {
        for step in steps.into_iter().rev() {
            self.push(step)?;
        }
        Ok(())
    }

    fn leaf(&mut self, ty: T, provenance: Provenance) {
        trace!("Leaf {:?} {:?}", provenance, ty);
        self.leaves.push(Leaf { ty, provenance });
    }

    /// First node of `kind` reachable from `start` by following `next`
    fn find_along(
        &self,
        start: Option<NodeId>,
        next: impl Fn(&Node<T>) -> Option<NodeId>,
        kind: MiddlewareKind,
    ) -> Result<Option<NodeId>> {
        let mut current = start;
        let mut visited = 0;

        while let Some(id) = current {
            if visited >= self.pipeline.len() {
                return Err(Error::TraversalBound {
                    limit: self.pipeline.len(),
                });
            }
            visited += 1;

            match self.pipeline.node(id) {
                Some(node) if node.kind == kind => return Ok(Some(id)),
                Some(node) => current = next(node),
                None => return Ok(None),
            }
        }

        Ok(None)
    }

    /// The target resource runs; its result starts back through the response chain
    fn enter_target(&mut self, target: &Decomposition<T>, hops: usize) -> Result<()> {
        let at = self.pipeline.first_resp();
        let steps = [&target.success_type, &target.error_type]
            .into_iter()
            .flatten()
            .cloned()
            .map(|ty| Step::Response {
                at,
                carried: ty,
                from_target: true,
                hops: hops + 1,
            })
            .collect();
        self.push_all(steps)
    }
}
