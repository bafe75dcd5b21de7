//! Interceptor flow analyzer - result-type inference for interceptor pipelines.
//!
//! A service places an ordered list of interceptors in front of its endpoints.
//! Request interceptors may answer early, errors may be diverted to error
//! interceptors, and response interceptors may rewrite what the endpoint
//! produced. This crate computes, for each endpoint, the types a caller can
//! actually observe, split by provenance: produced by an interceptor, or by
//! the target resource and passed through.
//!
//! # Architecture
//!
//! 1. [`oracle`] - the type-system abstraction the analysis is generic over
//! 2. [`route`] - route patterns and the host/target route matcher
//! 3. [`interceptor`] - interceptor kinds, nodes and result decomposition
//! 4. [`pipeline`] - classification and linking of middleware declarations
//! 5. [`inference`] - the return-type inference traversal
//! 6. [`type_table`] - a nominal [`oracle::TypeOracle`] over declared types
//! 7. [`manifest`] - YAML/JSON service manifests
//! 8. [`scanner`], [`report`], [`serializer`] - manifest discovery and output
//!
//! # Example Usage
//!
//! ```no_run
//! use interceptor_flow::{
//!     manifest::ServiceManifest,
//!     report::ReportBuilder,
//!     serializer::serialize_yaml,
//! };
//! use std::path::Path;
//!
//! let manifest = ServiceManifest::from_path(Path::new("petstore.yaml")).unwrap();
//! let table = manifest.type_table().unwrap();
//!
//! let mut builder = ReportBuilder::new(&table);
//! for service in &manifest.services {
//!     builder.add_service(service).unwrap();
//! }
//! println!("{}", serialize_yaml(&builder.build()).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod error;
pub mod inference;
pub mod interceptor;
pub mod manifest;
pub mod oracle;
pub mod pipeline;
pub mod report;
pub mod route;
pub mod scanner;
pub mod serializer;
pub mod type_table;

pub use error::{Error, Result, RouteError};
pub use inference::{Provenance, ReturnTypeInferrer, ReturnTypes};
pub use interceptor::{EndpointDescriptor, MiddlewareKind};
pub use oracle::{Marker, PrimitiveKind, TypeOracle};
pub use pipeline::{MiddlewareDecl, Pipeline, PipelineBuilder};
pub use route::{Route, RouteMatcher, RouteSegment};
