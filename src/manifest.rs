//! Service manifests.
//!
//! A manifest describes the declared types of a project and, per service, the
//! ordered interceptor declarations and the endpoints behind them. It stands in
//! for the semantic layer that would normally resolve these from source code.

use crate::error::RouteError;
use crate::interceptor::EndpointDescriptor;
use crate::pipeline::MiddlewareDecl;
use crate::route::{Route, RouteSegment};
use crate::type_table::{MarkerNames, TypeExpr, TypeTable};
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Root of a manifest file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceManifest {
    /// Declared types, by name
    pub types: BTreeMap<String, TypeDecl>,
    /// Overrides of the marker type names
    pub markers: MarkerNames,
    pub services: Vec<ServiceDecl>,
}

/// A declared nominal type or alias
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypeDecl {
    pub supertypes: Vec<String>,
    /// Type expression this name stands for
    pub alias: Option<String>,
}

/// One service: its interceptors and endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDecl {
    pub name: String,
    /// Ordered interceptor declarations; absent means no interceptor pipeline
    #[serde(default)]
    pub interceptors: Option<Vec<InterceptorDecl>>,
    #[serde(default)]
    pub endpoints: Vec<EndpointDecl>,
}

/// One middleware entry of a service
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterceptorDecl {
    /// Type of the middleware value
    #[serde(rename = "type")]
    pub value_type: String,
    pub method: Option<String>,
    pub route: Option<String>,
    /// Declared result of the handler; absent means nil
    pub returns: Option<String>,
}

/// One endpoint (target resource method)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointDecl {
    pub method: String,
    pub route: String,
    pub returns: Option<String>,
}

impl ServiceManifest {
    /// Load a manifest from disk; `.json` files are read as JSON, anything else as YAML
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!("Loading manifest: {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

        let is_json = path.extension().and_then(|s| s.to_str()) == Some("json");
        let manifest = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        };
        manifest.with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse YAML manifest")
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse JSON manifest")
    }

    /// Build the type table declared by this manifest
    pub fn type_table(&self) -> Result<TypeTable> {
        let mut table = TypeTable::new(self.markers.clone());

        for (name, decl) in &self.types {
            table.declare(name.as_str(), decl.supertypes.iter().cloned());
            if let Some(alias) = &decl.alias {
                let target = parse_type(alias)
                    .with_context(|| format!("Invalid alias for type '{}'", name))?;
                table.alias(name.as_str(), target);
            }
        }

        debug!("Declared {} types", self.types.len());
        Ok(table)
    }

    /// Find a service by name
    pub fn service(&self, name: &str) -> Option<&ServiceDecl> {
        self.services.iter().find(|s| s.name == name)
    }
}

impl ServiceDecl {
    /// Convert the interceptor declarations into pipeline input.
    ///
    /// `table` is only consulted to warn about undeclared interceptor types.
    pub fn middleware(&self, table: &TypeTable) -> Result<Option<Vec<MiddlewareDecl<TypeExpr>>>> {
        let Some(interceptors) = &self.interceptors else {
            return Ok(None);
        };

        let mut decls = Vec::with_capacity(interceptors.len());
        for (index, interceptor) in interceptors.iter().enumerate() {
            let context = || {
                format!(
                    "Invalid interceptor #{} ({}) in service '{}'",
                    index, interceptor.value_type, self.name
                )
            };

            if !table.is_declared(&interceptor.value_type) {
                warn!(
                    "Interceptor type '{}' in service '{}' is not declared",
                    interceptor.value_type, self.name
                );
            }

            let value_type = parse_type(&interceptor.value_type).with_context(context)?;
            let route = interceptor
                .route
                .as_deref()
                .map(parse_route)
                .transpose()
                .with_context(context)?;
            let declared_result = parse_optional_type(interceptor.returns.as_deref())
                .with_context(context)?;

            decls.push(MiddlewareDecl {
                value_type,
                route,
                method_name: interceptor.method.clone(),
                declared_result,
            });
        }

        Ok(Some(decls))
    }

    /// Convert the endpoint declarations into descriptors
    pub fn endpoints(&self) -> Result<Vec<EndpointDescriptor<TypeExpr>>> {
        self.endpoints
            .iter()
            .map(|endpoint| -> Result<EndpointDescriptor<TypeExpr>> {
                let context = || {
                    format!(
                        "Invalid endpoint {} {} in service '{}'",
                        endpoint.method, endpoint.route, self.name
                    )
                };
                let route = parse_route(&endpoint.route).with_context(context)?;
                let declared_result =
                    parse_optional_type(endpoint.returns.as_deref()).with_context(context)?;
                Ok(EndpointDescriptor::new(
                    endpoint.method.as_str(),
                    route,
                    declared_result,
                ))
            })
            .collect()
    }
}

fn parse_type(text: &str) -> Result<TypeExpr> {
    text.parse::<TypeExpr>()
        .with_context(|| format!("Invalid type expression '{}'", text))
}

fn parse_optional_type(text: Option<&str>) -> Result<Option<TypeExpr>> {
    text.map(parse_type).transpose()
}

/// Parse a route string.
///
/// `.` is the service root and a lone `[T... name]` the whole path; anything
/// else is a `/`-separated list of literals, `[T name]` parameters and an
/// optional trailing `[T... name]`.
pub fn parse_route(text: &str) -> std::result::Result<Route<TypeExpr>, RouteError> {
    let text = text.trim();
    if text == "." {
        return Ok(Route::DotRoute);
    }

    let path = text.trim_start_matches('/');
    if path.is_empty() {
        return Err(RouteError::Syntax(format!("empty route '{}'", text)));
    }

    let mut segments = Vec::new();
    for part in path.split('/') {
        segments.push(parse_segment(part)?);
    }

    if let [RouteSegment::TypedRestParam(ty)] = segments.as_slice() {
        return Ok(Route::RestRoute(ty.clone()));
    }
    Route::segments(segments)
}

fn parse_segment(part: &str) -> std::result::Result<RouteSegment<TypeExpr>, RouteError> {
    if part.is_empty() {
        return Err(RouteError::Syntax("empty path segment".to_string()));
    }

    let Some(inner) = part.strip_prefix('[') else {
        if part.contains(['[', ']']) {
            return Err(RouteError::Syntax(format!("stray bracket in '{}'", part)));
        }
        return Ok(RouteSegment::literal(part));
    };
    let inner = inner
        .strip_suffix(']')
        .ok_or_else(|| RouteError::Syntax(format!("unclosed parameter '{}'", part)))?;

    // `[T name]`; the name is informational only
    let type_text = inner.split_whitespace().next().unwrap_or_default();
    let (type_text, rest) = match type_text.strip_suffix("...") {
        Some(stripped) => (stripped, true),
        None => (type_text, false),
    };
    if type_text.is_empty() {
        return Err(RouteError::Syntax(format!("parameter without type '{}'", part)));
    }

    let ty = type_text
        .parse::<TypeExpr>()
        .map_err(|e| RouteError::Syntax(format!("{} in '{}'", e, part)))?;
    Ok(if rest {
        RouteSegment::TypedRestParam(ty)
    } else {
        RouteSegment::TypedParam(ty)
    })
}
