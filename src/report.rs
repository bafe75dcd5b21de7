//! Analysis report model and builder.

use crate::inference::{ReturnTypeInferrer, ReturnTypes};
use crate::manifest::ServiceDecl;
use crate::pipeline::PipelineBuilder;
use crate::type_table::{TypeExpr, TypeTable};
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Result types of every analyzed endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub services: Vec<ServiceReport>,
}

/// One analyzed service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceReport {
    pub name: String,
    /// Number of interceptors in the pipeline
    pub interceptor_count: usize,
    pub endpoints: Vec<EndpointReport>,
}

/// Observable result types of one endpoint, rendered as type expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointReport {
    pub method: String,
    pub route: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_interceptors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_target_resource: Option<String>,
}

impl EndpointReport {
    fn new(method: &str, route: String, return_types: &ReturnTypes<TypeExpr>) -> Self {
        Self {
            method: method.to_string(),
            route,
            from_interceptors: return_types.from_interceptors.as_ref().map(ToString::to_string),
            from_target_resource: return_types
                .from_target_resource
                .as_ref()
                .map(ToString::to_string),
        }
    }
}

/// Analyzes services one at a time and collects their reports
pub struct ReportBuilder<'t> {
    table: &'t TypeTable,
    services: Vec<ServiceReport>,
}

impl<'t> ReportBuilder<'t> {
    pub fn new(table: &'t TypeTable) -> Self {
        Self {
            table,
            services: Vec::new(),
        }
    }

    /// Build the service pipeline and infer the result types of each endpoint
    pub fn add_service(&mut self, service: &ServiceDecl) -> Result<&mut Self> {
        debug!("Analyzing service '{}'", service.name);

        let middleware = service.middleware(self.table)?;
        let pipeline = PipelineBuilder::new(self.table)
            .build(middleware.as_deref())
            .with_context(|| format!("Failed to build pipeline of service '{}'", service.name))?;

        let inferrer = ReturnTypeInferrer::new(self.table);
        let mut endpoints = Vec::new();
        for endpoint in service.endpoints()? {
            let return_types = inferrer.infer(&pipeline, &endpoint).with_context(|| {
                format!(
                    "Failed to infer return types of {} {} in service '{}'",
                    endpoint.method_name, endpoint.route, service.name
                )
            })?;
            endpoints.push(EndpointReport::new(
                &endpoint.method_name,
                endpoint.route.to_string(),
                &return_types,
            ));
        }

        info!(
            "Service '{}': {} interceptors, {} endpoints",
            service.name,
            pipeline.len(),
            endpoints.len()
        );
        self.services.push(ServiceReport {
            name: service.name.clone(),
            interceptor_count: pipeline.len(),
            endpoints,
        });
        Ok(self)
    }

    pub fn build(self) -> AnalysisReport {
        AnalysisReport {
            services: self.services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ServiceManifest;
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
types:
  Auth: { supertypes: [RequestInterceptor] }
  Unauthorized: { supertypes: [error] }
  NotFound: { supertypes: [error] }
services:
  - name: petstore
    interceptors:
      - type: Auth
        method: default
        route: "pets/[string... rest]"
        returns: "NextService|Unauthorized"
    endpoints:
      - method: get
        route: "pets/[int id]"
        returns: "Pet|NotFound"
      - method: get
        route: "owners"
        returns: "Owner"
"#;

    fn analyze(yaml: &str) -> Result<AnalysisReport> {
        let manifest = ServiceManifest::from_yaml_str(yaml)?;
        let table = manifest.type_table()?;
        let mut builder = ReportBuilder::new(&table);
        for service in &manifest.services {
            builder.add_service(service)?;
        }
        Ok(builder.build())
    }

    #[test]
    fn test_new_builder_is_empty() {
        let table = TypeTable::default();
        assert_eq!(ReportBuilder::new(&table).build(), AnalysisReport::default());
    }

    #[test]
    fn test_report_per_endpoint() {
        let report = analyze(MANIFEST).unwrap();
        let service = &report.services[0];

        assert_eq!(service.name, "petstore");
        assert_eq!(service.interceptor_count, 1);
        assert_eq!(
            service.endpoints,
            vec![
                EndpointReport {
                    method: "get".to_string(),
                    route: "pets/[int]".to_string(),
                    from_interceptors: Some("Unauthorized".to_string()),
                    from_target_resource: Some("Pet|NotFound".to_string()),
                },
                EndpointReport {
                    method: "get".to_string(),
                    route: "owners".to_string(),
                    from_interceptors: None,
                    from_target_resource: Some("Owner".to_string()),
                },
            ]
        );
    }

    #[test]
    fn test_unrecognized_middleware_names_the_service() {
        let yaml = r#"
services:
  - name: broken
    interceptors:
      - type: Pet
    endpoints: []
"#;
        let error = analyze(yaml).unwrap_err();
        let message = format!("{:#}", error);

        assert!(message.contains("service 'broken'"));
        assert!(message.contains("not a recognized interceptor kind"));
    }
}
