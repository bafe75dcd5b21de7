use interceptor_flow::{
    cli::{analyze, CliArgs, OutputFormat},
    manifest::ServiceManifest,
    report::{EndpointReport, ReportBuilder},
    scanner::FileScanner,
    serializer::{serialize_json, serialize_yaml},
    type_table::TypeExpr,
    EndpointDescriptor, Marker, MiddlewareDecl, PipelineBuilder, PrimitiveKind, ReturnTypeInferrer,
    Route, RouteSegment, TypeOracle,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PETSTORE: &str = include_str!("fixtures/petstore.yaml");

/// Helper function to create a temporary manifest directory
fn create_manifest_dir(files: Vec<(&str, &str)>) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write manifest");
    }

    temp_dir
}

fn cli_args(path: &Path, service: Option<&str>) -> CliArgs {
    CliArgs {
        manifest_path: path.to_path_buf(),
        output_format: OutputFormat::Yaml,
        output_path: None,
        service: service.map(str::to_string),
        verbose: false,
    }
}

/// Parse a reported type back so member order does not matter
fn reported(ty: &Option<String>) -> Option<TypeExpr> {
    ty.as_deref().map(|s| s.parse().expect("reported type parses"))
}

fn ty(s: &str) -> TypeExpr {
    s.parse().unwrap()
}

fn endpoint<'a>(endpoints: &'a [EndpointReport], method: &str, route: &str) -> &'a EndpointReport {
    endpoints
        .iter()
        .find(|e| e.method == method && e.route == route)
        .unwrap_or_else(|| panic!("no endpoint {} {}", method, route))
}

#[test]
fn test_petstore_end_to_end() {
    let temp_dir = create_manifest_dir(vec![("petstore.yaml", PETSTORE)]);

    let scan_result = FileScanner::new(temp_dir.path().to_path_buf())
        .scan()
        .expect("Failed to scan directory");
    assert_eq!(scan_result.manifest_files.len(), 1);

    let report = analyze(&cli_args(temp_dir.path(), None)).expect("Analysis failed");
    assert_eq!(report.services.len(), 2);

    let petstore = &report.services[0];
    assert_eq!(petstore.name, "petstore");
    assert_eq!(petstore.interceptor_count, 4);

    // Cached and routed results are mapped by ErrorMapper, then wrapped by CorsHeaders
    let pets = endpoint(&petstore.endpoints, "get", "pets/[int]");
    assert_eq!(
        reported(&pets.from_interceptors),
        Some(ty("Forbidden|ErrorBody"))
    );
    assert_eq!(reported(&pets.from_target_resource), Some(ty("Pet|NotFound")));

    // The auth interceptor does not cover this route
    let owners = endpoint(&petstore.endpoints, "post", "owners");
    assert_eq!(
        reported(&owners.from_interceptors),
        Some(ty("Forbidden|ErrorBody"))
    );
    assert_eq!(reported(&owners.from_target_resource), Some(ty("Owner")));

    // Aliases are seen through
    let root = endpoint(&petstore.endpoints, "get", ".");
    assert_eq!(
        reported(&root.from_interceptors),
        Some(ty("Forbidden|ErrorBody"))
    );
    assert_eq!(reported(&root.from_target_resource), Some(ty("Pet?")));

    let health = &report.services[1];
    assert_eq!(health.interceptor_count, 0);
    assert_eq!(health.endpoints[0].from_interceptors, None);
    assert_eq!(health.endpoints[0].from_target_resource.as_deref(), Some("string"));
}

#[test]
fn test_yaml_and_json_manifests_agree() {
    let manifest = ServiceManifest::from_yaml_str(PETSTORE).unwrap();
    let yaml_value: serde_json::Value = serde_yaml::from_str(PETSTORE).unwrap();
    let json = serde_json::to_string(&yaml_value).unwrap();
    let temp_dir = create_manifest_dir(vec![
        ("yaml/petstore.yaml", PETSTORE),
        ("json/petstore.json", json.as_str()),
    ]);

    let from_yaml = analyze(&cli_args(&temp_dir.path().join("yaml"), None)).unwrap();
    let from_json = analyze(&cli_args(&temp_dir.path().join("json"), None)).unwrap();

    assert_eq!(from_yaml, from_json);
    assert_eq!(from_yaml.services.len(), manifest.services.len());
}

#[test]
fn test_report_serialization() {
    let manifest = ServiceManifest::from_yaml_str(PETSTORE).unwrap();
    let table = manifest.type_table().unwrap();
    let mut builder = ReportBuilder::new(&table);
    for service in &manifest.services {
        builder.add_service(service).unwrap();
    }
    let report = builder.build();

    let yaml = serialize_yaml(&report).expect("Failed to serialize to YAML");
    assert!(yaml.contains("name: petstore"));
    assert!(yaml.contains("interceptor_count: 4"));

    let json = serialize_json(&report).expect("Failed to serialize to JSON");
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["services"][1]["name"], "health");
}

#[test]
fn test_service_filter_across_manifests() {
    let temp_dir = create_manifest_dir(vec![
        ("a/petstore.yaml", PETSTORE),
        (
            "b/billing.yaml",
            "services:\n  - name: billing\n    endpoints:\n      - { method: get, route: invoices, returns: Invoice }\n",
        ),
    ]);

    let report = analyze(&cli_args(temp_dir.path(), Some("billing"))).unwrap();

    assert_eq!(report.services.len(), 1);
    assert_eq!(report.services[0].endpoints[0].route, "invoices");
}

#[test]
fn test_invalid_manifest_names_the_file() {
    let temp_dir = create_manifest_dir(vec![("broken.yaml", "services: [ { name: 1, endpoints: 3 } ]")]);

    let error = analyze(&cli_args(temp_dir.path(), None)).unwrap_err();

    assert!(format!("{:#}", error).contains("broken.yaml"));
}

/// Types as sets of names; a one-member set is a plain name
type Names = BTreeSet<&'static str>;

/// An oracle with no declared hierarchy beyond a few fixed relations
struct SetOracle;

impl SetOracle {
    fn supertype(name: &str) -> Option<&'static str> {
        match name {
            "auth" => Some("req"),
            "denied" | "gone" => Some("error"),
            _ => None,
        }
    }
}

impl TypeOracle for SetOracle {
    type Type = Names;

    fn is_subtype(&self, sub: &Names, sup: &Names) -> bool {
        sub.iter()
            .all(|name| sup.contains(name) || Self::supertype(name).is_some_and(|s| sup.contains(s)))
    }

    fn decompose_union(&self, ty: &Names) -> Vec<Names> {
        ty.iter().map(|name| Names::from([*name])).collect()
    }

    fn build_union(&self, members: &[Names]) -> Option<Names> {
        let union: Names = members.iter().flatten().copied().collect();
        (!union.is_empty()).then_some(union)
    }

    fn primitive_kind_of(&self, ty: &Names) -> Option<PrimitiveKind> {
        match ty.iter().collect::<Vec<_>>().as_slice() {
            [&"int"] => Some(PrimitiveKind::Int),
            [&"string"] => Some(PrimitiveKind::String),
            _ => None,
        }
    }

    fn marker(&self, marker: Marker) -> Names {
        let name = match marker {
            Marker::Continuation => "next",
            Marker::Error => "error",
            Marker::Nil => "nil",
            Marker::RequestInterceptor => "req",
            Marker::RequestErrorInterceptor => "req_error",
            Marker::ResponseInterceptor => "resp",
            Marker::ResponseErrorInterceptor => "resp_error",
        };
        Names::from([name])
    }
}

fn names(list: &[&'static str]) -> Names {
    list.iter().copied().collect()
}

#[test]
fn test_custom_oracle_drives_inference() {
    let oracle = SetOracle;
    let host_route = Route::segments(vec![
        RouteSegment::literal("pets"),
        RouteSegment::TypedParam(names(&["int"])),
    ])
    .unwrap();
    let decls = vec![MiddlewareDecl::routed(
        names(&["auth"]),
        "get",
        host_route,
        Some(names(&["next", "denied"])),
    )];
    let pipeline = PipelineBuilder::new(&oracle)
        .build(Some(decls.as_slice()))
        .unwrap();
    let inferrer = ReturnTypeInferrer::new(&oracle);

    // A literal id matches the int parameter
    let matching = EndpointDescriptor::new(
        "GET",
        Route::segments(vec![RouteSegment::literal("pets"), RouteSegment::literal("42")]).unwrap(),
        Some(names(&["pet", "gone"])),
    );
    let result = inferrer.infer(&pipeline, &matching).unwrap();
    assert_eq!(result.from_interceptors, Some(names(&["denied"])));
    assert_eq!(result.from_target_resource, Some(names(&["pet", "gone"])));

    let other = EndpointDescriptor::new(
        "get",
        Route::segments(vec![RouteSegment::literal("pets"), RouteSegment::literal("fido")]).unwrap(),
        Some(names(&["pet"])),
    );
    let result = inferrer.infer(&pipeline, &other).unwrap();
    assert_eq!(result.from_interceptors, None);
    assert_eq!(result.from_target_resource, Some(names(&["pet"])));
}

#[test]
fn test_missing_path_is_rejected() {
    let args = cli_args(&PathBuf::from("/definitely/not/here"), None);
    assert!(interceptor_flow::cli::parse_args_from_parsed(args).is_err());
}
