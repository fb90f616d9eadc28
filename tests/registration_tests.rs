use bytes::Bytes;
use reqwest::header::HeaderMap;
use tether::descriptor::{
    EndpointDescriptor, ParamAnnotation, ParamDecl, RequestDescriptor, ValueType,
};
use tether::engine::deserializer::{Deserializer, DeserializerRegistry, Payload};
use tether::engine::dispatcher::Dispatcher;
use tether::error::{Error, ErrorKind};
use tether::invocation::Argument;

fn endpoint(name: &str) -> EndpointDescriptor {
    EndpointDescriptor::new(name, "localhost").with_port("8080")
}

/// Produces the number of bytes in the body.
struct LengthDeserializer;

impl Deserializer for LengthDeserializer {
    fn output_type(&self) -> ValueType {
        ValueType::Custom("length".to_string())
    }

    fn deserialize(&self, body: &Bytes, _headers: &HeaderMap) -> Result<Payload, Error> {
        Ok(Payload::Custom(Box::new(body.len())))
    }
}

#[test]
fn test_register_lists_endpoint() {
    let dispatcher = Dispatcher::default();
    dispatcher
        .register(endpoint("svc").with_operation(RequestDescriptor::get("ping", "/ping")))
        .unwrap();
    assert_eq!(dispatcher.endpoint_names(), vec!["svc".to_string()]);
}

#[test]
fn test_missing_host_is_rejected() {
    let dispatcher = Dispatcher::default();
    let err = dispatcher
        .register(EndpointDescriptor::new("svc", "  "))
        .unwrap_err();
    assert!(matches!(err, Error::MissingHost { ref endpoint } if endpoint == "svc"));
    assert_eq!(err.kind(), ErrorKind::Metadata);
    assert!(dispatcher.endpoint_names().is_empty());
}

#[test]
fn test_malformed_port_is_rejected() {
    let dispatcher = Dispatcher::default();
    for port in ["http", "70000", "-1"] {
        let err = dispatcher
            .register(EndpointDescriptor::new("svc", "localhost").with_port(port))
            .unwrap_err();
        assert!(
            matches!(err, Error::MalformedPort { port: ref p, .. } if p == port),
            "port {port} gave {err:?}"
        );
    }
}

#[test]
fn test_failed_registration_can_be_retried() {
    let dispatcher = Dispatcher::default();
    assert!(dispatcher
        .register(EndpointDescriptor::new("svc", "localhost").with_port("nope"))
        .is_err());
    dispatcher.register(endpoint("svc")).unwrap();
}

#[test]
fn test_duplicate_endpoint_is_rejected() {
    let dispatcher = Dispatcher::default();
    dispatcher.register(endpoint("svc")).unwrap();
    let err = dispatcher.register(endpoint("svc")).unwrap_err();
    assert!(matches!(err, Error::DuplicateEndpoint { .. }));
}

#[test]
fn test_ambiguous_parameter_role_lists_roles_in_precedence_order() {
    let dispatcher = Dispatcher::default();
    let operation = RequestDescriptor::get("lookup", "/:id").with_param(
        ParamDecl::query("id").with(ParamAnnotation::Path("id".to_string())),
    );
    let err = dispatcher
        .register(endpoint("svc").with_operation(operation))
        .unwrap_err();
    match err {
        Error::AmbiguousParameterRole { index, roles, .. } => {
            assert_eq!(index, 0);
            assert_eq!(roles, "path, query");
        }
        other => panic!("expected AmbiguousParameterRole, got {other:?}"),
    }
}

#[test]
fn test_two_entities_are_rejected() {
    let dispatcher = Dispatcher::default();
    let operation = RequestDescriptor::post("upload", "/upload")
        .with_param(ParamDecl::entity())
        .with_param(ParamDecl::entity());
    let err = dispatcher
        .register(endpoint("svc").with_operation(operation))
        .unwrap_err();
    assert!(matches!(err, Error::MultipleEntity { count: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::Declaration);
}

#[test]
fn test_duplicate_operation_name_is_rejected() {
    let dispatcher = Dispatcher::default();
    let err = dispatcher
        .register(
            endpoint("svc")
                .with_operation(
                    RequestDescriptor::get("feed", "/users/:id").with_param(ParamDecl::path("id")),
                )
                .with_operation(
                    RequestDescriptor::get("feed", "/search").with_param(ParamDecl::query("q")),
                ),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DuplicateOperation { ref endpoint, ref operation }
            if endpoint == "svc" && operation == "feed"
    ));
    assert_eq!(err.kind(), ErrorKind::Declaration);
    assert!(dispatcher.endpoint_names().is_empty());
}

#[test]
fn test_check_reports_duplicate_operation() {
    let dispatcher = Dispatcher::default();
    let endpoint = endpoint("svc")
        .with_operation(RequestDescriptor::get("list", "/a"))
        .with_operation(RequestDescriptor::get("list", "/b"));
    assert!(matches!(
        dispatcher.check(&endpoint),
        Err(Error::DuplicateOperation { .. })
    ));
}

#[test]
fn test_text_return_defaults_to_plain() {
    let registry = DeserializerRegistry::default();
    let endpoint = endpoint("svc");
    let operation = RequestDescriptor::get("motd", "/motd").returning(ValueType::Text);
    let resolved = registry.resolve(&endpoint, &operation).unwrap();
    assert_eq!(resolved.tag, "plain");
}

#[test]
fn test_non_text_return_without_deserializer_is_undefined() {
    let dispatcher = Dispatcher::default();
    let operation = RequestDescriptor::get("items", "/items").returning(ValueType::Json);
    let err = dispatcher
        .register(endpoint("svc").with_operation(operation))
        .unwrap_err();
    assert!(matches!(err, Error::DeserializerUndefined { ref return_type, .. } if return_type == "json"));
}

#[test]
fn test_endpoint_deserializer_applies_to_operations() {
    let registry = DeserializerRegistry::default();
    let endpoint = endpoint("svc").with_deserializer("json");
    let operation = RequestDescriptor::get("items", "/items").returning(ValueType::Json);
    assert_eq!(registry.resolve(&endpoint, &operation).unwrap().tag, "json");
}

#[test]
fn test_operation_deserializer_overrides_endpoint() {
    let registry = DeserializerRegistry::default();
    let endpoint = endpoint("svc").with_deserializer("json");
    let operation = RequestDescriptor::get("blob", "/blob")
        .returning(ValueType::Bytes)
        .with_deserializer("raw");
    assert_eq!(registry.resolve(&endpoint, &operation).unwrap().tag, "raw");
}

#[test]
fn test_unassignable_deserializer_is_rejected() {
    let dispatcher = Dispatcher::default();
    let operation = RequestDescriptor::get("items", "/items")
        .returning(ValueType::Json)
        .with_deserializer("plain");
    let err = dispatcher
        .register(endpoint("svc").with_operation(operation))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DeserializerNotAssignable { ref output, ref declared, .. }
            if output == "text" && declared == "json"
    ));
}

#[test]
fn test_unknown_deserializer_tag_is_rejected() {
    let dispatcher = Dispatcher::default();
    let operation = RequestDescriptor::get("items", "/items")
        .returning(ValueType::Json)
        .with_deserializer("yaml");
    let err = dispatcher
        .register(endpoint("svc").with_operation(operation))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownDeserializer { ref tag } if tag == "yaml"));
}

#[test]
fn test_registered_custom_deserializer_resolves() {
    let registry = DeserializerRegistry::builder()
        .register("length", LengthDeserializer)
        .build();
    let dispatcher = Dispatcher::builder().with_deserializers(registry).build();
    let operation = RequestDescriptor::get("size", "/size")
        .returning(ValueType::Custom("length".to_string()))
        .with_deserializer("length");
    dispatcher
        .register(endpoint("svc").with_operation(operation))
        .unwrap();
}

#[test]
fn test_check_does_not_register() {
    let dispatcher = Dispatcher::default();
    dispatcher.check(&endpoint("svc")).unwrap();
    assert!(dispatcher.endpoint_names().is_empty());
}

#[test]
fn test_deregister_removes_endpoint() {
    let dispatcher = Dispatcher::default();
    dispatcher.register(endpoint("svc")).unwrap();
    assert!(dispatcher.deregister("svc"));
    assert!(!dispatcher.deregister("svc"));
    assert!(dispatcher.endpoint_names().is_empty());
}

#[tokio::test]
async fn test_invoke_unknown_endpoint() {
    let dispatcher = Dispatcher::default();
    let err = dispatcher.invoke("nope", "ping", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::UnknownEndpoint { .. }));
}

#[tokio::test]
async fn test_invoke_unknown_operation() {
    let dispatcher = Dispatcher::default();
    dispatcher.register(endpoint("svc")).unwrap();
    let err = dispatcher.invoke("svc", "ping", vec![]).await.unwrap_err();
    assert!(matches!(err, Error::UnknownOperation { .. }));
}

#[tokio::test]
async fn test_invoke_with_wrong_arity() {
    let dispatcher = Dispatcher::default();
    dispatcher
        .register(
            endpoint("svc")
                .with_operation(RequestDescriptor::get("feed", "/:id").with_param(ParamDecl::path("id"))),
        )
        .unwrap();
    let err = dispatcher
        .invoke("svc", "feed", vec![Argument::from("1"), Argument::from("2")])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ArgumentCount {
            expected: 1,
            actual: 2,
            ..
        }
    ));
}
