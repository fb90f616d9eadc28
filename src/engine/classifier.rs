//! Parameter classification and argument binding.
//!
//! Classification runs once per operation, at registration, and produces a
//! [`ParameterPlan`]. Binding runs per call and pairs the plan with the
//! caller's positional arguments.

use crate::descriptor::{EndpointDescriptor, ParamRole, RequestDescriptor};
use crate::error::Error;
use crate::invocation::{Argument, AsyncHandler, Binding};
use std::sync::Arc;

/// The role and name assigned to one declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedParam {
    pub index: usize,
    pub role: ParamRole,
    pub name: Option<String>,
}

/// Classified parameters of one operation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterPlan {
    pub params: Vec<ClassifiedParam>,
}

impl ParameterPlan {
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[must_use]
    pub fn count(&self, role: ParamRole) -> usize {
        self.params.iter().filter(|param| param.role == role).count()
    }
}

/// Classifies every parameter of `operation`.
///
/// # Errors
///
/// Returns `AmbiguousParameterRole` if a parameter carries more than one role
/// annotation and `MultipleEntity` if more than one parameter is an entity.
pub fn classify(
    endpoint: &EndpointDescriptor,
    operation: &RequestDescriptor,
) -> Result<ParameterPlan, Error> {
    let mut params = Vec::with_capacity(operation.parameters.len());

    for (index, decl) in operation.parameters.iter().enumerate() {
        let classified = match decl.annotations.as_slice() {
            [] => ClassifiedParam {
                index,
                role: ParamRole::Unused,
                name: None,
            },
            [annotation] => ClassifiedParam {
                index,
                role: annotation.role(),
                name: annotation.name().map(str::to_string),
            },
            annotations => {
                let mut roles: Vec<ParamRole> =
                    annotations.iter().map(|a| a.role()).collect();
                roles.sort_by_key(ParamRole::precedence);
                return Err(Error::AmbiguousParameterRole {
                    endpoint: endpoint.name.clone(),
                    operation: operation.name.clone(),
                    index,
                    roles: roles
                        .iter()
                        .map(ParamRole::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        };
        params.push(classified);
    }

    let plan = ParameterPlan { params };
    let entities = plan.count(ParamRole::Entity);
    if entities > 1 {
        return Err(Error::MultipleEntity {
            endpoint: endpoint.name.clone(),
            operation: operation.name.clone(),
            count: entities,
        });
    }
    Ok(plan)
}

/// Arguments of one call, sorted by role.
#[derive(Default)]
pub struct BoundArguments {
    pub bindings: Vec<Binding>,
    /// Entity values, moved out of their bindings for the entity stage.
    pub entities: Vec<Argument>,
    pub callback: Option<Arc<dyn AsyncHandler>>,
}

/// Pairs `args` with `plan`.
///
/// An unannotated argument holding a callback is bound as the callback. When a
/// POST or PUT declares no entity, no form parameter and no static parameter,
/// a single present unannotated argument becomes the implicit entity.
///
/// # Errors
///
/// Returns `ArgumentCount` if the number of arguments differs from the number
/// of declared parameters.
pub fn bind(
    endpoint: &EndpointDescriptor,
    operation: &RequestDescriptor,
    plan: &ParameterPlan,
    args: Vec<Argument>,
) -> Result<BoundArguments, Error> {
    if args.len() != plan.len() {
        return Err(Error::ArgumentCount {
            endpoint: endpoint.name.clone(),
            operation: operation.name.clone(),
            expected: plan.len(),
            actual: args.len(),
        });
    }

    let mut bound = BoundArguments::default();
    for (param, value) in plan.params.iter().zip(args) {
        let mut role = param.role;
        if let (ParamRole::Unused, Argument::Callback(handler)) = (role, &value) {
            if bound.callback.is_none() {
                bound.callback = Some(Arc::clone(handler));
            }
            role = ParamRole::Callback;
        }
        let value = if role == ParamRole::Entity {
            bound.entities.push(value);
            Argument::Absent
        } else {
            value
        };
        bound.bindings.push(Binding {
            index: param.index,
            name: param.name.clone(),
            role,
            value,
        });
    }

    if bound.entities.is_empty()
        && operation.method.carries_body()
        && plan.count(ParamRole::Form) == 0
        && operation.params.is_empty()
    {
        promote_implicit_entity(&mut bound);
    }

    Ok(bound)
}

fn promote_implicit_entity(bound: &mut BoundArguments) {
    let mut candidates = bound
        .bindings
        .iter_mut()
        .filter(|binding| binding.role == ParamRole::Unused && !binding.value.is_absent());
    let (Some(candidate), None) = (candidates.next(), candidates.next()) else {
        return;
    };
    candidate.role = ParamRole::Entity;
    let value = std::mem::replace(&mut candidate.value, Argument::Absent);
    bound.entities.push(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ParamAnnotation, ParamDecl};

    fn endpoint() -> EndpointDescriptor {
        EndpointDescriptor::new("svc", "localhost")
    }

    #[test]
    fn test_single_annotation_assigns_role_and_name() {
        let op = RequestDescriptor::get("search", "/search")
            .with_param(ParamDecl::query("q"))
            .with_param(ParamDecl::header("X-Trace"))
            .with_param(ParamDecl::unused());
        let plan = classify(&endpoint(), &op).unwrap();
        let roles: Vec<_> = plan.params.iter().map(|p| p.role).collect();
        assert_eq!(
            roles,
            vec![ParamRole::Query, ParamRole::Header, ParamRole::Unused]
        );
        assert_eq!(plan.params[0].name.as_deref(), Some("q"));
        assert_eq!(plan.params[2].name, None);
    }

    #[test]
    fn test_two_annotations_are_ambiguous() {
        let op = RequestDescriptor::get("search", "/search/:q").with_param(
            ParamDecl::header("q").with(ParamAnnotation::Path("q".into())),
        );
        let err = classify(&endpoint(), &op).unwrap_err();
        match err {
            Error::AmbiguousParameterRole { index, roles, .. } => {
                assert_eq!(index, 0);
                assert_eq!(roles, "path, header");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_second_entity_is_rejected_at_classification() {
        let op = RequestDescriptor::post("upload", "/upload")
            .with_param(ParamDecl::entity())
            .with_param(ParamDecl::entity());
        assert!(matches!(
            classify(&endpoint(), &op),
            Err(Error::MultipleEntity { count: 2, .. })
        ));
    }

    #[test]
    fn test_bind_rejects_wrong_arity() {
        let op = RequestDescriptor::get("feed", "/:id").with_param(ParamDecl::path("id"));
        let plan = classify(&endpoint(), &op).unwrap();
        assert!(matches!(
            bind(&endpoint(), &op, &plan, vec![]),
            Err(Error::ArgumentCount {
                expected: 1,
                actual: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_single_unused_argument_becomes_entity_for_put() {
        let op = RequestDescriptor::put("store", "/store")
            .with_param(ParamDecl::header("X-Id"))
            .with_param(ParamDecl::unused());
        let plan = classify(&endpoint(), &op).unwrap();
        let bound = bind(&endpoint(), &op, &plan, vec!["7".into(), "hello".into()]).unwrap();
        assert_eq!(bound.entities.len(), 1);
        assert_eq!(bound.bindings[1].role, ParamRole::Entity);
    }

    #[test]
    fn test_unused_argument_stays_unused_for_get() {
        let op = RequestDescriptor::get("feed", "/feed").with_param(ParamDecl::unused());
        let plan = classify(&endpoint(), &op).unwrap();
        let bound = bind(&endpoint(), &op, &plan, vec!["hello".into()]).unwrap();
        assert!(bound.entities.is_empty());
        assert_eq!(bound.bindings[0].role, ParamRole::Unused);
    }

    #[test]
    fn test_two_unused_arguments_are_not_promoted() {
        let op = RequestDescriptor::post("store", "/store")
            .with_param(ParamDecl::unused())
            .with_param(ParamDecl::unused());
        let plan = classify(&endpoint(), &op).unwrap();
        let bound = bind(&endpoint(), &op, &plan, vec!["a".into(), "b".into()]).unwrap();
        assert!(bound.entities.is_empty());
    }
}
