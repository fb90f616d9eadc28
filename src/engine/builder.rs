//! The request builder chain.
//!
//! Five stages run in a fixed order, each taking the partially built request
//! and the invocation context and returning the refined request:
//!
//! 1. path join (endpoint root + operation sub-path)
//! 2. `:name` placeholder substitution
//! 3. query string or form body
//! 4. headers
//! 5. entity body
//!
//! A failure in any stage aborts the chain and is reported as
//! [`Error::RequestBuild`] with a summary of the invocation.

use crate::constants;
use crate::descriptor::{NameValue, ParamRole};
use crate::engine::entity;
use crate::engine::request::{encode_pairs, HttpRequest, RequestBody};
use crate::error::Error;
use crate::invocation::{Argument, Binding, InvocationContext};
use regex::{Captures, Regex};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::warn;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("placeholder pattern is valid")
});

/// Runs the full chain for one invocation.
///
/// # Errors
///
/// Returns [`Error::RequestBuild`] wrapping the failing stage's error.
pub async fn build(ctx: &InvocationContext, entities: Vec<Argument>) -> Result<HttpRequest, Error> {
    run_stages(ctx, entities)
        .await
        .map_err(|source| Error::RequestBuild {
            context: ctx.summary(),
            source: Box::new(source),
        })
}

async fn run_stages(ctx: &InvocationContext, entities: Vec<Argument>) -> Result<HttpRequest, Error> {
    let request = HttpRequest::new(ctx.operation.method, ctx.base_url.clone());
    let request = join_path(ctx, request);
    let request = substitute_path_params(ctx, request)?;
    let request = apply_params(ctx, request)?;
    let request = apply_headers(ctx, request)?;
    apply_entity(ctx, request, entities).await
}

/// Stage 1: appends the operation's sub-path to the endpoint root.
#[must_use]
pub fn join_path(ctx: &InvocationContext, mut request: HttpRequest) -> HttpRequest {
    let joined = join_paths(request.url.path(), &ctx.operation.path);
    request.url.set_path(&joined);
    request
}

/// Joins two path segments with exactly one `/` between them.
#[must_use]
pub fn join_paths(root: &str, sub: &str) -> String {
    let root = root.trim_end_matches('/');
    let sub = sub.trim_start_matches('/');
    match (root.is_empty(), sub.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => root.to_string(),
        (true, false) => format!("/{sub}"),
        (false, false) => format!("{root}/{sub}"),
    }
}

/// Stage 2: replaces `:name` placeholders with bound path values.
///
/// Placeholders with no binding are left verbatim.
///
/// # Errors
///
/// Returns `NonTextualPathParameter` if a bound value is not text-representable.
pub fn substitute_path_params(
    ctx: &InvocationContext,
    mut request: HttpRequest,
) -> Result<HttpRequest, Error> {
    let mut values: HashMap<&str, String> = HashMap::new();
    for binding in ctx.bindings_with_role(ParamRole::Path) {
        let Some(name) = binding.name.as_deref() else {
            continue;
        };
        if binding.value.is_absent() {
            continue;
        }
        let text = binding
            .value
            .scalar_text()
            .ok_or_else(|| Error::NonTextualPathParameter {
                name: name.to_string(),
                kind: binding.value.kind(),
            })?;
        values.insert(name, urlencoding::encode(&text).into_owned());
    }

    if values.is_empty() {
        return Ok(request);
    }

    let substituted = PLACEHOLDER
        .replace_all(request.url.path(), |caps: &Captures<'_>| {
            values
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned();
    request.url.set_path(&substituted);
    Ok(request)
}

/// Stage 3: places static parameters and query/form bindings.
///
/// Query-class methods put static parameters and query bindings in the query
/// string. Body-class methods put static parameters and form bindings in a
/// url-encoded body and any query bindings in the query string. Static
/// parameters always precede bindings, and bindings keep parameter order.
///
/// # Errors
///
/// Returns `NonTextualParameter` if a bound value is not text-representable.
pub fn apply_params(
    ctx: &InvocationContext,
    mut request: HttpRequest,
) -> Result<HttpRequest, Error> {
    let operation = &ctx.operation;
    let statics = operation.params.iter().map(|NameValue { name, value }| (name.clone(), value.clone()));

    if operation.method.carries_body() {
        let mut form: Vec<(String, String)> = statics.collect();
        form.extend(text_pairs(ctx.bindings_with_role(ParamRole::Form), ParamRole::Form)?);
        let query = text_pairs(ctx.bindings_with_role(ParamRole::Query), ParamRole::Query)?;

        set_query(&mut request, &query);
        if !form.is_empty() {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(constants::CONTENT_TYPE_FORM));
            request.body = Some(RequestBody::Form(encode_pairs(&form)));
        }
    } else {
        let ignored = ctx.bindings_with_role(ParamRole::Form).count();
        if ignored > 0 {
            warn!(
                target: "tether::executor",
                endpoint = %ctx.endpoint.name,
                operation = %operation.name,
                "Ignoring {ignored} form parameter(s) on a {} request",
                operation.method
            );
        }
        let mut query: Vec<(String, String)> = statics.collect();
        query.extend(text_pairs(ctx.bindings_with_role(ParamRole::Query), ParamRole::Query)?);
        set_query(&mut request, &query);
    }
    Ok(request)
}

fn set_query(request: &mut HttpRequest, pairs: &[(String, String)]) {
    if !pairs.is_empty() {
        request.url.set_query(Some(&encode_pairs(pairs)));
    }
}

fn text_pairs<'a>(
    bindings: impl Iterator<Item = &'a Binding>,
    role: ParamRole,
) -> Result<Vec<(String, String)>, Error> {
    let mut pairs = Vec::new();
    for binding in bindings {
        let Some(name) = binding.name.as_deref() else {
            continue;
        };
        if binding.value.is_absent() {
            continue;
        }
        let value = binding
            .value
            .scalar_text()
            .ok_or_else(|| Error::NonTextualParameter {
                role,
                name: name.to_string(),
                kind: binding.value.kind(),
            })?;
        pairs.push((name.to_string(), value));
    }
    Ok(pairs)
}

/// Stage 4: applies static headers, then header bindings.
///
/// Absent or empty header values are skipped. A binding replaces a static
/// header of the same name.
///
/// # Errors
///
/// Returns `InvalidHeader` for names or values that are not valid HTTP, and
/// `NonTextualParameter` for bindings that hold neither text nor a header slot.
pub fn apply_headers(
    ctx: &InvocationContext,
    mut request: HttpRequest,
) -> Result<HttpRequest, Error> {
    for NameValue { name, value } in &ctx.operation.headers {
        let (name, value) = header_pair(name, value)?;
        request.headers.insert(name, value);
    }

    for binding in ctx.bindings_with_role(ParamRole::Header) {
        let Some(name) = binding.name.as_deref() else {
            continue;
        };
        let value = match &binding.value {
            Argument::Absent => None,
            Argument::Text(text) => Some(text.clone()),
            Argument::Header(slot) => slot.get(),
            other => {
                return Err(Error::NonTextualParameter {
                    role: ParamRole::Header,
                    name: name.to_string(),
                    kind: other.kind(),
                })
            }
        };
        let Some(value) = value.filter(|value| !value.is_empty()) else {
            continue;
        };
        let (name, value) = header_pair(name, &value)?;
        request.headers.insert(name, value);
    }
    Ok(request)
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), Error> {
    let header_name = HeaderName::from_str(name).map_err(|e| Error::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    let header_value = HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok((header_name, header_value))
}

/// Stage 5: resolves the entity argument and attaches it as the body.
///
/// The entity replaces any form body from stage 3. Its content type is set
/// unless a declared header already chose one other than the form type.
///
/// # Errors
///
/// Returns `MultipleEntity` for more than one entity and `EntityResolution`
/// if the entity cannot be turned into a body.
pub async fn apply_entity(
    ctx: &InvocationContext,
    mut request: HttpRequest,
    mut entities: Vec<Argument>,
) -> Result<HttpRequest, Error> {
    if entities.len() > 1 {
        return Err(Error::MultipleEntity {
            endpoint: ctx.endpoint.name.clone(),
            operation: ctx.operation.name.clone(),
            count: entities.len(),
        });
    }
    let Some(argument) = entities.pop() else {
        return Ok(request);
    };
    if argument.is_absent() {
        return Ok(request);
    }

    let body = entity::resolve(argument).await?;
    let keep_declared = request
        .header(CONTENT_TYPE.as_str())
        .is_some_and(|current| current != constants::CONTENT_TYPE_FORM);
    if !keep_declared {
        let content_type = HeaderValue::from_str(body.content_type()).map_err(|e| {
            Error::InvalidHeader {
                name: CONTENT_TYPE.to_string(),
                reason: e.to_string(),
            }
        })?;
        request.headers.insert(CONTENT_TYPE, content_type);
    }
    request.body = Some(body);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("/", "/feed"), "/feed");
        assert_eq!(join_paths("/api/", "feed"), "/api/feed");
        assert_eq!(join_paths("/api", ""), "/api");
        assert_eq!(join_paths("", ""), "/");
        assert_eq!(join_paths("/api", "/items/"), "/api/items/");
    }

    #[test]
    fn test_placeholder_pattern_stops_at_non_word_characters() {
        let names: Vec<_> = PLACEHOLDER
            .captures_iter("/users/:user_id/posts/:id.json")
            .map(|caps| caps[1].to_string())
            .collect();
        assert_eq!(names, vec!["user_id", "id"]);
    }
}
