//! Recursive option validation.
//!
//! For each declared option, in schema order, the validator locates the
//! value (or injects the default, or reports a missing required option),
//! runs it through the [type matchers](crate::Type), and stores the possibly
//! cast result. The first error stops the walk.
//!
//! # Examples
//!
//! ```
//! use option_schema_core::*;
//!
//! let schema = Schema::new()
//!     .with_option("stages", OptionSpec::new(Type::PosInteger).with_default(Value::from(10)));
//!
//! let opts = validate(&Value::keyword::<&str, _>([]), &schema).unwrap();
//! assert_eq!(opts, Value::keyword([("stages", Value::from(10))]));
//!
//! let err = validate(&Value::keyword([("stages", Value::from(0))]), &schema).unwrap_err();
//! assert_eq!(err.key, ErrorKey::Single(Value::atom("stages")));
//! ```

use tracing::warn;

use crate::error::Failure;
use crate::matcher::{match_type, Context, Label};
use crate::{ErrorKey, OptionSpec, Schema, ToCompiled, ValidationError, Value};

/// Validates `options` against a schema or a compiled schema.
///
/// Returns the normalized options: defaults injected, custom casts applied.
/// Passing a plain [`Schema`] checks it against the meta-schema on every
/// call; compile it once with [`compile`](crate::compile) to skip that.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered.
///
/// # Panics
///
/// Panics on a [`ContractFault`](crate::ContractFault): an invalid schema, or
/// a custom validator returning something other than an ok/error tuple.
pub fn validate<S>(options: &Value, schema: &S) -> Result<Value, ValidationError>
where
    S: ToCompiled + ?Sized,
{
    let compiled = schema.to_compiled();
    match validate_options(compiled.schema(), options, false) {
        Ok(normalized) => Ok(normalized),
        Err(Failure::Invalid(error)) => Err(*error),
        Err(Failure::Fault(fault)) => panic!("{fault}"),
    }
}

/// Like [`validate`], but panics with the rendered message on a validation
/// error too.
///
/// # Panics
///
/// Panics on any validation error or contract fault.
pub fn validate_or_panic<S>(options: &Value, schema: &S) -> Value
where
    S: ToCompiled + ?Sized,
{
    match validate(options, schema) {
        Ok(normalized) => normalized,
        Err(error) => panic!("{error}"),
    }
}

#[derive(Clone, Copy)]
enum Shape {
    Keyword,
    Map,
}

/// Validates a keyword list or map against `schema`.
///
/// Errors carry a `keys_path` relative to `options`; callers prefix their
/// own key as the error travels up.
pub(crate) fn validate_options(
    schema: &Schema,
    options: &Value,
    redact: bool,
) -> Result<Value, Failure> {
    let (shape, mut working) = match options {
        Value::Keyword(pairs) => (
            Shape::Keyword,
            pairs
                .iter()
                .map(|(k, v)| (Value::Atom(k.clone()), v.clone()))
                .collect::<Vec<_>>(),
        ),
        Value::Map(pairs) => (Shape::Map, pairs.clone()),
        v if v.is_empty_sequence() => (Shape::Keyword, Vec::new()),
        other => {
            let message = format!("expected options to be a keyword list or map, got: {other}");
            return Err(ValidationError::new(ErrorKey::Root, message)
                .with_value(other.clone())
                .into());
        }
    };

    let present = present_keys(&working);
    let entries = schema.expand(&present);

    let unknown: Vec<Value> = present
        .iter()
        .filter(|key| !entries.iter().any(|(declared, _)| declared == *key))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        let declared = Value::List(entries.iter().map(|(key, _)| key.clone()).collect());
        let message = format!(
            "unknown options {}, valid options are: {declared}",
            Value::List(unknown.clone())
        );
        return Err(ValidationError::new(ErrorKey::Unknown(unknown), message).into());
    }

    for (key, spec) in &entries {
        validate_option(key, spec, &mut working, redact)?;
    }

    Ok(rebuild(shape, working))
}

fn validate_option(
    key: &Value,
    spec: &OptionSpec,
    working: &mut Vec<(Value, Value)>,
    redact: bool,
) -> Result<(), Failure> {
    let label = Label::Option(key);

    // Required wins over default: a required option with a default still
    // fails when absent.
    let value = match lookup(working, key) {
        Some(value) => value.clone(),
        None if spec.required => {
            let message = format!(
                "required {label} not found, received options: {}",
                Value::List(present_keys(working))
            );
            return Err(ValidationError::new(ErrorKey::Single(key.clone()), message).into());
        }
        None => match &spec.default {
            Some(default) => {
                working.push((key.clone(), default.clone()));
                default.clone()
            }
            None => return Ok(()),
        },
    };

    if let Some(message) = &spec.deprecated {
        warn!(target: "option_schema::deprecated", option = %key, "{label} is deprecated. {message}");
    }

    let cx = Context {
        key,
        redact: redact || spec.redact,
    };
    let validated = match_type(&spec.effective_type(), &label, &value, &cx)?;
    store(working, key, validated, spec.rename_to.as_deref());
    Ok(())
}

fn present_keys(working: &[(Value, Value)]) -> Vec<Value> {
    let mut keys: Vec<Value> = Vec::with_capacity(working.len());
    for (key, _) in working {
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }
    keys
}

fn lookup<'a>(working: &'a [(Value, Value)], key: &Value) -> Option<&'a Value> {
    working.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn store(working: &mut Vec<(Value, Value)>, key: &Value, value: Value, rename_to: Option<&str>) {
    let target = match rename_to {
        Some(new_key) => {
            working.retain(|(k, _)| k != key);
            Value::atom(new_key)
        }
        None => key.clone(),
    };

    let mut seen = false;
    working.retain_mut(|(k, v)| {
        if *k != target {
            return true;
        }
        if seen {
            return false;
        }
        seen = true;
        *v = value.clone();
        true
    });
    if !seen {
        working.push((target, value));
    }
}

fn rebuild(shape: Shape, working: Vec<(Value, Value)>) -> Value {
    match shape {
        Shape::Map => Value::Map(working),
        Shape::Keyword => Value::Keyword(
            working
                .into_iter()
                .map(|(key, value)| {
                    let name = match key {
                        Value::Atom(name) | Value::String(name) => name,
                        other => other.to_string(),
                    };
                    (name, value)
                })
                .collect(),
        ),
    }
}
