//! Type matchers.
//!
//! [`match_type`] checks one value against one [`Type`] and returns the
//! value to store, which differs from the input when a custom validator casts
//! it or a nested schema injects defaults. Errors raised here carry an empty
//! `keys_path`; nested schema errors arrive already prefixed with the key of
//! the option that holds them, which is how combinators tell the two apart.

use std::fmt;

use crate::error::{Failure, scrub_literal};
use crate::types::{Custom, MapType};
use crate::validate::validate_options;
use crate::{ContractFault, ErrorKey, Schema, Type, ValidationError, Value};

/// What a message is talking about.
pub(crate) enum Label<'a> {
    Option(&'a Value),
    ListElement(usize),
    TupleElement(usize),
    MapKey,
    MapValue(&'a Value),
}

impl fmt::Display for Label<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Option(key) => write!(f, "{key} option"),
            Label::ListElement(index) => write!(f, "list element at position {index}"),
            Label::TupleElement(index) => write!(f, "tuple element at position {index}"),
            Label::MapKey => f.write_str("map key"),
            Label::MapValue(key) => write!(f, "map key {key}"),
        }
    }
}

/// The option being matched.
pub(crate) struct Context<'a> {
    pub key: &'a Value,
    pub redact: bool,
}

impl Context<'_> {
    fn error(&self, value: &Value, message: String) -> Failure {
        let error = ValidationError::new(ErrorKey::Single(self.key.clone()), message);
        let error = if self.redact { error.redacted() } else { error };
        error.with_value(value.clone()).into()
    }

    fn mismatch(&self, label: &Label<'_>, value: &Value, expected: &str) -> Failure {
        let message = if self.redact {
            format!("invalid value for {label}: expected {expected}")
        } else {
            format!("invalid value for {label}: expected {expected}, got: {value}")
        };
        self.error(value, message)
    }

    fn nested(&self, schema: &Schema, value: &Value) -> Result<Value, Failure> {
        validate_options(schema, value, self.redact).map_err(|failure| match failure {
            Failure::Invalid(error) => error.prefix_path(std::slice::from_ref(self.key)).into(),
            fault => fault,
        })
    }

    /// Wraps a direct element failure from a container; nested schema
    /// errors and faults pass through unchanged.
    fn wrap_element(&self, failure: Failure, container: &Value, prefix: String) -> Failure {
        match failure {
            Failure::Invalid(error) if error.keys_path.is_empty() => {
                self.error(container, format!("{prefix}: {}", error.message))
            }
            other => other,
        }
    }
}

pub(crate) fn match_type(
    ty: &Type,
    label: &Label<'_>,
    value: &Value,
    cx: &Context<'_>,
) -> Result<Value, Failure> {
    match ty {
        Type::Any => Ok(value.clone()),
        Type::KeywordList(schema) => match value {
            Value::Keyword(_) => keyword(schema.as_ref(), value, cx),
            v if v.is_empty_sequence() => keyword(schema.as_ref(), &Value::Keyword(Vec::new()), cx),
            _ => Err(cx.mismatch(label, value, "keyword list")),
        },
        Type::NonEmptyKeywordList(schema) => match value {
            Value::Keyword(pairs) if !pairs.is_empty() => keyword(schema.as_ref(), value, cx),
            _ => Err(cx.mismatch(label, value, "non-empty keyword list")),
        },
        Type::Map(shape) => match_map(shape, label, value, cx),
        Type::Atom => scalar(matches!(value, Value::Atom(_)), label, value, cx, "atom"),
        Type::Integer => scalar(matches!(value, Value::Integer(_)), label, value, cx, "integer"),
        Type::NonNegInteger => scalar(
            matches!(value, Value::Integer(i) if *i >= 0),
            label,
            value,
            cx,
            "non negative integer",
        ),
        Type::PosInteger => scalar(
            matches!(value, Value::Integer(i) if *i > 0),
            label,
            value,
            cx,
            "positive integer",
        ),
        Type::Float => scalar(matches!(value, Value::Float(_)), label, value, cx, "float"),
        Type::String => scalar(matches!(value, Value::String(_)), label, value, cx, "string"),
        Type::Boolean => scalar(matches!(value, Value::Bool(_)), label, value, cx, "boolean"),
        Type::Timeout => scalar(
            match value {
                Value::Integer(i) => *i >= 0,
                Value::Atom(name) => name == "infinity",
                _ => false,
            },
            label,
            value,
            cx,
            "non-negative integer or :infinity",
        ),
        Type::Pid => scalar(matches!(value, Value::Pid(_)), label, value, cx, "pid"),
        Type::Reference => scalar(matches!(value, Value::Ref(_)), label, value, cx, "reference"),
        Type::Mfa => {
            let ok = matches!(
                value,
                Value::Tuple(items)
                    if matches!(items.as_slice(), [Value::Atom(_), Value::Atom(_), args] if is_list(args))
            );
            scalar(ok, label, value, cx, "tuple {mod, fun, args}")
        }
        Type::ModArg => {
            let ok = matches!(
                value,
                Value::Tuple(items) if matches!(items.as_slice(), [Value::Atom(_), args] if is_list(args))
            );
            scalar(ok, label, value, cx, "tuple {mod, args}")
        }
        Type::Nil => scalar(matches!(value, Value::Nil), label, value, cx, "nil"),
        Type::Fun(arity) => match value {
            Value::Function(fun) if fun.arity() == *arity => Ok(value.clone()),
            Value::Function(fun) => Err(cx.error(
                value,
                format!(
                    "invalid value for {label}: expected function of arity {arity}, got: function of arity {}",
                    fun.arity()
                ),
            )),
            _ => Err(cx.mismatch(label, value, &format!("function of arity {arity}"))),
        },
        Type::In(choices) => {
            if choices.contains(value) {
                Ok(value.clone())
            } else {
                Err(cx.mismatch(label, value, &format!("one of {choices}")))
            }
        }
        Type::Custom(custom) => match_custom(custom, value, cx),
        Type::Or(subtypes) => match_or(subtypes, label, value, cx),
        Type::ListOf(subtype) => {
            let items: &[Value] = match value {
                Value::List(items) => items,
                v if v.is_empty_sequence() => &[],
                _ => return Err(cx.mismatch(label, value, "list")),
            };
            let mut updated = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let element = match_type(subtype, &Label::ListElement(index), item, cx)
                    .map_err(|f| cx.wrap_element(f, value, format!("invalid list in {label}")))?;
                updated.push(element);
            }
            Ok(Value::List(updated))
        }
        Type::TupleOf(subtypes) => {
            let items = match value {
                Value::Tuple(items) if items.len() == subtypes.len() => items,
                _ => {
                    let expected = format!("tuple with {} elements", subtypes.len());
                    return Err(cx.mismatch(label, value, &expected));
                }
            };
            let mut updated = Vec::with_capacity(items.len());
            for (index, (subtype, item)) in subtypes.iter().zip(items).enumerate() {
                let element = match_type(subtype, &Label::TupleElement(index), item, cx)
                    .map_err(|f| cx.wrap_element(f, value, format!("invalid tuple in {label}")))?;
                updated.push(element);
            }
            Ok(Value::Tuple(updated))
        }
        Type::Struct(name) => scalar(
            matches!(value, Value::Struct(s) if s.name == *name),
            label,
            value,
            cx,
            &format!("%{name}{{}}"),
        ),
    }
}

fn scalar(
    ok: bool,
    label: &Label<'_>,
    value: &Value,
    cx: &Context<'_>,
    expected: &str,
) -> Result<Value, Failure> {
    if ok {
        Ok(value.clone())
    } else {
        Err(cx.mismatch(label, value, expected))
    }
}

fn is_list(value: &Value) -> bool {
    matches!(value, Value::List(_)) || value.is_empty_sequence()
}

fn keyword(schema: Option<&Schema>, value: &Value, cx: &Context<'_>) -> Result<Value, Failure> {
    match schema {
        Some(schema) => cx.nested(schema, value),
        None => Ok(value.clone()),
    }
}

fn match_map(
    shape: &MapType,
    label: &Label<'_>,
    value: &Value,
    cx: &Context<'_>,
) -> Result<Value, Failure> {
    let pairs = match value {
        Value::Map(pairs) => pairs,
        _ => return Err(cx.mismatch(label, value, "map")),
    };
    match shape {
        MapType::Any => Ok(value.clone()),
        MapType::Keys(schema) => cx.nested(schema, value),
        MapType::Entries(key_type, value_type) => {
            let mut updated = Vec::with_capacity(pairs.len());
            for (key, item) in pairs {
                let key_out = match_type(key_type, &Label::MapKey, key, cx)
                    .map_err(|f| cx.wrap_element(f, value, format!("invalid map in {label}")))?;
                let item_out = match_type(value_type, &Label::MapValue(key), item, cx)
                    .map_err(|f| cx.wrap_element(f, value, format!("invalid map in {label}")))?;
                updated.push((key_out, item_out));
            }
            Ok(Value::Map(updated))
        }
    }
}

fn match_custom(custom: &Custom, value: &Value, cx: &Context<'_>) -> Result<Value, Failure> {
    let mut args = Vec::with_capacity(custom.args.len() + 1);
    args.push(value.clone());
    args.extend(custom.args.iter().cloned());

    let returned = custom.validator.call(&args);
    if let Value::Tuple(items) = &returned {
        match items.as_slice() {
            [Value::Atom(tag), cast] if tag == "ok" => return Ok(cast.clone()),
            [Value::Atom(tag), Value::String(message)] if tag == "error" => {
                let message = if cx.redact {
                    scrub_literal(message, value)
                } else {
                    message.clone()
                };
                return Err(cx.error(value, message));
            }
            _ => {}
        }
    }
    Err(ContractFault::MalformedValidatorResult {
        validator: format!("{}/{}", custom.validator.name(), custom.validator.arity()),
        returned,
    }
    .into())
}

fn match_or(
    subtypes: &[Type],
    label: &Label<'_>,
    value: &Value,
    cx: &Context<'_>,
) -> Result<Value, Failure> {
    let mut reasons = Vec::with_capacity(subtypes.len());
    for subtype in subtypes {
        match match_type(subtype, label, value, cx) {
            Ok(value) => return Ok(value),
            Err(Failure::Invalid(error)) => reasons.push(error),
            Err(fault) => return Err(fault),
        }
    }

    // Most recent attempt first.
    let bullets = reasons
        .iter()
        .rev()
        .map(|error| bullet(&error.render()))
        .collect::<Vec<_>>()
        .join("\n");
    Err(cx.error(
        value,
        format!(
            "expected {label} to match at least one given type, but didn't match any. \
             Here are the reasons why it didn't match each of the allowed types:\n\n{bullets}"
        ),
    ))
}

fn bullet(text: &str) -> String {
    let mut lines = text.lines();
    let mut out = format!("  * {}", lines.next().unwrap_or_default());
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str("    ");
            out.push_str(line);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Function;

    fn check(ty: &Type, value: Value) -> Result<Value, String> {
        let key = Value::atom("opt");
        let cx = Context {
            key: &key,
            redact: false,
        };
        match match_type(ty, &Label::Option(&key), &value, &cx) {
            Ok(value) => Ok(value),
            Err(Failure::Invalid(error)) => Err(error.message),
            Err(Failure::Fault(fault)) => Err(format!("FAULT: {fault}")),
        }
    }

    fn check_redacted(ty: &Type, value: Value) -> ValidationError {
        let key = Value::atom("opt");
        let cx = Context {
            key: &key,
            redact: true,
        };
        match match_type(ty, &Label::Option(&key), &value, &cx) {
            Err(Failure::Invalid(error)) => *error,
            other => panic!("expected a validation error, got: {other:?}"),
        }
    }

    #[test]
    fn test_scalar_messages() {
        assert_eq!(
            check(&Type::Integer, Value::from("10")).unwrap_err(),
            r#"invalid value for :opt option: expected integer, got: "10""#
        );
        assert_eq!(
            check(&Type::PosInteger, Value::from(0)).unwrap_err(),
            "invalid value for :opt option: expected positive integer, got: 0"
        );
        assert!(check(&Type::NonNegInteger, Value::from(0)).is_ok());
    }

    #[test]
    fn test_timeout() {
        assert!(check(&Type::Timeout, Value::atom("infinity")).is_ok());
        assert!(check(&Type::Timeout, Value::from(0)).is_ok());
        assert_eq!(
            check(&Type::Timeout, Value::from(-1)).unwrap_err(),
            "invalid value for :opt option: expected non-negative integer or :infinity, got: -1"
        );
    }

    #[test]
    fn test_mfa_and_mod_arg() {
        let mfa = Value::Tuple(vec![Value::atom("Mod"), Value::atom("fun"), Value::list([])]);
        assert!(check(&Type::Mfa, mfa).is_ok());

        let bad = Value::Tuple(vec![Value::atom("Mod"), Value::from("fun"), Value::list([])]);
        assert!(check(&Type::Mfa, bad).unwrap_err().contains("expected tuple {mod, fun, args}"));

        let mod_arg = Value::Tuple(vec![Value::atom("Mod"), Value::list([Value::from(1)])]);
        assert!(check(&Type::ModArg, mod_arg).is_ok());
        let bad = Value::Tuple(vec![Value::atom("Mod"), Value::from(1)]);
        assert!(check(&Type::ModArg, bad).unwrap_err().contains("expected tuple {mod, args}"));
    }

    #[test]
    fn test_function_arity_mismatch_quotes_actual_arity() {
        let fun = Value::Function(Function::new("handler", 1, |_| Value::Nil));
        assert_eq!(
            check(&Type::Fun(2), fun).unwrap_err(),
            "invalid value for :opt option: expected function of arity 2, got: function of arity 1"
        );
        assert!(check(&Type::Fun(2), Value::from(1)).unwrap_err().ends_with("got: 1"));
    }

    #[test]
    fn test_in_choices_and_range() {
        let ty = Type::one_of([Value::atom("a"), Value::atom("b")]);
        assert_eq!(
            check(&ty, Value::atom("c")).unwrap_err(),
            "invalid value for :opt option: expected one of [:a, :b], got: :c"
        );
        assert_eq!(
            check(&Type::in_range(1..=10), Value::from(11)).unwrap_err(),
            "invalid value for :opt option: expected one of 1..10, got: 11"
        );
    }

    #[test]
    fn test_nested_list_messages() {
        let ty = Type::list_of(Type::list_of(Type::Atom));
        let value = Value::list([Value::list([]), Value::list([Value::atom("a"), Value::from(1)])]);
        assert_eq!(
            check(&ty, value).unwrap_err(),
            "invalid list in :opt option: invalid list in list element at position 1: \
             invalid value for list element at position 1: expected atom, got: 1"
        );
    }

    #[test]
    fn test_tuple_length_and_position() {
        let ty = Type::TupleOf(vec![Type::Atom, Type::Integer]);
        assert!(check(&ty, Value::Tuple(vec![Value::atom("a")]))
            .unwrap_err()
            .contains("expected tuple with 2 elements"));
        assert_eq!(
            check(&ty, Value::Tuple(vec![Value::atom("a"), Value::from("1")])).unwrap_err(),
            "invalid tuple in :opt option: invalid value for tuple element at position 1: \
             expected integer, got: \"1\""
        );
    }

    #[test]
    fn test_map_entries() {
        let ty = Type::map_of(Type::Atom, Type::Integer);
        let ok = Value::map([(Value::atom("a"), Value::from(1))]);
        assert_eq!(check(&ty, ok.clone()).unwrap(), ok);

        let bad_key = Value::map([(Value::from(1), Value::from(1))]);
        assert_eq!(
            check(&ty, bad_key).unwrap_err(),
            "invalid map in :opt option: invalid value for map key: expected atom, got: 1"
        );

        let bad_value = Value::map([(Value::atom("a"), Value::from("x"))]);
        assert_eq!(
            check(&ty, bad_value).unwrap_err(),
            "invalid map in :opt option: invalid value for map key :a: expected integer, got: \"x\""
        );
    }

    #[test]
    fn test_nested_or_indents_reasons() {
        let ty = Type::Or(vec![Type::Or(vec![Type::Atom, Type::Integer]), Type::String]);
        let message = check(&ty, Value::Nil).unwrap_err();
        let expected = "expected :opt option to match at least one given type, but didn't match any. \
Here are the reasons why it didn't match each of the allowed types:

  * invalid value for :opt option: expected string, got: nil
  * expected :opt option to match at least one given type, but didn't match any. \
Here are the reasons why it didn't match each of the allowed types:

      * invalid value for :opt option: expected integer, got: nil
      * invalid value for :opt option: expected atom, got: nil";
        assert_eq!(message, expected);
    }

    #[test]
    fn test_custom_malformed_return_is_a_fault() {
        let bad = Function::new("sloppy", 1, |_| Value::atom("ok"));
        let err = check(&Type::custom_fn(bad, vec![]), Value::from(1)).unwrap_err();
        assert_eq!(
            err,
            "FAULT: custom validator sloppy/1 must return {:ok, value} or {:error, message}, got: :ok"
        );
    }

    #[test]
    fn test_or_does_not_swallow_faults() {
        let bad = Function::new("sloppy", 1, |_| Value::Nil);
        let ty = Type::Or(vec![Type::custom_fn(bad, vec![]), Type::Any]);
        assert!(check(&ty, Value::from(1)).unwrap_err().starts_with("FAULT:"));
    }

    #[test]
    fn test_struct_tag() {
        let uri = crate::Struct::new("URI");
        assert!(check(&Type::Struct("URI".into()), uri.into()).is_ok());
        assert_eq!(
            check(&Type::Struct("URI".into()), Value::from(1)).unwrap_err(),
            "invalid value for :opt option: expected %URI{}, got: 1"
        );
    }

    #[test]
    fn test_redacted_messages_keep_positions_and_arity() {
        let err = check_redacted(
            &Type::list_of(Type::Atom),
            Value::list([Value::atom("a"), Value::from(1)]),
        );
        assert_eq!(
            err.message,
            "invalid list in :opt option: invalid value for list element at position 1: expected atom"
        );
        assert_eq!(err.value, Some(Value::from(crate::REDACTED)));

        let err = check_redacted(&Type::Fun(1), Value::from(1));
        assert_eq!(err.message, "invalid value for :opt option: expected function of arity 1");

        let err = check_redacted(&Type::in_range(1..=10), Value::from(1_000));
        assert_eq!(err.message, "invalid value for :opt option: expected one of 1..10");
    }

    #[test]
    fn test_redacted_custom_message_hides_value_only() {
        let ty = Type::custom("limit", vec![], |value, _| {
            Err(format!("{value} is over the limit of 1000"))
        });
        let err = check_redacted(&ty, Value::from(1));
        assert_eq!(err.message, "**redacted** is over the limit of 1000");
    }
}
