//! The meta-schema: a schema describing schemas.
//!
//! Before a schema validates any options it is lowered to its data form and
//! validated, with the ordinary validator, against [`meta_schema`]. Type tags
//! are checked by a custom validator that understands every [`Type`]
//! variant. A second pass checks that `keys` only appears on container types
//! and that `rename_to` names a later option, constraints the per-field
//! meta-schema cannot express. That pass also forces lazy schemas so they get
//! the same checks.

use std::collections::HashSet;
use std::sync::LazyLock;

use tracing::debug;

use crate::error::Failure;
use crate::schema::{LazyId, SchemaKey, WILDCARD};
use crate::types::MapType;
use crate::validate::validate_options;
use crate::{ContractFault, ErrorKey, Function, OptionSpec, Schema, Type, ValidationError, Value};

static META_SCHEMA: LazyLock<Schema> = LazyLock::new(build_meta_schema);

/// Returns the meta-schema.
///
/// Its data form has a single wildcard entry: every key of a schema maps to
/// a keyword list with the fields of an [`OptionSpec`].
pub fn meta_schema() -> Schema {
    META_SCHEMA.clone()
}

fn build_meta_schema() -> Schema {
    let nested_schema = Type::Or(vec![
        Type::Fun(0),
        Type::keyword_list(Schema::lazy(meta_schema)),
        Type::map_of_keys(Schema::lazy(meta_schema)),
    ]);
    let doc = Type::Or(vec![Type::String, Type::one_of([Value::Bool(false)])]);

    let option_spec = Schema::new()
        .with_option(
            "type",
            OptionSpec::new(Type::custom_fn(type_checker(), Vec::new()))
                .with_default(Value::atom("any")),
        )
        .with_option(
            "required",
            OptionSpec::new(Type::Boolean).with_default(Value::Bool(false)),
        )
        .with_option("default", OptionSpec::new(Type::Any))
        .with_option("keys", OptionSpec::new(nested_schema))
        .with_option("deprecated", OptionSpec::new(Type::String))
        .with_option("rename_to", OptionSpec::new(Type::Atom))
        .with_option("doc", OptionSpec::new(doc.clone()))
        .with_option("subsection", OptionSpec::new(Type::String))
        .with_option("type_doc", OptionSpec::new(doc))
        .with_option("redact", OptionSpec::new(Type::Boolean));

    Schema::new().with_wildcard(OptionSpec::new(Type::keyword_list(option_spec)))
}

fn type_checker() -> Function {
    Function::new("validate_type", 1, |args| {
        let Some(value) = args.first() else {
            return Value::error("validate_type called without a value");
        };
        match Type::parse(value, &mut check_nested) {
            Ok(_) => Value::ok(value.clone()),
            Err(message) => Value::error(message),
        }
    })
}

/// Checks an inline schema found inside a type tag. Lazy schemas are
/// accepted without being forced.
fn check_nested(value: &Value) -> Result<Schema, String> {
    match value {
        Value::Function(fun) if fun.arity() == 0 => Ok(Schema::new()),
        other => check_schema_value(other)
            .map(|()| Schema::new())
            .map_err(|fault| match fault {
                ContractFault::InvalidSchema(error) => error.to_string(),
                other => other.to_string(),
            }),
    }
}

/// Validates the data form of a schema against the meta-schema.
pub(crate) fn check_schema_value(value: &Value) -> Result<(), ContractFault> {
    match validate_options(&META_SCHEMA, value, false) {
        Ok(_) => Ok(()),
        Err(Failure::Invalid(error)) => {
            debug!(error = %error, "schema rejected by meta-schema");
            Err(ContractFault::InvalidSchema(*error))
        }
        Err(Failure::Fault(fault)) => Err(fault),
    }
}

/// Validates a typed schema: the meta-schema over its data form, then the
/// placement of `keys` and `rename_to`, forcing every lazy schema it reaches.
pub(crate) fn check_schema(schema: &Schema) -> Result<(), ContractFault> {
    if !schema.is_lazy() {
        check_schema_value(&schema.to_value())?;
    }
    SchemaChecker::default().check(schema, &mut Vec::new())
}

/// Checks the placement of `keys` and `rename_to` in a schema parsed from
/// data, which holds no lazy schemas.
pub(crate) fn check_keys(schema: &Schema) -> Result<(), ContractFault> {
    SchemaChecker::default().check_entries(schema, &mut Vec::new())
}

/// Walks a typed schema. A lazy schema is forced and meta-checked unless a
/// producer of the same type is already being checked further up, which is
/// what stops self-referential schemas.
#[derive(Default)]
struct SchemaChecker {
    active: Vec<LazyId>,
    done: HashSet<LazyId>,
}

impl SchemaChecker {
    fn check(&mut self, schema: &Schema, path: &mut Vec<Value>) -> Result<(), ContractFault> {
        let Some(id) = schema.lazy_id() else {
            return self.check_entries(schema, path);
        };
        if self.active.iter().any(|active| active.ty == id.ty) || self.done.contains(&id) {
            return Ok(());
        }

        let resolved = schema.resolved();
        check_schema_value(&resolved.to_value()).map_err(|fault| at_path(fault, path))?;
        self.active.push(id);
        let result = self.check_entries(&resolved, path);
        self.active.pop();
        if id.stateless {
            self.done.insert(id);
        }
        result
    }

    fn check_entries(&mut self, schema: &Schema, path: &mut Vec<Value>) -> Result<(), ContractFault> {
        let entries = schema.entries();
        for (index, (key, spec)) in entries.iter().enumerate() {
            let key = key.to_value().unwrap_or_else(|| Value::atom(WILDCARD));
            if let Some(target) = &spec.rename_to {
                let declared_later = entries[index + 1..]
                    .iter()
                    .any(|(k, _)| matches!(k, SchemaKey::Atom(name) if name == target));
                if !declared_later {
                    let message = format!(
                        "invalid value for :rename_to option: expected an option declared after {key}, got: :{target}"
                    );
                    return Err(invalid_at(key, message, path));
                }
            }
            if let Some(keys) = &spec.keys {
                if !spec.ty.accepts_keys() {
                    let message = format!(
                        "invalid value for :keys option: nested keys require a keyword list, \
                         a map, or a list of those, got type: {}",
                        spec.ty.name()
                    );
                    return Err(invalid_at(key, message, path));
                }
                path.push(key.clone());
                self.check(keys, path)?;
                path.pop();
            }
            path.push(key);
            self.check_type(&spec.ty, path)?;
            path.pop();
        }
        Ok(())
    }

    fn check_type(&mut self, ty: &Type, path: &mut Vec<Value>) -> Result<(), ContractFault> {
        match ty {
            Type::KeywordList(Some(schema))
            | Type::NonEmptyKeywordList(Some(schema))
            | Type::Map(MapType::Keys(schema)) => self.check(schema, path),
            Type::Map(MapType::Entries(key_type, value_type)) => {
                self.check_type(key_type, path)?;
                self.check_type(value_type, path)
            }
            Type::ListOf(subtype) => self.check_type(subtype, path),
            Type::Or(subtypes) | Type::TupleOf(subtypes) => subtypes
                .iter()
                .try_for_each(|subtype| self.check_type(subtype, path)),
            _ => Ok(()),
        }
    }
}

fn invalid_at(key: Value, message: String, path: &[Value]) -> ContractFault {
    let error = ValidationError::new(ErrorKey::Single(key), message).with_keys_path(path.to_vec());
    ContractFault::InvalidSchema(error)
}

fn at_path(fault: ContractFault, path: &[Value]) -> ContractFault {
    match fault {
        ContractFault::InvalidSchema(error) => ContractFault::InvalidSchema(error.prefix_path(path)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_schema_accepts_itself() {
        assert!(check_schema(&meta_schema()).is_ok());
    }

    #[test]
    fn test_unknown_spec_field_is_rejected() {
        let data = Value::keyword([("a", Value::keyword([("typo", Value::Bool(true))]))]);
        let fault = check_schema_value(&data).unwrap_err();
        let ContractFault::InvalidSchema(error) = fault else {
            panic!("expected an invalid schema fault");
        };
        assert_eq!(error.key, ErrorKey::Unknown(vec![Value::atom("typo")]));
        assert_eq!(error.keys_path, vec![Value::atom("a")]);
    }

    #[test]
    fn test_invalid_type_lists_available_types() {
        let data = Value::keyword([("a", Value::keyword([("type", Value::atom("number"))]))]);
        let fault = check_schema_value(&data).unwrap_err();
        let message = fault.to_string();
        assert!(message.starts_with("invalid schema: invalid option type :number."));
        assert!(message.contains("{:custom, validator, args}"));
    }

    #[test]
    fn test_nested_type_schema_is_checked() {
        let inner = Value::keyword([("b", Value::keyword([("required", Value::from("yes"))]))]);
        let ty = Value::Tuple(vec![Value::atom("keyword_list"), inner]);
        let data = Value::keyword([("a", Value::keyword([("type", ty)]))]);

        let message = check_schema_value(&data).unwrap_err().to_string();
        assert!(message.contains("expected boolean"));
    }

    #[test]
    fn test_keys_on_scalar_type_is_rejected() {
        let schema = Schema::new().with_option(
            "port",
            OptionSpec::new(Type::Integer).with_keys(Schema::new()),
        );

        let ContractFault::InvalidSchema(error) = check_schema(&schema).unwrap_err() else {
            panic!("expected an invalid schema fault");
        };
        assert_eq!(error.key, ErrorKey::Single(Value::atom("port")));
        assert!(error.message.contains(":integer"));
    }

    #[test]
    fn test_keys_placement_checked_inside_type_schemas() {
        let inner = Schema::new().with_option(
            "port",
            OptionSpec::new(Type::Boolean).with_keys(Schema::new()),
        );
        let schema = Schema::new().with_option("server", OptionSpec::new(Type::keyword_list(inner)));

        let ContractFault::InvalidSchema(error) = check_schema(&schema).unwrap_err() else {
            panic!("expected an invalid schema fault");
        };
        assert_eq!(error.keys_path, vec![Value::atom("server")]);
    }

    #[test]
    fn test_lazy_nested_schema_is_forced_and_checked() {
        fn inner() -> Schema {
            Schema::new().with_option("port", OptionSpec::new(Type::Integer).with_keys(Schema::new()))
        }
        let schema = Schema::new().with_option("server", OptionSpec::new(Type::keyword_list(Schema::lazy(inner))));

        let ContractFault::InvalidSchema(error) = check_schema(&schema).unwrap_err() else {
            panic!("expected an invalid schema fault");
        };
        assert_eq!(error.key, ErrorKey::Single(Value::atom("port")));
        assert_eq!(error.keys_path, vec![Value::atom("server")]);
    }

    #[test]
    fn test_lazy_schema_data_goes_through_meta_schema() {
        fn inner() -> Schema {
            let wrong_arity = Function::new("check", 2, |_| Value::ok(Value::Nil));
            Schema::new().with_option("port", OptionSpec::new(Type::custom_fn(wrong_arity, vec![])))
        }
        let schema = Schema::new().with_option("server", OptionSpec::new(Type::keyword_list(Schema::lazy(inner))));

        let ContractFault::InvalidSchema(error) = check_schema(&schema).unwrap_err() else {
            panic!("expected an invalid schema fault");
        };
        assert_eq!(error.keys_path, vec![Value::atom("server"), Value::atom("port")]);
        assert!(error.message.contains("check/2"));
    }

    #[test]
    fn test_recursive_lazy_schema_terminates() {
        fn tree() -> Schema {
            Schema::new()
                .with_option("label", OptionSpec::new(Type::String))
                .with_option("children", OptionSpec::new(Type::list_of(Type::keyword_list(Schema::lazy(tree)))))
        }

        assert!(check_schema(&Schema::lazy(tree)).is_ok());
        assert!(check_schema(&tree()).is_ok());
    }

    #[test]
    fn test_rename_target_must_be_declared_later() {
        let undeclared = Schema::new().with_option("old", OptionSpec::new(Type::Integer).rename_to("new"));
        let ContractFault::InvalidSchema(error) = check_schema(&undeclared).unwrap_err() else {
            panic!("expected an invalid schema fault");
        };
        assert_eq!(error.key, ErrorKey::Single(Value::atom("old")));
        assert_eq!(
            error.message,
            "invalid value for :rename_to option: expected an option declared after :old, got: :new"
        );

        let earlier = Schema::new()
            .with_option("new", OptionSpec::new(Type::Integer))
            .with_option("old", OptionSpec::new(Type::Integer).rename_to("new"));
        assert!(check_schema(&earlier).is_err());

        let later = Schema::new()
            .with_option("old", OptionSpec::new(Type::Integer).rename_to("new"))
            .with_option("new", OptionSpec::new(Type::Integer));
        assert!(check_schema(&later).is_ok());
    }
}
