//! Schemas checked once and reused.

use std::borrow::Cow;

use tracing::debug;

use crate::meta;
use crate::{ContractFault, Schema, ValidationError, Value};

/// A schema that has passed the meta-schema check.
///
/// The inner schema is private, so a handle cannot be altered after it was
/// checked. Handles are cheap to clone and safe to share across threads.
///
/// # Examples
///
/// ```
/// use option_schema_core::*;
///
/// let schema = Schema::new().with_option("port", OptionSpec::new(Type::PosInteger).required());
/// let compiled = compile(&schema).unwrap();
///
/// let opts = Value::keyword([("port", Value::from(8080))]);
/// assert_eq!(validate(&opts, &compiled).unwrap(), opts);
/// assert!(compiled.validate(&Value::keyword::<&str, _>([])).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSchema {
    schema: Schema,
}

impl CompiledSchema {
    /// The checked schema, read-only.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validates options against this schema.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] encountered.
    ///
    /// # Panics
    ///
    /// Panics if a custom validator breaks its return contract.
    pub fn validate(&self, options: &Value) -> Result<Value, ValidationError> {
        crate::validate(options, self)
    }
}

/// Checks `schema` against the meta-schema once.
///
/// # Errors
///
/// Returns [`ContractFault::InvalidSchema`] if the schema is malformed.
pub fn compile(schema: &Schema) -> Result<CompiledSchema, ContractFault> {
    meta::check_schema(schema)?;
    debug!(options = schema.len(), "compiled schema");
    Ok(CompiledSchema {
        schema: schema.clone(),
    })
}

/// Anything [`validate`](crate::validate) accepts as a schema.
pub trait ToCompiled {
    /// Produces a checked schema, borrowing when already compiled.
    ///
    /// # Panics
    ///
    /// Implementations for unchecked schemas panic on a contract fault.
    fn to_compiled(&self) -> Cow<'_, CompiledSchema>;
}

impl ToCompiled for CompiledSchema {
    fn to_compiled(&self) -> Cow<'_, CompiledSchema> {
        Cow::Borrowed(self)
    }
}

impl ToCompiled for Schema {
    fn to_compiled(&self) -> Cow<'_, CompiledSchema> {
        match compile(self) {
            Ok(compiled) => Cow::Owned(compiled),
            Err(fault) => panic!("{fault}"),
        }
    }
}
