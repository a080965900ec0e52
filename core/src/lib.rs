//! Declarative validation for keyword-list and map options.
//!
//! This crate checks dynamically-typed option collections against a schema
//! and returns them normalized:
//!
//! - [`Value`] — the dynamic value tree options are made of (atoms, keyword
//!   lists, maps, tuples, functions, and so on).
//! - [`Schema`] — an ordered set of [`OptionSpec`]s, one per option key, each
//!   carrying a [`Type`], requiredness, a default, and documentation.
//! - [`validate`] — checks options against a schema, injecting defaults and
//!   applying custom casts, and reports the first failure as a
//!   [`ValidationError`].
//! - [`compile`] — checks a schema against the [`meta_schema`] once so it can
//!   be reused without re-checking.
//!
//! Schemas also have a data form ([`Schema::to_value`],
//! [`Schema::from_value`]) so they can be loaded from configuration files.
//!
//! # Example
//!
//! ```
//! use option_schema_core::*;
//!
//! let schema = Schema::new()
//!     .with_option("name", OptionSpec::new(Type::String).required())
//!     .with_option(
//!         "pool",
//!         OptionSpec::new(Type::keyword_list(
//!             Schema::new().with_option("size", OptionSpec::new(Type::PosInteger).with_default(Value::from(10))),
//!         ))
//!         .with_default(Value::keyword::<&str, _>([])),
//!     );
//!
//! let opts = validate(&Value::keyword([("name", Value::from("db"))]), &schema).unwrap();
//! assert_eq!(
//!     opts.get(&Value::atom("pool")),
//!     Some(&Value::keyword([("size", Value::from(10))]))
//! );
//!
//! let err = validate(&Value::keyword::<&str, _>([]), &schema).unwrap_err();
//! assert_eq!(err.to_string(), "required :name option not found, received options: []");
//! ```

mod compiled;
mod error;
mod matcher;
mod meta;
mod schema;
mod types;
mod validate;
mod value;

pub use compiled::{CompiledSchema, ToCompiled, compile};
pub use error::{ContractFault, ErrorKey, REDACTED, ValidationError};
pub use meta::meta_schema;
pub use schema::{Doc, OptionSpec, Schema, SchemaKey, WILDCARD};
pub use types::{Choices, Custom, MapType, TYPE_NAMES, Type};
pub use validate::{validate, validate_or_panic};
pub use value::{Function, Struct, Value};
