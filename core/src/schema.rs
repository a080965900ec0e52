//! Schemas and per-option specifications.
//!
//! A [`Schema`] is an ordered list of `(key, spec)` entries. Keys are atoms,
//! strings, or the [`SchemaKey::Wildcard`], which matches every key in the
//! input that is not declared explicitly. A schema can also be a lazy
//! producer, which is how self-referential schemas (such as the meta-schema
//! describing schemas) avoid infinite eager expansion.
//!
//! # Examples
//!
//! ```
//! use option_schema_core::{OptionSpec, Schema, Type, Value};
//!
//! let schema = Schema::new()
//!     .with_option("name", OptionSpec::new(Type::String).required())
//!     .with_option("pool_size", OptionSpec::new(Type::PosInteger).with_default(Value::from(10)));
//!
//! assert_eq!(schema.len(), 2);
//! assert!(schema.get(&"name".into()).unwrap().required);
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::meta;
use crate::{ContractFault, Type, Value};

/// A key in a schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaKey {
    /// Matches an atom key.
    Atom(String),
    /// Matches a string key in a map.
    Str(String),
    /// Matches any key not declared explicitly.
    Wildcard,
}

/// Atom name reserved for the wildcard in the data form of a schema.
pub const WILDCARD: &str = "*";

impl SchemaKey {
    /// The option key this schema key matches, `None` for the wildcard.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            SchemaKey::Atom(name) => Some(Value::Atom(name.clone())),
            SchemaKey::Str(name) => Some(Value::String(name.clone())),
            SchemaKey::Wildcard => None,
        }
    }

    fn to_data(&self) -> Value {
        self.to_value().unwrap_or_else(|| Value::atom(WILDCARD))
    }

    fn from_data(value: &Value) -> Option<Self> {
        match value {
            Value::Atom(name) if name == WILDCARD => Some(SchemaKey::Wildcard),
            Value::Atom(name) => Some(SchemaKey::Atom(name.clone())),
            Value::String(name) => Some(SchemaKey::Str(name.clone())),
            _ => None,
        }
    }
}

impl From<&str> for SchemaKey {
    fn from(name: &str) -> Self {
        SchemaKey::Atom(name.to_string())
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_data())
    }
}

/// Documentation attached to an option; `Hidden` keeps it out of rendered
/// docs.
#[derive(Debug, Clone, PartialEq)]
pub enum Doc {
    /// Markdown text.
    Text(String),
    /// Explicitly undocumented.
    Hidden,
}

impl Doc {
    fn to_value(&self) -> Value {
        match self {
            Doc::Text(text) => Value::String(text.clone()),
            Doc::Hidden => Value::Bool(false),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Doc::Text(text.clone())),
            Value::Bool(false) => Some(Doc::Hidden),
            _ => None,
        }
    }
}

/// Validation rules for one option.
///
/// `doc`, `subsection` and `type_doc` carry no validation semantics; they are
/// kept for documentation renderers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSpec {
    /// Accepted type (defaults to [`Type::Any`]).
    pub ty: Type,
    /// Whether the option must be present. Takes priority over `default`.
    pub required: bool,
    /// Value injected when the option is absent; validated like input.
    pub default: Option<Value>,
    /// Nested schema for container types.
    pub keys: Option<Schema>,
    /// Warning emitted when the option is present.
    pub deprecated: Option<String>,
    /// Key the validated value is moved to in the output; must be declared
    /// after this option.
    pub rename_to: Option<String>,
    /// Documentation text.
    pub doc: Option<Doc>,
    /// Documentation subsection title.
    pub subsection: Option<String>,
    /// Override for the rendered type description.
    pub type_doc: Option<Doc>,
    /// Withhold the value from error messages for this option and its
    /// descendants.
    pub redact: bool,
}

impl OptionSpec {
    /// Creates a spec of the given type.
    pub fn new(ty: Type) -> Self {
        Self {
            ty,
            ..Default::default()
        }
    }

    /// Marks the option as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Sets the nested schema.
    pub fn with_keys(mut self, keys: Schema) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Marks the option as deprecated with a message.
    pub fn with_deprecation(mut self, message: &str) -> Self {
        self.deprecated = Some(message.to_string());
        self
    }

    /// Moves the validated value to another key.
    ///
    /// The target must be declared later in the same schema, which then
    /// validates the moved value; [`compile`](crate::compile) rejects any
    /// other target.
    pub fn rename_to(mut self, key: &str) -> Self {
        self.rename_to = Some(key.to_string());
        self
    }

    /// Adds documentation text.
    pub fn with_doc(mut self, doc: &str) -> Self {
        self.doc = Some(Doc::Text(doc.to_string()));
        self
    }

    /// Hides the option from rendered documentation.
    pub fn hidden(mut self) -> Self {
        self.doc = Some(Doc::Hidden);
        self
    }

    /// Sets the documentation subsection.
    pub fn with_subsection(mut self, subsection: &str) -> Self {
        self.subsection = Some(subsection.to_string());
        self
    }

    /// Overrides the rendered type description.
    pub fn with_type_doc(mut self, type_doc: &str) -> Self {
        self.type_doc = Some(Doc::Text(type_doc.to_string()));
        self
    }

    /// Redacts the value from errors.
    pub fn redacted(mut self) -> Self {
        self.redact = true;
        self
    }

    /// The type actually matched, with `keys` folded in.
    pub(crate) fn effective_type(&self) -> Type {
        match &self.keys {
            Some(keys) => self.ty.with_keys(keys),
            None => self.ty.clone(),
        }
    }

    /// Lowers the spec into its data form (a keyword list).
    pub fn to_value(&self) -> Value {
        let mut fields = vec![("type".to_string(), self.ty.to_value())];
        if self.required {
            fields.push(("required".into(), Value::Bool(true)));
        }
        if let Some(default) = &self.default {
            fields.push(("default".into(), default.clone()));
        }
        if let Some(keys) = &self.keys {
            fields.push(("keys".into(), keys.to_value()));
        }
        if let Some(message) = &self.deprecated {
            fields.push(("deprecated".into(), Value::String(message.clone())));
        }
        if let Some(key) = &self.rename_to {
            fields.push(("rename_to".into(), Value::atom(key.clone())));
        }
        if let Some(doc) = &self.doc {
            fields.push(("doc".into(), doc.to_value()));
        }
        if let Some(subsection) = &self.subsection {
            fields.push(("subsection".into(), Value::String(subsection.clone())));
        }
        if let Some(type_doc) = &self.type_doc {
            fields.push(("type_doc".into(), type_doc.to_value()));
        }
        if self.redact {
            fields.push(("redact".into(), Value::Bool(true)));
        }
        Value::Keyword(fields)
    }

    fn from_value(value: &Value) -> Result<Self, String> {
        let field = |name: &str| value.get(&Value::atom(name));
        let mut spec = OptionSpec::default();
        if let Some(ty) = field("type") {
            spec.ty = Type::parse(ty, &mut Schema::parse_value)?;
        }
        spec.required = matches!(field("required"), Some(Value::Bool(true)));
        spec.default = field("default").cloned();
        if let Some(keys) = field("keys") {
            spec.keys = Some(Schema::parse_value(keys)?);
        }
        spec.deprecated = string_field(field("deprecated"));
        spec.rename_to = field("rename_to").and_then(Value::as_atom).map(String::from);
        spec.doc = field("doc").and_then(Doc::from_value);
        spec.subsection = string_field(field("subsection"));
        spec.type_doc = field("type_doc").and_then(Doc::from_value);
        spec.redact = matches!(field("redact"), Some(Value::Bool(true)));
        Ok(spec)
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

type Entries = Arc<[(SchemaKey, OptionSpec)]>;
type Producer = Arc<dyn Fn() -> Schema + Send + Sync>;

/// A deferred schema and the identity of the code producing it.
#[derive(Clone)]
struct Lazy {
    producer: Producer,
    id: LazyId,
}

/// Identity of a lazy producer, stable across separate `Schema::lazy`
/// calls with the same function.
///
/// Producers without captured state behave identically when their types
/// match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct LazyId {
    pub ty: TypeId,
    pub stateless: bool,
}

#[derive(Clone)]
enum Repr {
    Entries(Entries),
    Lazy(Lazy),
}

/// An ordered set of option declarations.
#[derive(Clone)]
pub struct Schema {
    repr: Repr,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self {
            repr: Repr::Entries(Arc::from(Vec::new())),
        }
    }

    /// Creates a schema produced on demand.
    ///
    /// The producer runs every time the schema is resolved, so it may refer
    /// to the schema being defined.
    ///
    /// # Examples
    ///
    /// ```
    /// use option_schema_core::{OptionSpec, Schema, Type};
    ///
    /// // A tree whose `children` are trees.
    /// fn tree() -> Schema {
    ///     Schema::new()
    ///         .with_option("label", OptionSpec::new(Type::String))
    ///         .with_option("children", OptionSpec::new(Type::list_of(Type::keyword_list(Schema::lazy(tree)))))
    /// }
    ///
    /// assert!(Schema::lazy(tree).is_lazy());
    /// assert_eq!(Schema::lazy(tree).len(), 2);
    /// ```
    pub fn lazy<F>(producer: F) -> Self
    where
        F: Fn() -> Schema + Send + Sync + 'static,
    {
        let id = LazyId {
            ty: TypeId::of::<F>(),
            stateless: std::mem::size_of::<F>() == 0,
        };
        Self {
            repr: Repr::Lazy(Lazy {
                producer: Arc::new(producer),
                id,
            }),
        }
    }

    /// Adds an atom-keyed option.
    pub fn with_option(self, key: &str, spec: OptionSpec) -> Self {
        self.with_entry(SchemaKey::Atom(key.to_string()), spec)
    }

    /// Adds a string-keyed option (matched against string map keys).
    pub fn with_string_option(self, key: &str, spec: OptionSpec) -> Self {
        self.with_entry(SchemaKey::Str(key.to_string()), spec)
    }

    /// Adds the wildcard entry.
    pub fn with_wildcard(self, spec: OptionSpec) -> Self {
        self.with_entry(SchemaKey::Wildcard, spec)
    }

    /// Adds an entry, resolving a lazy schema first.
    pub fn with_entry(self, key: SchemaKey, spec: OptionSpec) -> Self {
        let mut entries = self.entries().to_vec();
        entries.push((key, spec));
        Self {
            repr: Repr::Entries(Arc::from(entries)),
        }
    }

    /// Returns `true` if this schema is a lazy producer.
    pub fn is_lazy(&self) -> bool {
        matches!(self.repr, Repr::Lazy(_))
    }

    /// Identity of the producer when this schema is lazy.
    pub(crate) fn lazy_id(&self) -> Option<LazyId> {
        match &self.repr {
            Repr::Lazy(lazy) => Some(lazy.id),
            Repr::Entries(_) => None,
        }
    }

    /// The same schema with a lazy top level forced; nested lazy schemas
    /// stay lazy.
    pub(crate) fn resolved(&self) -> Schema {
        Self {
            repr: Repr::Entries(self.entries()),
        }
    }

    /// Resolved entries in declaration order.
    pub fn entries(&self) -> Entries {
        let mut current = self.clone();
        loop {
            match current.repr {
                Repr::Entries(entries) => return entries,
                Repr::Lazy(lazy) => current = (lazy.producer)(),
            }
        }
    }

    /// Number of declared entries.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Returns `true` when no options are declared.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Looks up the spec declared for `key`.
    pub fn get(&self, key: &SchemaKey) -> Option<OptionSpec> {
        self.entries()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, spec)| spec.clone())
    }

    /// Entries to validate for an input carrying `present` keys.
    ///
    /// Explicit entries are kept; the wildcard spec is repeated for each
    /// present key not declared explicitly, in input order.
    pub(crate) fn expand(&self, present: &[Value]) -> Vec<(Value, OptionSpec)> {
        let entries = self.entries();
        let mut expanded: Vec<(Value, OptionSpec)> = entries
            .iter()
            .filter_map(|(key, spec)| key.to_value().map(|k| (k, spec.clone())))
            .collect();
        if let Some((_, wildcard)) = entries.iter().find(|(k, _)| *k == SchemaKey::Wildcard) {
            for key in present {
                if !expanded.iter().any(|(k, _)| k == key) {
                    expanded.push((key.clone(), wildcard.clone()));
                }
            }
        }
        expanded
    }

    /// Lowers the schema into its data form.
    ///
    /// Atom-keyed schemas become keyword lists; schemas with string keys
    /// become maps. A lazy schema becomes an arity-0 function producing its
    /// data form, so self-referential schemas lower in finite time.
    pub fn to_value(&self) -> Value {
        match &self.repr {
            Repr::Lazy(lazy) => {
                let producer = Arc::clone(&lazy.producer);
                Value::Function(crate::Function::new("lazy_schema", 0, move |_| {
                    producer().to_value()
                }))
            }
            Repr::Entries(entries) => {
                if entries.iter().any(|(k, _)| matches!(k, SchemaKey::Str(_))) {
                    Value::Map(
                        entries
                            .iter()
                            .map(|(k, spec)| (k.to_data(), spec.to_value()))
                            .collect(),
                    )
                } else {
                    Value::Keyword(
                        entries
                            .iter()
                            .map(|(k, spec)| {
                                let name = match k {
                                    SchemaKey::Atom(name) => name.clone(),
                                    _ => WILDCARD.to_string(),
                                };
                                (name, spec.to_value())
                            })
                            .collect(),
                    )
                }
            }
        }
    }

    /// Parses a schema from its data form after checking it against the
    /// meta-schema.
    ///
    /// # Errors
    ///
    /// Returns [`ContractFault::InvalidSchema`] if the value is not a valid
    /// schema. Lazy schemas (arity-0 functions) cannot be parsed from data;
    /// build them with [`Schema::lazy`].
    ///
    /// # Examples
    ///
    /// ```
    /// use option_schema_core::{Schema, Type, Value};
    ///
    /// let data = Value::keyword([(
    ///     "retries",
    ///     Value::keyword([("type", Value::atom("non_neg_integer")), ("default", Value::from(3))]),
    /// )]);
    /// let schema = Schema::from_value(&data).unwrap();
    /// assert_eq!(schema.get(&"retries".into()).unwrap().ty, Type::NonNegInteger);
    ///
    /// let bad = Value::keyword([("retries", Value::keyword([("type", Value::atom("number"))]))]);
    /// assert!(Schema::from_value(&bad).is_err());
    /// ```
    pub fn from_value(value: &Value) -> Result<Schema, ContractFault> {
        meta::check_schema_value(value)?;
        let schema = Schema::parse_value(value).map_err(|message| {
            ContractFault::InvalidSchema(crate::ValidationError::new(
                crate::ErrorKey::Root,
                message,
            ))
        })?;
        meta::check_keys(&schema)?;
        Ok(schema)
    }

    fn parse_value(value: &Value) -> Result<Schema, String> {
        let pairs: Vec<(Value, &Value)> = match value {
            Value::Keyword(pairs) => pairs.iter().map(|(k, v)| (Value::atom(k.clone()), v)).collect(),
            Value::Map(pairs) => pairs.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Value::List(items) if items.is_empty() => Vec::new(),
            Value::Function(_) => {
                return Err("lazy schemas cannot be parsed from data; use Schema::lazy".into());
            }
            other => return Err(format!("expected a schema, got: {other}")),
        };
        let mut schema = Schema::new();
        for (key, spec) in pairs {
            let key = SchemaKey::from_data(&key)
                .ok_or_else(|| format!("invalid schema key {key}"))?;
            schema = schema.with_entry(key, OptionSpec::from_value(spec)?);
        }
        Ok(schema)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Entries(a), Repr::Entries(b)) => a == b,
            (Repr::Lazy(a), Repr::Lazy(b)) => Arc::ptr_eq(&a.producer, &b.producer),
            _ => false,
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Lazy(_) => f.write_str("Schema(<lazy>)"),
            Repr::Entries(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, spec)| (k.to_string(), spec)))
                .finish(),
        }
    }
}
