//! The closed set of option types.
//!
//! Every option in a schema declares a [`Type`]. Scalar variants perform a
//! structural check; combinators ([`Type::Or`], [`Type::ListOf`],
//! [`Type::TupleOf`], [`MapType::Entries`]) delegate to their subtypes; and
//! [`Type::Custom`] hands the value to caller code that may cast it.
//!
//! Types also have a data form, used when a schema is expressed as a
//! [`Value`] and checked against the meta-schema: simple types are atoms
//! (`:integer`), parameterized types are tuples (`{:list, :atom}`,
//! `{:in, [:a, :b]}`, `{:custom, fun, args}`).

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::{Function, Schema, Value};

/// Allowed values for [`Type::In`].
#[derive(Debug, Clone, PartialEq)]
pub enum Choices {
    /// An explicit, finite set of values.
    Values(Vec<Value>),
    /// An inclusive integer range.
    Range(RangeInclusive<i64>),
}

impl Choices {
    /// Returns `true` if `value` is one of the choices.
    pub fn contains(&self, value: &Value) -> bool {
        match self {
            Choices::Values(values) => values.contains(value),
            Choices::Range(range) => matches!(value, Value::Integer(i) if range.contains(i)),
        }
    }
}

impl fmt::Display for Choices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choices::Values(values) => write!(f, "{}", Value::List(values.clone())),
            Choices::Range(range) => write!(f, "{}..{}", range.start(), range.end()),
        }
    }
}

/// Shape of a [`Type::Map`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum MapType {
    /// Any map.
    #[default]
    Any,
    /// A map whose entries are validated like a keyword list against a
    /// nested schema.
    Keys(Schema),
    /// A homogeneous map: every key matches the first type and every value
    /// the second.
    Entries(Box<Type>, Box<Type>),
}

/// A custom validator and the extra arguments passed after the value.
///
/// The validator is called as `validator(value, args...)` and must return
/// `{:ok, value}` or `{:error, message}`; see [`Value::ok`] and
/// [`Value::error`].
#[derive(Debug, Clone, PartialEq)]
pub struct Custom {
    /// Function of arity `1 + args.len()`.
    pub validator: Function,
    /// Extra arguments appended to each call.
    pub args: Vec<Value>,
}

/// An option type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Type {
    /// Accepts anything.
    #[default]
    Any,
    /// A keyword list, optionally validated against a nested schema.
    KeywordList(Option<Schema>),
    /// A non-empty keyword list, optionally validated against a nested schema.
    NonEmptyKeywordList(Option<Schema>),
    /// A map.
    Map(MapType),
    /// An atom.
    Atom,
    /// Any integer.
    Integer,
    /// An integer `>= 0`.
    NonNegInteger,
    /// An integer `> 0`.
    PosInteger,
    /// A float.
    Float,
    /// A string.
    String,
    /// A boolean.
    Boolean,
    /// A non-negative integer or `:infinity`.
    Timeout,
    /// A process handle.
    Pid,
    /// A reference handle.
    Reference,
    /// `{module, function, args}` with atoms for the first two positions and
    /// a list of arguments.
    Mfa,
    /// `{module, args}` with an atom module and a list of arguments.
    ModArg,
    /// Exactly nil.
    Nil,
    /// A function of exactly this arity.
    Fun(usize),
    /// Membership in a set or range.
    In(Choices),
    /// Caller-supplied validation, possibly casting the value.
    Custom(Custom),
    /// The first subtype that matches wins.
    Or(Vec<Type>),
    /// A list whose elements all match the subtype.
    ListOf(Box<Type>),
    /// A tuple with one subtype per position.
    TupleOf(Vec<Type>),
    /// A struct tagged with this name.
    Struct(String),
}

/// Names of every type, as listed in type errors.
pub const TYPE_NAMES: &[&str] = &[
    ":any",
    ":keyword_list",
    ":non_empty_keyword_list",
    ":map",
    ":atom",
    ":integer",
    ":non_neg_integer",
    ":pos_integer",
    ":float",
    ":string",
    ":boolean",
    ":timeout",
    ":pid",
    ":reference",
    ":mfa",
    ":mod_arg",
    ":nil",
    "{:fun, arity}",
    "{:in, choices}",
    "{:custom, validator, args}",
    "{:or, subtypes}",
    "{:list, subtype}",
    "{:tuple, subtypes}",
    "{:keyword_list, schema}",
    "{:non_empty_keyword_list, schema}",
    "{:map, schema}",
    "{:map, key_type, value_type}",
    "{:struct, name}",
];

impl Type {
    /// Builds a [`Type::Custom`] from a typed Rust validator.
    ///
    /// The closure receives the value and the extra `args`; returning `Ok`
    /// with a different value casts it.
    ///
    /// # Examples
    ///
    /// ```
    /// use option_schema_core::{Type, Value};
    ///
    /// let port = Type::custom("parse_port", vec![], |value, _args| match value {
    ///     Value::String(s) => s.parse::<i64>().map(Value::Integer).map_err(|e| e.to_string()),
    ///     Value::Integer(_) => Ok(value.clone()),
    ///     other => Err(format!("expected a port, got: {other}")),
    /// });
    /// assert_eq!(port.name(), "{:custom, parse_port/1, []}");
    /// ```
    pub fn custom<F>(name: impl Into<Arc<str>>, args: Vec<Value>, validator: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        let arity = args.len() + 1;
        let function = Function::new(name, arity, move |call_args| {
            let (value, rest) = match call_args.split_first() {
                Some((value, rest)) => (value, rest),
                None => return Value::error("custom validator called without a value"),
            };
            match validator(value, rest) {
                Ok(value) => Value::ok(value),
                Err(message) => Value::error(message),
            }
        });
        Type::Custom(Custom {
            validator: function,
            args,
        })
    }

    /// Builds a [`Type::Custom`] from a dynamic function whose return value is
    /// checked against the ok/error tuple contract at validation time.
    pub fn custom_fn(validator: Function, args: Vec<Value>) -> Self {
        Type::Custom(Custom { validator, args })
    }

    /// Shorthand for [`Type::In`] over explicit values.
    pub fn one_of<I: IntoIterator<Item = Value>>(choices: I) -> Self {
        Type::In(Choices::Values(choices.into_iter().collect()))
    }

    /// Shorthand for [`Type::In`] over an integer range.
    pub fn in_range(range: RangeInclusive<i64>) -> Self {
        Type::In(Choices::Range(range))
    }

    /// Shorthand for [`Type::ListOf`].
    pub fn list_of(subtype: Type) -> Self {
        Type::ListOf(Box::new(subtype))
    }

    /// Shorthand for a keyword list validated against `schema`.
    pub fn keyword_list(schema: Schema) -> Self {
        Type::KeywordList(Some(schema))
    }

    /// Shorthand for a map validated against `schema`.
    pub fn map_of_keys(schema: Schema) -> Self {
        Type::Map(MapType::Keys(schema))
    }

    /// Shorthand for a homogeneous map.
    pub fn map_of(key_type: Type, value_type: Type) -> Self {
        Type::Map(MapType::Entries(Box::new(key_type), Box::new(value_type)))
    }

    /// Human-readable type name, in the data-form notation.
    pub fn name(&self) -> String {
        match self {
            Type::Any => ":any".into(),
            Type::KeywordList(_) => ":keyword_list".into(),
            Type::NonEmptyKeywordList(_) => ":non_empty_keyword_list".into(),
            Type::Map(MapType::Entries(k, v)) => format!("{{:map, {}, {}}}", k.name(), v.name()),
            Type::Map(_) => ":map".into(),
            Type::Atom => ":atom".into(),
            Type::Integer => ":integer".into(),
            Type::NonNegInteger => ":non_neg_integer".into(),
            Type::PosInteger => ":pos_integer".into(),
            Type::Float => ":float".into(),
            Type::String => ":string".into(),
            Type::Boolean => ":boolean".into(),
            Type::Timeout => ":timeout".into(),
            Type::Pid => ":pid".into(),
            Type::Reference => ":reference".into(),
            Type::Mfa => ":mfa".into(),
            Type::ModArg => ":mod_arg".into(),
            Type::Nil => ":nil".into(),
            Type::Fun(arity) => format!("{{:fun, {arity}}}"),
            Type::In(choices) => format!("{{:in, {choices}}}"),
            Type::Custom(custom) => format!(
                "{{:custom, {}/{}, {}}}",
                custom.validator.name(),
                custom.validator.arity(),
                Value::List(custom.args.clone())
            ),
            Type::Or(subtypes) => format!("{{:or, [{}]}}", join_names(subtypes)),
            Type::ListOf(subtype) => format!("{{:list, {}}}", subtype.name()),
            Type::TupleOf(subtypes) => format!("{{:tuple, [{}]}}", join_names(subtypes)),
            Type::Struct(name) => format!("{{:struct, {name}}}"),
        }
    }

    /// Returns `true` if an option of this type may declare nested `keys`.
    ///
    /// `keys` attaches to keyword lists, keyed maps, `Any` (which then means
    /// keyword list), and lists of those.
    pub fn accepts_keys(&self) -> bool {
        match self {
            Type::Any | Type::KeywordList(None) | Type::NonEmptyKeywordList(None) => true,
            Type::Map(MapType::Any) => true,
            Type::ListOf(subtype) => subtype.accepts_keys(),
            _ => false,
        }
    }

    /// Folds an option's `keys` into this type, producing the type that is
    /// actually matched.
    pub(crate) fn with_keys(&self, keys: &Schema) -> Type {
        match self {
            Type::Any | Type::KeywordList(None) => Type::KeywordList(Some(keys.clone())),
            Type::NonEmptyKeywordList(None) => Type::NonEmptyKeywordList(Some(keys.clone())),
            Type::Map(MapType::Any) => Type::Map(MapType::Keys(keys.clone())),
            Type::ListOf(subtype) => Type::ListOf(Box::new(subtype.with_keys(keys))),
            other => other.clone(),
        }
    }

    /// Lowers the type into its data form.
    pub fn to_value(&self) -> Value {
        let tagged = |tag: &str, rest: Vec<Value>| {
            let mut items = vec![Value::atom(tag)];
            items.extend(rest);
            Value::Tuple(items)
        };
        match self {
            Type::KeywordList(Some(schema)) => tagged("keyword_list", vec![schema.to_value()]),
            Type::NonEmptyKeywordList(Some(schema)) => {
                tagged("non_empty_keyword_list", vec![schema.to_value()])
            }
            Type::Map(MapType::Keys(schema)) => tagged("map", vec![schema.to_value()]),
            Type::Map(MapType::Entries(k, v)) => tagged("map", vec![k.to_value(), v.to_value()]),
            Type::Fun(arity) => tagged("fun", vec![Value::Integer(arity_value(*arity))]),
            Type::In(Choices::Values(values)) => tagged("in", vec![Value::List(values.clone())]),
            Type::In(Choices::Range(range)) => tagged(
                "in",
                vec![tagged(
                    "range",
                    vec![Value::Integer(*range.start()), Value::Integer(*range.end())],
                )],
            ),
            Type::Custom(custom) => tagged(
                "custom",
                vec![
                    Value::Function(custom.validator.clone()),
                    Value::List(custom.args.clone()),
                ],
            ),
            Type::Or(subtypes) => tagged(
                "or",
                vec![Value::List(subtypes.iter().map(Type::to_value).collect())],
            ),
            Type::ListOf(subtype) => tagged("list", vec![subtype.to_value()]),
            Type::TupleOf(subtypes) => tagged(
                "tuple",
                vec![Value::List(subtypes.iter().map(Type::to_value).collect())],
            ),
            Type::Struct(name) => tagged("struct", vec![Value::atom(name.clone())]),
            simple => Value::atom(simple.name().trim_start_matches(':')),
        }
    }

    /// Parses a type from its data form.
    ///
    /// `nested` turns the data form of an inline schema into a [`Schema`];
    /// the meta-schema supplies a checking-only implementation, while
    /// [`Schema::from_value`] supplies a full parser.
    pub(crate) fn parse<F>(value: &Value, nested: &mut F) -> Result<Type, String>
    where
        F: FnMut(&Value) -> Result<Schema, String>,
    {
        let parsed = match value {
            Value::Atom(name) => simple_type(name),
            Value::Tuple(items) => match items.split_first() {
                Some((Value::Atom(tag), rest)) => parameterized_type(tag, rest, nested)?,
                _ => None,
            },
            _ => None,
        };
        parsed.ok_or_else(|| {
            format!(
                "invalid option type {value}.\n\nAvailable types: {}",
                TYPE_NAMES.join(", ")
            )
        })
    }
}

fn join_names(types: &[Type]) -> String {
    types.iter().map(Type::name).collect::<Vec<_>>().join(", ")
}

fn arity_value(arity: usize) -> i64 {
    i64::try_from(arity).unwrap_or(i64::MAX)
}

fn simple_type(name: &str) -> Option<Type> {
    let ty = match name {
        "any" => Type::Any,
        "keyword_list" => Type::KeywordList(None),
        "non_empty_keyword_list" => Type::NonEmptyKeywordList(None),
        "map" => Type::Map(MapType::Any),
        "atom" => Type::Atom,
        "integer" => Type::Integer,
        "non_neg_integer" => Type::NonNegInteger,
        "pos_integer" => Type::PosInteger,
        "float" => Type::Float,
        "string" => Type::String,
        "boolean" => Type::Boolean,
        "timeout" => Type::Timeout,
        "pid" => Type::Pid,
        "reference" => Type::Reference,
        "mfa" => Type::Mfa,
        "mod_arg" => Type::ModArg,
        "nil" => Type::Nil,
        _ => return None,
    };
    Some(ty)
}

fn parse_all<F>(values: &[Value], nested: &mut F) -> Result<Vec<Type>, String>
where
    F: FnMut(&Value) -> Result<Schema, String>,
{
    values.iter().map(|v| Type::parse(v, nested)).collect()
}

fn parameterized_type<F>(tag: &str, rest: &[Value], nested: &mut F) -> Result<Option<Type>, String>
where
    F: FnMut(&Value) -> Result<Schema, String>,
{
    let ty = match (tag, rest) {
        ("fun", [Value::Integer(arity)]) if *arity >= 0 => {
            Type::Fun(usize::try_from(*arity).map_err(|e| e.to_string())?)
        }
        ("in", [Value::List(values)]) => Type::In(Choices::Values(values.clone())),
        ("in", [Value::Tuple(range)]) => match range.as_slice() {
            [Value::Atom(t), Value::Integer(lo), Value::Integer(hi)] if t == "range" => {
                Type::in_range(*lo..=*hi)
            }
            _ => return Ok(None),
        },
        ("custom", [Value::Function(validator), args]) => {
            let args = match args {
                Value::List(args) => args.clone(),
                other if other.is_empty_sequence() => Vec::new(),
                _ => return Ok(None),
            };
            if validator.arity() != args.len() + 1 {
                return Err(format!(
                    "custom validator {}/{} must accept the value plus {} extra argument(s)",
                    validator.name(),
                    validator.arity(),
                    args.len()
                ));
            }
            Type::custom_fn(validator.clone(), args)
        }
        ("or", [Value::List(subtypes)]) => Type::Or(parse_all(subtypes, nested)?),
        ("list", [subtype]) => Type::list_of(Type::parse(subtype, nested)?),
        ("tuple", [Value::List(subtypes)]) => Type::TupleOf(parse_all(subtypes, nested)?),
        ("keyword_list", [schema]) => Type::KeywordList(Some(nested(schema)?)),
        ("non_empty_keyword_list", [schema]) => Type::NonEmptyKeywordList(Some(nested(schema)?)),
        ("map", [schema]) => Type::Map(MapType::Keys(nested(schema)?)),
        ("map", [key_type, value_type]) => {
            Type::map_of(Type::parse(key_type, nested)?, Type::parse(value_type, nested)?)
        }
        ("struct", [Value::Atom(name)]) => Type::Struct(name.clone()),
        _ => return Ok(None),
    };
    Ok(Some(ty))
}
