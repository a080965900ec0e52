//! Dynamic values validated by a schema.
//!
//! Options arrive as an already-parsed, in-memory tree. [`Value`] is the
//! closed set of shapes such a tree may contain: scalars, atoms, sequences,
//! keyword lists, maps, opaque runtime handles, callables, and tagged
//! structs. The same type also carries the data form of a schema (see
//! [`Schema::to_value`](crate::Schema::to_value)), which is what lets the
//! meta-schema validate schemas with the ordinary validator.
//!
//! `Display` renders values in a compact inspect notation that every error
//! message uses when quoting offending input:
//!
//! ```
//! use option_schema_core::Value;
//!
//! let opts = Value::keyword([("name", Value::from("db")), ("pool", Value::from(10))]);
//! assert_eq!(opts.to_string(), r#"[name: "db", pool: 10]"#);
//! assert_eq!(Value::atom("infinity").to_string(), ":infinity");
//! assert_eq!(Value::Tuple(vec![1.into(), 2.into()]).to_string(), "{1, 2}");
//! ```

use std::fmt;
use std::sync::Arc;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

type FunctionBody = dyn Fn(&[Value]) -> Value + Send + Sync;

/// A named callable with a fixed arity.
///
/// Functions appear in options (validated by [`Type::Fun`](crate::Type::Fun))
/// and as the body of dynamic custom validators. Two functions are equal only
/// when they share the same body allocation.
///
/// # Examples
///
/// ```
/// use option_schema_core::{Function, Value};
///
/// let double = Function::new("double", 1, |args| match &args[0] {
///     Value::Integer(n) => Value::Integer(n * 2),
///     other => other.clone(),
/// });
/// assert_eq!(double.arity(), 1);
/// assert_eq!(double.call(&[Value::from(21)]), Value::from(42));
/// ```
#[derive(Clone)]
pub struct Function {
    name: Arc<str>,
    arity: usize,
    body: Arc<FunctionBody>,
}

impl Function {
    /// Creates a function from a closure receiving exactly `arity` arguments.
    pub fn new(
        name: impl Into<Arc<str>>,
        arity: usize,
        body: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            body: Arc::new(body),
        }
    }

    /// Function name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of arguments the function accepts.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Invokes the function.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.body)(args)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.arity == other.arity
            && self.name == other.name
            && std::ptr::addr_eq(Arc::as_ptr(&self.body), Arc::as_ptr(&other.body))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#Function<{}/{}>", self.name, self.arity)
    }
}

/// A record tagged with a type name.
#[derive(Debug, Clone, PartialEq)]
pub struct Struct {
    /// Tag checked by [`Type::Struct`](crate::Type::Struct).
    pub name: String,
    /// Field values in declaration order.
    pub fields: Vec<(String, Value)>,
}

impl Struct {
    /// Creates an empty struct with the given tag.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }
}

/// A dynamically-typed option value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The null sentinel.
    #[default]
    Nil,
    /// `true` or `false`.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Symbolic identifier (module names, enum-like choices, `:infinity`).
    Atom(String),
    /// UTF-8 string.
    String(String),
    /// Ordered sequence.
    List(Vec<Value>),
    /// Fixed-size positional group.
    Tuple(Vec<Value>),
    /// Ordered atom-keyed pairs; the usual shape of an options tree.
    Keyword(Vec<(String, Value)>),
    /// Ordered pairs with arbitrary keys.
    Map(Vec<(Value, Value)>),
    /// Opaque process handle.
    Pid(u64),
    /// Opaque reference handle.
    Ref(u64),
    /// Callable value.
    Function(Function),
    /// Tagged record.
    Struct(Struct),
}

impl Value {
    /// Builds an atom.
    pub fn atom(name: impl Into<String>) -> Self {
        Value::Atom(name.into())
    }

    /// Builds a keyword list from `(key, value)` pairs.
    pub fn keyword<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Keyword(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds a map from `(key, value)` pairs.
    pub fn map<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Value, Value)>,
    {
        Value::Map(pairs.into_iter().collect())
    }

    /// Builds a list.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Value::List(items.into_iter().collect())
    }

    /// The `{:ok, value}` tuple a dynamic custom validator returns on success.
    pub fn ok(value: Value) -> Self {
        Value::Tuple(vec![Value::atom("ok"), value])
    }

    /// The `{:error, message}` tuple a dynamic custom validator returns on
    /// failure.
    pub fn error(message: impl Into<String>) -> Self {
        Value::Tuple(vec![Value::atom("error"), Value::String(message.into())])
    }

    /// Returns `true` for the empty sequence, whether spelled as a list or an
    /// empty keyword list.
    pub fn is_empty_sequence(&self) -> bool {
        match self {
            Value::List(items) => items.is_empty(),
            Value::Keyword(pairs) => pairs.is_empty(),
            _ => false,
        }
    }

    /// Returns the atom name if this is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Value::Atom(name) => Some(name),
            _ => None,
        }
    }

    /// Looks up the first value stored under `key` in a keyword list or map.
    ///
    /// Keyword keys match atom lookups only.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match (self, key) {
            (Value::Keyword(pairs), Value::Atom(name)) => {
                pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
            }
            (Value::Map(pairs), _) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Value::Function(value)
    }
}

impl From<Struct> for Value {
    fn from(value: Struct) -> Self {
        Value::Struct(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(fields) => Value::Keyword(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_fields(f: &mut fmt::Formatter<'_>, pairs: &[(String, Value)]) -> fmt::Result {
    for (i, (key, value)) in pairs.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{key}: {value}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Atom(name) => write!(f, ":{name}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                write_seq(f, items)?;
                f.write_str("]")
            }
            Value::Tuple(items) => {
                f.write_str("{")?;
                write_seq(f, items)?;
                f.write_str("}")
            }
            Value::Keyword(pairs) => {
                f.write_str("[")?;
                write_fields(f, pairs)?;
                f.write_str("]")
            }
            Value::Map(pairs) => {
                f.write_str("%{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key} => {value}")?;
                }
                f.write_str("}")
            }
            Value::Pid(id) => write!(f, "#Pid<{id}>"),
            Value::Ref(id) => write!(f, "#Ref<{id}>"),
            Value::Function(fun) => write!(f, "{fun:?}"),
            Value::Struct(s) => {
                write!(f, "%{}{{", s.name)?;
                write_fields(f, &s.fields)?;
                f.write_str("}")
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::Atom(name) | Value::String(name) => serializer.serialize_str(name),
            Value::List(items) | Value::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Keyword(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Map(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    match key {
                        Value::Atom(name) | Value::String(name) => {
                            map.serialize_entry(name, value)?
                        }
                        other => map.serialize_entry(&other.to_string(), value)?,
                    }
                }
                map.end()
            }
            Value::Struct(s) => {
                let mut map = serializer.serialize_map(Some(s.fields.len()))?;
                for (key, value) in &s.fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Pid(_) | Value::Ref(_) | Value::Function(_) => {
                serializer.serialize_str(&self.to_string())
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an option value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Deserialize::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(match i64::try_from(v) {
            Ok(i) => Value::Integer(i),
            Err(_) => Value::Float(v as f64),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut pairs = Vec::new();
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            pairs.push((key, value));
        }
        Ok(Value::Keyword(pairs))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
