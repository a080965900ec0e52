//! Validation errors and contract faults.
//!
//! Two failure classes exist. [`ValidationError`] describes bad input data
//! and is returned to the caller. [`ContractFault`] describes a broken
//! contract in the calling code (an invalid schema, or a custom validator
//! that returned something other than an ok/error tuple); the validation
//! entry points never hand it back as an ordinary error.

use std::fmt;

use thiserror::Error;

use crate::Value;

/// Placeholder substituted for redacted values.
pub const REDACTED: &str = "**redacted**";

/// Identifies what a [`ValidationError`] is about.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKey {
    /// A single option key.
    Single(Value),
    /// The unknown keys found in the input, in input order.
    Unknown(Vec<Value>),
    /// The options container itself.
    Root,
}

impl fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKey::Single(key) => write!(f, "{key}"),
            ErrorKey::Unknown(keys) => write!(f, "{}", Value::List(keys.clone())),
            ErrorKey::Root => f.write_str("options"),
        }
    }
}

/// An error raised by validating options against a schema.
///
/// `message` never contains the location; [`Display`](fmt::Display) appends
/// ` (in options [...])` when `keys_path` is non-empty.
///
/// # Examples
///
/// ```
/// use option_schema_core::{ErrorKey, ValidationError, Value};
///
/// let err = ValidationError::new(
///     ErrorKey::Single(Value::atom("port")),
///     "invalid value for :port option: expected integer",
/// )
/// .with_keys_path(vec![Value::atom("server")]);
///
/// assert_eq!(
///     err.to_string(),
///     "invalid value for :port option: expected integer (in options [:server])"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", self.render())]
pub struct ValidationError {
    /// The failing key.
    pub key: ErrorKey,
    /// Ancestor keys from the schema root down to the failing option.
    pub keys_path: Vec<Value>,
    /// Human-readable message without a location suffix.
    pub message: String,
    /// Offending value, `None` when no value was supplied.
    pub value: Option<Value>,
    /// Whether the value was withheld from this error.
    pub redact: bool,
}

impl ValidationError {
    /// Creates an error with no value attached.
    pub fn new(key: ErrorKey, message: impl Into<String>) -> Self {
        Self {
            key,
            keys_path: Vec::new(),
            message: message.into(),
            value: None,
            redact: false,
        }
    }

    /// Attaches the offending value.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self.scrub();
        self
    }

    /// Sets the ancestor path.
    pub fn with_keys_path(mut self, keys_path: Vec<Value>) -> Self {
        self.keys_path = keys_path;
        self
    }

    /// Marks the error as redacted, replacing [`value`](Self::value) with
    /// [`REDACTED`]. The message is left as is; it must not quote the value.
    pub fn redacted(mut self) -> Self {
        self.redact = true;
        self.scrub();
        self
    }

    /// Prepends ancestor keys as the error travels up through nested schemas.
    pub(crate) fn prefix_path(mut self, ancestors: &[Value]) -> Self {
        let mut keys_path = ancestors.to_vec();
        keys_path.append(&mut self.keys_path);
        self.keys_path = keys_path;
        self
    }

    fn scrub(&mut self) {
        if self.redact && self.value.is_some() {
            self.value = Some(Value::String(REDACTED.to_string()));
        }
    }

    /// Final message including the location suffix.
    pub fn render(&self) -> String {
        if self.keys_path.is_empty() {
            self.message.clone()
        } else {
            format!(
                "{} (in options {})",
                self.message,
                Value::List(self.keys_path.clone())
            )
        }
    }
}

/// A broken contract in the code using this crate.
///
/// Contract faults are never returned from [`validate`](crate::validate);
/// they abort the call. [`compile`](crate::compile) and
/// [`Schema::from_value`](crate::Schema::from_value) return them so schema
/// definitions can be checked at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractFault {
    /// The schema does not satisfy the meta-schema.
    #[error("invalid schema: {0}")]
    InvalidSchema(ValidationError),

    /// A custom validator returned neither `{:ok, value}` nor
    /// `{:error, message}`.
    #[error(
        "custom validator {validator} must return {{:ok, value}} or {{:error, message}}, got: {returned}"
    )]
    MalformedValidatorResult {
        /// Validator name and arity, e.g. `parse_port/1`.
        validator: String,
        /// What the validator actually returned.
        returned: Value,
    },
}

/// Replaces standalone renderings of `value` in a caller-written message.
///
/// A match must not continue a word on either side, so redacting `1` leaves
/// `10` and `position 12` alone.
pub(crate) fn scrub_literal(message: &str, value: &Value) -> String {
    let literal = value.to_string();
    if literal.is_empty() {
        return message.to_string();
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let joins = |outer: Option<char>, inner: Option<char>| {
        matches!((outer, inner), (Some(o), Some(i)) if is_word(o) && is_word(i))
    };

    let mut out = String::with_capacity(message.len());
    let mut last = 0;
    for (start, _) in message.match_indices(&literal) {
        let end = start + literal.len();
        let before = message[..start].chars().next_back();
        let after = message[end..].chars().next();
        if joins(before, literal.chars().next()) || joins(after, literal.chars().next_back()) {
            continue;
        }
        out.push_str(&message[last..start]);
        out.push_str(REDACTED);
        last = end;
    }
    out.push_str(&message[last..]);
    out
}

/// Internal outcome of a failed match: bad input, or a fault that must
/// escape every combinator untouched.
#[derive(Debug)]
pub(crate) enum Failure {
    Invalid(Box<ValidationError>),
    Fault(ContractFault),
}

impl From<ValidationError> for Failure {
    fn from(error: ValidationError) -> Self {
        Failure::Invalid(Box::new(error))
    }
}

impl From<ContractFault> for Failure {
    fn from(fault: ContractFault) -> Self {
        Failure::Fault(fault)
    }
}
