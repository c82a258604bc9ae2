//! Validation of candidate objects at creation boundaries.
//!
//! Candidates arrive as loose JSON. A [`SchemaValidator`] checks them
//! against a named schema and returns the normalized object, with defaults
//! filled in, ready to be deserialized into the model.

use crate::descriptor::NativePlatform;
use crate::error::{CauldronError, CauldronResult};
use serde_json::{Map, Value};
use std::fmt;

/// Names the schema a candidate is validated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaId {
    /// A native application.
    NativeApplication,
    /// A native application platform.
    NativeApplicationPlatform,
    /// A native application version.
    NativeApplicationVersion,
    /// The editable fields of an existing version.
    NativeApplicationVersionPatch,
    /// A code push entry.
    CodePushEntry,
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NativeApplication => "nativeApplication",
            Self::NativeApplicationPlatform => "nativeApplicationPlatform",
            Self::NativeApplicationVersion => "nativeApplicationVersion",
            Self::NativeApplicationVersionPatch => "nativeApplicationVersionPatch",
            Self::CodePushEntry => "codePushEntry",
        };
        f.write_str(name)
    }
}

/// Validates candidate objects.
///
/// # Invariants
///
/// - A returned object deserializes into the model type the schema names.
/// - Validation is pure: the same candidate always yields the same result.
///
/// # Implementors
///
/// - [`BuiltinValidator`]: the rules the on-disk format requires.
pub trait SchemaValidator: Send + Sync {
    /// Validates `candidate` against `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`CauldronError::Validation`] with the path of the first
    /// offending field.
    fn validate(&self, candidate: Value, schema: SchemaId) -> CauldronResult<Value>;
}

/// Built-in schema rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinValidator;

impl BuiltinValidator {
    /// Creates the validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SchemaValidator for BuiltinValidator {
    fn validate(&self, candidate: Value, schema: SchemaId) -> CauldronResult<Value> {
        check_object(candidate, fields_of(schema), "")
    }
}

#[derive(Clone, Copy)]
enum Rule {
    Name,
    Text,
    Flag,
    Platform,
    Rollout,
    Size,
    Object,
    Strings,
    StringMap,
    Container,
    Metadata,
    CodePush,
    Many(SchemaId),
}

#[derive(Clone, Copy)]
enum Presence {
    Required,
    Optional,
    Default(fn() -> Value),
}

struct Field {
    key: &'static str,
    rule: Rule,
    presence: Presence,
}

const fn field(key: &'static str, rule: Rule, presence: Presence) -> Field {
    Field { key, rule, presence }
}

fn empty_array() -> Value {
    Value::Array(Vec::new())
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn not_released() -> Value {
    Value::Bool(false)
}

fn empty_container() -> Value {
    serde_json::json!({"miniApps": [], "jsApiImpls": [], "nativeDeps": []})
}

const NATIVE_APPLICATION: &[Field] = &[
    field("name", Rule::Name, Presence::Required),
    field(
        "platforms",
        Rule::Many(SchemaId::NativeApplicationPlatform),
        Presence::Default(empty_array),
    ),
    field("config", Rule::Object, Presence::Optional),
];

const PLATFORM: &[Field] = &[
    field("name", Rule::Platform, Presence::Required),
    field(
        "versions",
        Rule::Many(SchemaId::NativeApplicationVersion),
        Presence::Default(empty_array),
    ),
    field("containerVersion", Rule::Text, Presence::Optional),
    field("config", Rule::Object, Presence::Optional),
];

const VERSION: &[Field] = &[
    field("name", Rule::Name, Presence::Required),
    field("isReleased", Rule::Flag, Presence::Default(not_released)),
    field("containerVersion", Rule::Text, Presence::Optional),
    field("description", Rule::Text, Presence::Optional),
    field("container", Rule::Container, Presence::Default(empty_container)),
    field("codePush", Rule::CodePush, Presence::Default(empty_object)),
    field("yarnLocks", Rule::StringMap, Presence::Default(empty_object)),
    field("config", Rule::Object, Presence::Optional),
];

const VERSION_PATCH: &[Field] = &[
    field("isReleased", Rule::Flag, Presence::Optional),
    field("description", Rule::Text, Presence::Optional),
];

const CONTAINER: &[Field] = &[
    field("miniApps", Rule::Strings, Presence::Default(empty_array)),
    field("miniAppsBranches", Rule::Strings, Presence::Optional),
    field("jsApiImpls", Rule::Strings, Presence::Default(empty_array)),
    field("jsApiImplsBranches", Rule::Strings, Presence::Optional),
    field("nativeDeps", Rule::Strings, Presence::Default(empty_array)),
    field("ernVersion", Rule::Text, Presence::Optional),
];

const CODE_PUSH_ENTRY: &[Field] = &[
    field("metadata", Rule::Metadata, Presence::Required),
    field("miniapps", Rule::Strings, Presence::Default(empty_array)),
    field("jsApiImpls", Rule::Strings, Presence::Default(empty_array)),
];

const METADATA: &[Field] = &[
    field("deploymentName", Rule::Name, Presence::Required),
    field("label", Rule::Text, Presence::Optional),
    field("appVersion", Rule::Text, Presence::Optional),
    field("rollout", Rule::Rollout, Presence::Optional),
    field("isMandatory", Rule::Flag, Presence::Optional),
    field("isDisabled", Rule::Flag, Presence::Optional),
    field("description", Rule::Text, Presence::Optional),
    field("releaseMethod", Rule::Text, Presence::Optional),
    field("releasedBy", Rule::Text, Presence::Optional),
    field("size", Rule::Size, Presence::Optional),
    field("promotedFromLabel", Rule::Text, Presence::Optional),
];

const fn fields_of(schema: SchemaId) -> &'static [Field] {
    match schema {
        SchemaId::NativeApplication => NATIVE_APPLICATION,
        SchemaId::NativeApplicationPlatform => PLATFORM,
        SchemaId::NativeApplicationVersion => VERSION,
        SchemaId::NativeApplicationVersionPatch => VERSION_PATCH,
        SchemaId::CodePushEntry => CODE_PUSH_ENTRY,
    }
}

fn invalid(path: &str, message: impl Into<String>) -> CauldronError {
    let path = if path.is_empty() { "/" } else { path };
    CauldronError::validation(path, message)
}

fn check_object(value: Value, fields: &[Field], path: &str) -> CauldronResult<Value> {
    let Value::Object(mut object) = value else {
        return Err(invalid(path, "must be an object"));
    };
    if let Some(unknown) = object
        .keys()
        .find(|key| !fields.iter().any(|f| f.key == key.as_str()))
    {
        return Err(invalid(&format!("{path}/{unknown}"), "is not allowed"));
    }
    for f in fields {
        let field_path = format!("{path}/{}", f.key);
        match (object.remove(f.key), f.presence) {
            (Some(value), _) => {
                let checked = check_rule(value, f.rule, &field_path)?;
                object.insert(f.key.to_string(), checked);
            }
            (None, Presence::Required) => return Err(invalid(&field_path, "is required")),
            (None, Presence::Default(default)) => {
                object.insert(f.key.to_string(), default());
            }
            (None, Presence::Optional) => {}
        }
    }
    Ok(Value::Object(object))
}

fn check_rule(value: Value, rule: Rule, path: &str) -> CauldronResult<Value> {
    match rule {
        Rule::Name => match value.as_str() {
            Some(s) if !s.trim().is_empty() => Ok(value),
            Some(_) => Err(invalid(path, "must not be empty")),
            None => Err(invalid(path, "must be a string")),
        },
        Rule::Text if value.is_string() => Ok(value),
        Rule::Text => Err(invalid(path, "must be a string")),
        Rule::Flag if value.is_boolean() => Ok(value),
        Rule::Flag => Err(invalid(path, "must be a boolean")),
        Rule::Platform => {
            let name = value
                .as_str()
                .ok_or_else(|| invalid(path, "must be a string"))?;
            name.parse::<NativePlatform>()
                .map_err(|_| invalid(path, "must be one of android, ios"))?;
            Ok(value)
        }
        Rule::Rollout => match value.as_u64() {
            Some(n) if n <= 100 => Ok(value),
            _ => Err(invalid(path, "must be an integer between 0 and 100")),
        },
        Rule::Size if value.is_u64() => Ok(value),
        Rule::Size => Err(invalid(path, "must be a non-negative integer")),
        Rule::Object if value.is_object() => Ok(value),
        Rule::Object => Err(invalid(path, "must be an object")),
        Rule::Strings => {
            let items = value
                .as_array()
                .ok_or_else(|| invalid(path, "must be an array"))?;
            if let Some(i) = items.iter().position(|item| !item.is_string()) {
                return Err(invalid(&format!("{path}/{i}"), "must be a string"));
            }
            Ok(value)
        }
        Rule::StringMap => {
            let map = value
                .as_object()
                .ok_or_else(|| invalid(path, "must be an object"))?;
            if let Some(key) = map.iter().find_map(|(k, v)| (!v.is_string()).then_some(k)) {
                return Err(invalid(&format!("{path}/{key}"), "must be a string"));
            }
            Ok(value)
        }
        Rule::Container => check_object(value, CONTAINER, path),
        Rule::Metadata => check_object(value, METADATA, path),
        Rule::CodePush => {
            let Value::Object(map) = value else {
                return Err(invalid(path, "must be an object"));
            };
            let mut checked = Map::new();
            for (deployment, entries) in map {
                let entries_path = format!("{path}/{deployment}");
                let entries = check_rule(entries, Rule::Many(SchemaId::CodePushEntry), &entries_path)?;
                checked.insert(deployment, entries);
            }
            Ok(Value::Object(checked))
        }
        Rule::Many(schema) => {
            let Value::Array(items) = value else {
                return Err(invalid(path, "must be an array"));
            };
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| check_object(item, fields_of(schema), &format!("{path}/{i}")))
                .collect::<CauldronResult<Vec<_>>>()
                .map(Value::Array)
        }
    }
}
