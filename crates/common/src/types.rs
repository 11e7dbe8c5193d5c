//! 通用类型定义
//!
//! Names, namespaces, versions and payloads. Every type here validates on
//! construction, so holding a value means its invariants hold.

use std::collections::{BTreeMap, HashMap};

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between namespace segments and the secret name
pub const PATH_SEPARATOR: char = '/';

/// Why a name, namespace or payload was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("secret name must not be empty")]
    EmptyName,

    #[error("secret name '{0}' contains the path separator '/'")]
    NameContainsSeparator(String),

    #[error("secret name '{0}' is a relative path component")]
    NameIsTraversal(String),

    #[error("namespace must not be empty")]
    EmptyNamespace,

    #[error("namespace '{0}' contains an empty segment")]
    EmptyNamespaceSegment(String),

    #[error("payload must contain at least one field")]
    EmptyPayload,

    #[error("payload field names must not be empty")]
    EmptyFieldName,

    #[error("payload field '{0}' is not a string")]
    NonStringValue(String),
}

/// 密钥名称
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display)]
#[display("{_0}")]
pub struct SecretName(String);

impl SecretName {
    pub fn parse(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if name.contains(PATH_SEPARATOR) {
            return Err(ValidationError::NameContainsSeparator(name));
        }
        if name == "." || name == ".." {
            return Err(ValidationError::NameIsTraversal(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 命名空间
///
/// Path prefix under which one manager scopes all of its secret names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display)]
#[display("{_0}")]
pub struct Namespace(String);

impl Namespace {
    pub fn parse(namespace: impl AsRef<str>) -> Result<Self, ValidationError> {
        let trimmed = namespace.as_ref().trim_matches(PATH_SEPARATOR);
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyNamespace);
        }
        if trimmed.split(PATH_SEPARATOR).any(str::is_empty) {
            return Err(ValidationError::EmptyNamespaceSegment(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `namespace/name`
    pub fn full_path(&self, name: &SecretName) -> String {
        format!("{}{}{}", self.0, PATH_SEPARATOR, name.as_str())
    }
}

/// 密钥版本
///
/// Assigned by the backend on every write. Zero means never written.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From,
)]
#[display("{_0}")]
pub struct SecretVersion(pub u64);

impl SecretVersion {
    pub const NONE: Self = Self(0);

    pub fn exists(&self) -> bool {
        self.0 > 0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

/// 密钥内容
///
/// Ordered field map with at least one field and no empty field names.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct SecretPayload {
    fields: BTreeMap<String, String>,
}

impl SecretPayload {
    pub fn new(fields: BTreeMap<String, String>) -> Result<Self, ValidationError> {
        if fields.is_empty() {
            return Err(ValidationError::EmptyPayload);
        }
        if fields.keys().any(String::is_empty) {
            return Err(ValidationError::EmptyFieldName);
        }
        Ok(Self { fields })
    }

    /// Build a payload from a backend's JSON object, refusing non-string values.
    pub fn from_transport(
        data: HashMap<String, serde_json::Value>,
    ) -> Result<Self, ValidationError> {
        let mut fields = BTreeMap::new();
        for (key, value) in data {
            match value {
                serde_json::Value::String(s) => {
                    fields.insert(key, s);
                }
                _ => return Err(ValidationError::NonStringValue(key)),
            }
        }
        Self::new(fields)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> BTreeMap<String, String> {
        self.fields
    }
}

impl TryFrom<BTreeMap<String, String>> for SecretPayload {
    type Error = ValidationError;

    fn try_from(fields: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<SecretPayload> for BTreeMap<String, String> {
    fn from(payload: SecretPayload) -> Self {
        payload.fields
    }
}

// Field values are credentials; only names are printed.
impl std::fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretPayload")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}
