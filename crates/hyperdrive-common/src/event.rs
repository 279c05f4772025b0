//! CloudFormation custom resource requests
//!
//! A [`ResourceEvent`] is decoded once per invocation from the request JSON
//! and discarded after exactly one response has been produced for it.
//!
//! The most important field of every response is the physical resource
//! id. It must never be empty: when creation fails before the external
//! system assigned an identifier, the handler answers with
//! [`failure_physical_id`] so that the `Delete` CloudFormation sends later
//! (on rollback or stack deletion) can be recognised and skipped.

use crate::defaults::FAILURE_ID_PREFIX;
use crate::error::ValidationError;
use crate::region::arn_region;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Raw resource properties as delivered by CloudFormation
pub type Properties = Map<String, Value>;

/// Lifecycle request type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestType {
    Create,
    Update,
    Delete,
    /// Anything else; handlers answer it with a failure
    Unknown(String),
}

impl RequestType {
    pub fn as_str(&self) -> &str {
        match self {
            RequestType::Create => "Create",
            RequestType::Update => "Update",
            RequestType::Delete => "Delete",
            RequestType::Unknown(other) => other,
        }
    }
}

impl From<String> for RequestType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Create" => RequestType::Create,
            "Update" => RequestType::Update,
            "Delete" => RequestType::Delete,
            _ => RequestType::Unknown(value),
        }
    }
}

impl From<RequestType> for String {
    fn from(value: RequestType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle notification for one custom resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceEvent {
    pub request_type: RequestType,
    #[serde(default)]
    pub request_id: String,
    /// Pre-signed URL expecting the response document
    #[serde(rename = "ResponseURL", default)]
    pub response_url: String,
    #[serde(default)]
    pub resource_type: String,
    pub logical_resource_id: String,
    /// Empty only before creation
    #[serde(default)]
    pub physical_resource_id: String,
    pub stack_id: String,
    #[serde(default)]
    pub resource_properties: Properties,
    /// Present on `Update` only
    #[serde(default)]
    pub old_resource_properties: Properties,
}

impl ResourceEvent {
    /// Create an event with empty properties and no physical id
    pub fn new(
        request_type: RequestType,
        logical_resource_id: impl Into<String>,
        stack_id: impl Into<String>,
    ) -> Self {
        Self {
            request_type,
            request_id: String::new(),
            response_url: String::new(),
            resource_type: String::new(),
            logical_resource_id: logical_resource_id.into(),
            physical_resource_id: String::new(),
            stack_id: stack_id.into(),
            resource_properties: Properties::new(),
            old_resource_properties: Properties::new(),
        }
    }

    pub fn with_physical_id(mut self, physical_id: impl Into<String>) -> Self {
        self.physical_resource_id = physical_id.into();
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.resource_properties = properties;
        self
    }

    pub fn with_old_properties(mut self, properties: Properties) -> Self {
        self.old_resource_properties = properties;
        self
    }

    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    /// The failure physical id for this event's logical resource
    pub fn failure_physical_id(&self) -> String {
        failure_physical_id(&self.logical_resource_id)
    }

    /// Whether the current physical id marks a resource that was never created
    pub fn is_failure(&self) -> bool {
        is_failure_physical_id(&self.physical_resource_id)
    }

    /// The region the resource lives in.
    ///
    /// An absent or empty `Region` property resolves to the region of the
    /// enclosing stack. `None` only when the stack id is not an ARN.
    pub fn region(&self) -> Option<&str> {
        self.resource_properties
            .get("Region")
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .or_else(|| arn_region(&self.stack_id))
    }
}

/// Decode a raw property map into a typed struct
pub fn decode_properties<T: DeserializeOwned>(properties: &Properties) -> Result<T, ValidationError> {
    Ok(serde_json::from_value(Value::Object(properties.clone()))?)
}

/// Physical id reported when creation never produced a real object
pub fn failure_physical_id(logical_resource_id: &str) -> String {
    format!("{FAILURE_ID_PREFIX}{logical_resource_id}")
}

/// Check whether a physical id is a failure id
pub fn is_failure_physical_id(physical_id: &str) -> bool {
    physical_id.starts_with(FAILURE_ID_PREFIX)
}

/// Serde helpers for CloudFormation's loosely typed scalars.
///
/// Templates deliver every scalar as a string, but events crafted by hand
/// (or by other tooling) often carry plain JSON numbers.
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept a string, a number or a boolean as a string; `null` as empty
    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok(String::new()),
            other => Err(serde::de::Error::custom(format!(
                "expected a scalar, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STACK_ID: &str =
        "arn:aws:cloudformation:us-west-2:123456789012:stack/teststack/51af3dc0-da77-11e4-872e-1234567db123";

    #[test]
    fn test_decode_request() {
        let raw = json!({
            "RequestType": "Update",
            "RequestId": "unique-id",
            "ResponseURL": "https://example.com/response",
            "ResourceType": "Custom::LogGroup",
            "LogicalResourceId": "MyLogGroup",
            "PhysicalResourceId": "/my/group",
            "StackId": STACK_ID,
            "ResourceProperties": {"LogGroupName": "/my/group", "Region": "eu-west-1"},
            "OldResourceProperties": {"LogGroupName": "/my/group"}
        });
        let event: ResourceEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.request_type, RequestType::Update);
        assert_eq!(event.response_url, "https://example.com/response");
        assert_eq!(event.physical_resource_id, "/my/group");
        assert_eq!(event.region(), Some("eu-west-1"));
        assert_eq!(event.old_resource_properties.len(), 1);
    }

    #[test]
    fn test_unknown_request_type() {
        let raw = json!({
            "RequestType": "Replace",
            "LogicalResourceId": "Res",
            "StackId": STACK_ID
        });
        let event: ResourceEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.request_type, RequestType::Unknown("Replace".to_string()));
        assert_eq!(event.request_type.to_string(), "Replace");
        assert!(event.physical_resource_id.is_empty());
    }

    #[test]
    fn test_failure_physical_id() {
        let event = ResourceEvent::new(RequestType::Create, "MyCertificate", STACK_ID);
        assert_eq!(event.failure_physical_id(), "failure-MyCertificate");
        assert!(is_failure_physical_id("failure-MyCertificate"));
        assert!(!is_failure_physical_id("arn:aws:acm:us-east-1:1:certificate/abc"));
        assert!(!event.is_failure());
        assert!(event.with_physical_id("failure-MyCertificate").is_failure());
    }

    #[test]
    fn test_empty_region_resolves_to_stack_region() {
        let mut props = Properties::new();
        props.insert("Region".to_string(), json!(""));
        let event = ResourceEvent::new(RequestType::Create, "Res", STACK_ID).with_properties(props);
        assert_eq!(event.region(), Some("us-west-2"));

        let event = ResourceEvent::new(RequestType::Create, "Res", STACK_ID);
        assert_eq!(event.region(), Some("us-west-2"));

        let event = ResourceEvent::new(RequestType::Create, "Res", "local-stack");
        assert_eq!(event.region(), None);
    }

    #[test]
    fn test_lenient_string() {
        #[derive(serde::Deserialize)]
        struct Props {
            #[serde(deserialize_with = "lenient::string", default)]
            value: String,
        }
        let p: Props = serde_json::from_value(json!({"value": 42})).unwrap();
        assert_eq!(p.value, "42");
        let p: Props = serde_json::from_value(json!({"value": "7"})).unwrap();
        assert_eq!(p.value, "7");
        let p: Props = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.value, "");
        assert!(serde_json::from_value::<Props>(json!({"value": [1]})).is_err());
    }
}
