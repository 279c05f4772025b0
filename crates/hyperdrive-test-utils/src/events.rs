//! Lifecycle event builders
//!
//! ```
//! use hyperdrive_common::{RequestType, ResourceKind};
//! use hyperdrive_test_utils::events::{EventBuilder, properties};
//! use serde_json::json;
//!
//! let event = EventBuilder::new(ResourceKind::LogGroup, "Logs")
//!     .update("/app/web")
//!     .properties(properties(json!({"LogGroupName": "/app/web"})))
//!     .old_properties(properties(json!({"LogGroupName": "/app/old"})))
//!     .build();
//! assert_eq!(event.request_type, RequestType::Update);
//! assert_eq!(event.resource_type, "Custom::LogGroup");
//! ```

use crate::aws::test_stack_id;
use hyperdrive_common::{Properties, RequestType, ResourceEvent, ResourceKind};
use serde_json::Value;

/// Convert a JSON object into a property map.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn properties(value: Value) -> Properties {
    match value {
        Value::Object(map) => map,
        other => panic!("properties must be a JSON object, got {other}"),
    }
}

/// Builds [`ResourceEvent`]s the way CloudFormation sends them
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: ResourceEvent,
}

impl EventBuilder {
    /// A `Create` for `logical_id` in a stack in us-west-2
    pub fn new(kind: ResourceKind, logical_id: &str) -> Self {
        let event = ResourceEvent::new(RequestType::Create, logical_id, test_stack_id("us-west-2"))
            .with_resource_type(kind.resource_type());
        Self { event }
    }

    pub fn stack_id(mut self, stack_id: impl Into<String>) -> Self {
        self.event.stack_id = stack_id.into();
        self
    }

    pub fn update(mut self, physical_id: &str) -> Self {
        self.event.request_type = RequestType::Update;
        self.event.physical_resource_id = physical_id.to_string();
        self
    }

    pub fn delete(mut self, physical_id: &str) -> Self {
        self.event.request_type = RequestType::Delete;
        self.event.physical_resource_id = physical_id.to_string();
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.event.resource_properties = properties;
        self
    }

    pub fn old_properties(mut self, properties: Properties) -> Self {
        self.event.old_resource_properties = properties;
        self
    }

    pub fn response_url(mut self, url: &str) -> Self {
        self.event.response_url = url.to_string();
        self
    }

    pub fn build(self) -> ResourceEvent {
        let mut event = self.event;
        if event.request_id.is_empty() {
            event.request_id = format!("{}-{}", event.logical_resource_id, event.request_type);
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_event() {
        let event = EventBuilder::new(ResourceKind::SequenceGenerator, "Seq")
            .properties(properties(json!({"SequenceName": "/s"})))
            .build();

        assert_eq!(event.request_type, RequestType::Create);
        assert!(event.physical_resource_id.is_empty());
        assert_eq!(event.request_id, "Seq-Create");
        assert_eq!(event.resource_properties["SequenceName"], "/s");
    }

    #[test]
    fn test_delete_event() {
        let event = EventBuilder::new(ResourceKind::S3Cleanup, "Cleanup")
            .delete("Cleanup")
            .build();
        assert_eq!(event.request_type, RequestType::Delete);
        assert_eq!(event.physical_resource_id, "Cleanup");
    }

    #[test]
    #[should_panic(expected = "must be a JSON object")]
    fn test_properties_require_object() {
        properties(json!([1, 2]));
    }
}
