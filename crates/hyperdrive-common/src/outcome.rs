//! Handler results and the CloudFormation response document

use crate::event::ResourceEvent;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Attributes exposed through `Fn::GetAtt`
pub type Attributes = Map<String, Value>;

/// The result of reconciling one [`ResourceEvent`]
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceOutcome {
    /// Never empty, even for failures
    pub physical_id: String,
    pub attributes: Attributes,
    /// Reason of the failure, `None` on success
    pub error: Option<String>,
}

impl ResourceOutcome {
    pub fn success(physical_id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            physical_id: physical_id.into(),
            attributes,
            error: None,
        }
    }

    pub fn failure(physical_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            physical_id: physical_id.into(),
            attributes: Attributes::new(),
            error: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Build the response document CloudFormation expects for `event`
    pub fn into_response(self, event: &ResourceEvent) -> CfnResponse {
        let (status, reason) = match self.error {
            None => (ResponseStatus::Success, None),
            Some(reason) => (ResponseStatus::Failed, Some(reason)),
        };
        CfnResponse {
            status,
            reason,
            physical_resource_id: self.physical_id,
            stack_id: event.stack_id.clone(),
            request_id: event.request_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
            data: self.attributes,
        }
    }
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Response document uploaded to the request's `ResponseURL`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CfnResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Attributes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RequestType;
    use serde_json::json;

    #[test]
    fn test_success_response() {
        let event = ResourceEvent::new(RequestType::Create, "MyLogGroup", "stack");
        let mut attributes = Attributes::new();
        attributes.insert("Arn".to_string(), json!("arn:aws:logs:eu-west-1:1:log-group:/g"));

        let response = ResourceOutcome::success("/g", attributes).into_response(&event);
        let doc = serde_json::to_value(&response).unwrap();

        assert_eq!(doc["Status"], "SUCCESS");
        assert_eq!(doc["PhysicalResourceId"], "/g");
        assert_eq!(doc["LogicalResourceId"], "MyLogGroup");
        assert_eq!(doc["Data"]["Arn"], "arn:aws:logs:eu-west-1:1:log-group:/g");
        assert!(doc.get("Reason").is_none());
    }

    #[test]
    fn test_failure_response() {
        let event = ResourceEvent::new(RequestType::Create, "Seq", "stack");
        let outcome = ResourceOutcome::failure("failure-Seq", "name seq must start with an /");
        assert!(!outcome.is_success());

        let doc = serde_json::to_value(outcome.into_response(&event)).unwrap();
        assert_eq!(doc["Status"], "FAILED");
        assert_eq!(doc["Reason"], "name seq must start with an /");
        assert!(doc.get("Data").is_none());
    }
}
