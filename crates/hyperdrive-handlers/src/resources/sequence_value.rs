//! `Custom::SequenceValue`: draws one value from a sequence
//!
//! The physical id records the raw drawn counter as `<parameter>#<value>`,
//! so that a changed `Expression` is re-evaluated without drawing again.

use crate::aws::ParameterOperations;
use crate::lifecycle::{ReconcileError, Reconciled, ResourceHandler, UpdatePlan, WithPhysicalId};
use crate::resources::decode;
use crate::sequence::SequenceStore;
use crate::wait::{Sleeper, TokioSleeper};
use anyhow::Context;
use garde::Validate;
use hyperdrive_common::defaults::DEFAULT_EXPRESSION;
use hyperdrive_common::event::lenient;
use hyperdrive_common::{Attributes, EvalError, Expr, ResourceEvent, ResourceKind, ValidationError};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

fn default_expression() -> String {
    DEFAULT_EXPRESSION.to_string()
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct SequenceValueProperties {
    /// Full parameter name of the sequence
    #[serde(deserialize_with = "lenient::string", default)]
    #[garde(length(min = 1))]
    pub sequence: String,
    #[serde(deserialize_with = "lenient::string", default = "default_expression")]
    #[garde(skip)]
    pub expression: String,
}

impl SequenceValueProperties {
    /// The expression, `x` when left empty
    fn expression(&self) -> &str {
        if self.expression.trim().is_empty() {
            DEFAULT_EXPRESSION
        } else {
            &self.expression
        }
    }
}

pub struct SequenceValueHandler<P, S = TokioSleeper> {
    store: SequenceStore<P, S>,
}

impl<P: ParameterOperations, S: Sleeper + Clone + 'static> SequenceValueHandler<P, S> {
    pub fn new(store: SequenceStore<P, S>) -> Self {
        Self { store }
    }
}

fn physical_id(parameter: &str, raw: u64) -> String {
    format!("{parameter}#{raw}")
}

/// Split a physical id into parameter name and raw drawn value
fn parse_physical_id(physical_id: &str) -> Result<(&str, u64), ValidationError> {
    physical_id
        .rsplit_once('#')
        .and_then(|(parameter, raw)| Some((parameter, raw.parse().ok()?)))
        .ok_or_else(|| ValidationError::PhysicalId(physical_id.to_string()))
}

/// `Value` and `ValueText` of the expression over a drawn value
fn evaluate(expression: &str, raw: u64) -> anyhow::Result<Attributes> {
    let expr = Expr::parse(expression).map_err(|source| EvalError::Parse {
        expression: expression.to_string(),
        source,
    })?;
    let x = i64::try_from(raw).with_context(|| format!("sequence value {raw} exceeds i64"))?;
    let value = expr.eval(x).ok_or_else(|| EvalError::Overflow {
        expression: expression.to_string(),
        x,
    })?;

    let mut attributes = Attributes::new();
    attributes.insert("Value".to_string(), json!(value));
    attributes.insert("ValueText".to_string(), json!(value.to_string()));
    Ok(attributes)
}

impl<P: ParameterOperations, S: Sleeper + Clone + 'static> ResourceHandler for SequenceValueHandler<P, S> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::SequenceValue
    }

    async fn create(&self, event: &ResourceEvent) -> Result<Reconciled, ReconcileError> {
        let properties: SequenceValueProperties = decode(&event.resource_properties)?;
        let expression = properties.expression();

        // Reject a broken expression before a value is consumed
        Expr::parse(expression).map_err(|source| EvalError::Parse {
            expression: expression.to_string(),
            source,
        })?;

        let raw = self.store.next(&properties.sequence).await?;
        let id = physical_id(&properties.sequence, raw);
        let attributes = evaluate(expression, raw).with_physical_id(&id)?;

        info!(sequence = %properties.sequence, raw, expression, "Evaluated sequence value");
        Ok(Reconciled::new(id).with_attributes(attributes))
    }

    fn plan_update(&self, event: &ResourceEvent) -> Result<UpdatePlan, ReconcileError> {
        let new: SequenceValueProperties = decode(&event.resource_properties)?;
        let old: SequenceValueProperties = decode(&event.old_resource_properties)?;

        if new.sequence == old.sequence {
            Ok(UpdatePlan::InPlace)
        } else {
            Ok(UpdatePlan::Replace)
        }
    }

    async fn update_in_place(&self, event: &ResourceEvent) -> Result<Attributes, ReconcileError> {
        let properties: SequenceValueProperties = decode(&event.resource_properties)?;
        let (_, raw) = parse_physical_id(&event.physical_resource_id)?;
        Ok(evaluate(properties.expression(), raw)?)
    }

    async fn delete(&self, _event: &ResourceEvent) -> Result<(), ReconcileError> {
        // The drawn value is consumed for good
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SequenceConfig;
    use crate::lifecycle::reconcile;
    use crate::testing::{InMemoryParameters, RecordingSleeper};
    use hyperdrive_common::{Properties, RequestType};
    use std::time::Duration;

    const STACK_ID: &str =
        "arn:aws:cloudformation:us-west-2:123456789012:stack/teststack/51af3dc0-da77-11e4-872e-1234567db123";
    const SEQUENCE: &str = "/hyperdrive/sequence/ports";

    fn handler(
        parameters: &InMemoryParameters,
    ) -> SequenceValueHandler<InMemoryParameters, RecordingSleeper> {
        let config = SequenceConfig {
            max_attempts: 3,
            retry_interval: Duration::from_millis(10),
        };
        SequenceValueHandler::new(SequenceStore::with_sleeper(
            parameters.clone(),
            RecordingSleeper::default(),
            config,
        ))
    }

    fn props(sequence: &str, expression: Option<&str>) -> Properties {
        let mut props = Properties::new();
        props.insert("Sequence".to_string(), json!(sequence));
        if let Some(expression) = expression {
            props.insert("Expression".to_string(), json!(expression));
        }
        props
    }

    fn event(request_type: RequestType, physical_id: &str) -> ResourceEvent {
        ResourceEvent::new(request_type, "MyPort", STACK_ID).with_physical_id(physical_id)
    }

    #[test]
    fn test_parse_physical_id() {
        assert_eq!(
            parse_physical_id("/hyperdrive/sequence/ports#12").unwrap(),
            ("/hyperdrive/sequence/ports", 12)
        );
        assert!(parse_physical_id("/hyperdrive/sequence/ports").is_err());
        assert!(parse_physical_id("/hyperdrive/sequence/ports#x").is_err());
    }

    #[tokio::test]
    async fn test_create_draws_and_evaluates() {
        let parameters = InMemoryParameters::new().with_parameter(SEQUENCE, "3");
        let handler = handler(&parameters);

        let outcome = reconcile(
            &handler,
            &event(RequestType::Create, "").with_properties(props(SEQUENCE, Some("8000 + x"))),
        )
        .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.physical_id, "/hyperdrive/sequence/ports#3");
        assert_eq!(outcome.attributes["Value"], 8003);
        assert_eq!(outcome.attributes["ValueText"], "8003");
        assert_eq!(parameters.value(SEQUENCE).as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_default_expression_is_identity() {
        let parameters = InMemoryParameters::new().with_parameter(SEQUENCE, "7");
        let outcome = reconcile(
            &handler(&parameters),
            &event(RequestType::Create, "").with_properties(props(SEQUENCE, None)),
        )
        .await;

        assert_eq!(outcome.attributes["Value"], 7);
        assert_eq!(outcome.attributes["ValueText"], "7");
    }

    #[tokio::test]
    async fn test_bad_expression_consumes_nothing() {
        let parameters = InMemoryParameters::new().with_parameter(SEQUENCE, "7");
        let outcome = reconcile(
            &handler(&parameters),
            &event(RequestType::Create, "").with_properties(props(SEQUENCE, Some("x +"))),
        )
        .await;

        assert_eq!(outcome.physical_id, "failure-MyPort");
        assert!(outcome.error.unwrap().contains("could not parse expression 'x +'"));
        assert_eq!(parameters.history(SEQUENCE), vec!["7"]);
    }

    #[tokio::test]
    async fn test_missing_sequence() {
        let parameters = InMemoryParameters::new();
        let handler = handler(&parameters);

        let outcome = reconcile(
            &handler,
            &event(RequestType::Create, "").with_properties(props("", None)),
        )
        .await;
        assert_eq!(outcome.physical_id, "failure-MyPort");
        assert!(!outcome.is_success());

        let outcome = reconcile(
            &handler,
            &event(RequestType::Create, "").with_properties(props(SEQUENCE, None)),
        )
        .await;
        assert_eq!(outcome.physical_id, "failure-MyPort");
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_overflow_keeps_drawn_id() {
        let parameters = InMemoryParameters::new().with_parameter(SEQUENCE, "2");
        let outcome = reconcile(
            &handler(&parameters),
            &event(RequestType::Create, "")
                .with_properties(props(SEQUENCE, Some("9223372036854775807 * x"))),
        )
        .await;

        assert_eq!(outcome.physical_id, "/hyperdrive/sequence/ports#2");
        assert!(outcome.error.unwrap().contains("overflows"));
    }

    #[tokio::test]
    async fn test_expression_update_reevaluates_without_drawing() {
        let parameters = InMemoryParameters::new().with_parameter(SEQUENCE, "10");
        let update = event(RequestType::Update, "/hyperdrive/sequence/ports#4")
            .with_properties(props(SEQUENCE, Some("2 * (x - 1)")))
            .with_old_properties(props(SEQUENCE, None));

        let outcome = reconcile(&handler(&parameters), &update).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.physical_id, "/hyperdrive/sequence/ports#4");
        assert_eq!(outcome.attributes["Value"], 6);
        assert_eq!(parameters.history(SEQUENCE), vec!["10"]);
    }

    #[tokio::test]
    async fn test_sequence_update_draws_again() {
        let other = "/hyperdrive/sequence/other";
        let parameters = InMemoryParameters::new()
            .with_parameter(SEQUENCE, "10")
            .with_parameter(other, "100");
        let update = event(RequestType::Update, "/hyperdrive/sequence/ports#4")
            .with_properties(props(other, None))
            .with_old_properties(props(SEQUENCE, None));

        let outcome = reconcile(&handler(&parameters), &update).await;

        assert_eq!(outcome.physical_id, "/hyperdrive/sequence/other#100");
        assert_eq!(parameters.value(other).as_deref(), Some("101"));
    }

    #[tokio::test]
    async fn test_delete_is_noop() {
        let parameters = InMemoryParameters::new().with_parameter(SEQUENCE, "10");
        let outcome = reconcile(
            &handler(&parameters),
            &event(RequestType::Delete, "/hyperdrive/sequence/ports#4"),
        )
        .await;

        assert!(outcome.is_success());
        assert_eq!(parameters.history(SEQUENCE), vec!["10"]);
    }
}
