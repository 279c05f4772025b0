//! SSM integration tests - actually call AWS APIs
//!
//! These tests are marked `#[ignore]` and only run with:
//! ```
//! AWS_PROFILE=your_profile cargo test --test aws_ssm_integration -- --ignored
//! ```

use futures::future::join_all;
use hyperdrive_handlers::SequenceStore;
use hyperdrive_handlers::aws::{AwsContext, FromAwsContext, SsmClient};
use hyperdrive_handlers::config::{AwsConfig, SequenceConfig};
use hyperdrive_handlers::sequence::parameter_name;
use hyperdrive_test_utils::{get_test_region, test_sequence_name};
use std::collections::BTreeSet;
use std::time::Duration;

async fn store() -> SequenceStore<SsmClient> {
    let config = AwsConfig {
        region: Some(get_test_region()),
        ..Default::default()
    };
    let ctx = AwsContext::load(&config).await;
    SequenceStore::new(
        SsmClient::from_context(&ctx),
        SequenceConfig {
            max_attempts: 120,
            retry_interval: Duration::from_millis(500),
        },
    )
}

/// Create a sequence, draw from it concurrently and delete it
#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn test_sequence_lifecycle() {
    let store = store().await;
    let name = parameter_name(&test_sequence_name()).expect("test names start with /");

    let initial = store.create(&name, "10").await.expect("Should create sequence");
    assert_eq!(initial, 10);

    let results = join_all((0..4).map(|_| store.next(&name))).await;
    let drawn: BTreeSet<u64> = results
        .into_iter()
        .map(|r| r.expect("Should draw a value"))
        .collect();
    assert_eq!(drawn, (10..14).collect());

    store.delete(&name).await.expect("Should delete sequence");
    // Deleting twice succeeds
    store.delete(&name).await.expect("Should ignore missing sequence");
}
