//! hyperdrive: CloudFormation custom resource handlers
//!
//! Reads one lifecycle event, reconciles it against AWS and prints the
//! response document on stdout. Logs go to stderr.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use hyperdrive_common::defaults::{
    DEFAULT_CERTIFICATE_MAX_ATTEMPTS, DEFAULT_SEQUENCE_MAX_ATTEMPTS,
};
use hyperdrive_common::{ResourceEvent, ResourceKind, evaluate};
use hyperdrive_handlers::aws::{AwsContext, FromAwsContext, SsmClient};
use hyperdrive_handlers::config::{AwsConfig, HandlerConfig, PollConfig, ResponseConfig, SequenceConfig};
use hyperdrive_handlers::response::{response_client, send_response};
use hyperdrive_handlers::{SequenceStore, resources};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::AsyncReadExt;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hyperdrive")]
#[command(about = "CloudFormation custom resources backed by AWS APIs")]
#[command(version)]
struct Args {
    /// Default AWS region for resources without a Region property
    #[arg(long, global = true, env = "HYPERDRIVE_REGION")]
    region: Option<String>,

    /// AWS profile to use
    #[arg(long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// Custom AWS endpoint, e.g. a local emulator
    #[arg(long, global = true, env = "HYPERDRIVE_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Attempts to draw a sequence value before giving up
    #[arg(long, global = true, default_value_t = DEFAULT_SEQUENCE_MAX_ATTEMPTS)]
    sequence_attempts: u32,

    /// Polls for certificate validation records before giving up
    #[arg(long, global = true, default_value_t = DEFAULT_CERTIFICATE_MAX_ATTEMPTS)]
    certificate_attempts: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile one lifecycle event and print the response document
    Handle {
        /// Handler name (seq, seqval, dnscert, loggrp, s3cleanup, ecrcleanup)
        /// or resource type; defaults to the event's ResourceType
        kind: Option<ResourceKind>,

        /// Event JSON file, `-` for stdin
        #[arg(long, default_value = "-")]
        event: PathBuf,

        /// Also upload the response document to the event's ResponseURL
        #[arg(long)]
        send_response: bool,
    },

    /// Draw the next value of a sequence
    Draw {
        /// Full parameter name, e.g. /hyperdrive/sequence/build
        parameter: String,
    },

    /// Evaluate a sequence value expression
    Eval {
        expression: String,
        #[arg(allow_negative_numbers = true)]
        x: i64,
    },
}

impl From<&Args> for HandlerConfig {
    fn from(args: &Args) -> Self {
        let send = matches!(
            args.command,
            Command::Handle {
                send_response: true,
                ..
            }
        );
        Self {
            aws: AwsConfig {
                region: args.region.clone(),
                profile: args.profile.clone(),
                endpoint_url: args.endpoint_url.clone(),
            },
            sequence: SequenceConfig {
                max_attempts: args.sequence_attempts,
                ..Default::default()
            },
            certificate: PollConfig {
                max_attempts: args.certificate_attempts,
                ..Default::default()
            },
            response: ResponseConfig {
                send,
                ..Default::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = HandlerConfig::from(&args);

    match args.command {
        Command::Handle { kind, event, .. } => handle(kind, &event, &config).await,
        Command::Draw { parameter } => {
            let ctx = AwsContext::load(&config.aws).await;
            let store = SequenceStore::new(SsmClient::from_context(&ctx), config.sequence);
            let value = store.next(&parameter).await?;
            println!("{value}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Eval { expression, x } => {
            println!("{}", evaluate(&expression, x)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn handle(kind: Option<ResourceKind>, path: &Path, config: &HandlerConfig) -> Result<ExitCode> {
    let event = read_event(path).await?;
    let kind = match kind {
        Some(kind) => kind,
        None => event
            .resource_type
            .parse()
            .map_err(anyhow::Error::msg)
            .context("event has no handler, pass one explicitly")?,
    };

    let ctx = AwsContext::load(&config.aws).await;
    let outcome = resources::handle(kind, &event, &ctx, config).await;
    let success = outcome.is_success();
    let response = outcome.into_response(&event);

    println!("{}", serde_json::to_string_pretty(&response)?);

    if config.response.send {
        if event.response_url.is_empty() {
            bail!("event has no ResponseURL to send the response to");
        }
        let client = response_client(config.response.timeout)?;
        send_response(&client, &event.response_url, &response).await?;
    }

    info!(kind = %kind, success, "Handled event");
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

/// Read and decode an event from a file, or stdin for `-`
async fn read_event(path: &Path) -> Result<ResourceEvent> {
    let raw = if path.as_os_str() == "-" {
        let mut raw = String::new();
        tokio::io::stdin()
            .read_to_string(&mut raw)
            .await
            .context("Failed to read event from stdin")?;
        raw
    } else {
        tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read event file {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Failed to decode event")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_handler_config_from_args() {
        let args = Args::parse_from([
            "hyperdrive",
            "--region",
            "eu-west-1",
            "--sequence-attempts",
            "5",
            "handle",
            "seq",
            "--send-response",
        ]);
        let config = HandlerConfig::from(&args);

        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.sequence.max_attempts, 5);
        assert_eq!(config.certificate.max_attempts, DEFAULT_CERTIFICATE_MAX_ATTEMPTS);
        assert!(config.response.send);
        assert!(matches!(
            args.command,
            Command::Handle {
                kind: Some(ResourceKind::SequenceGenerator),
                ..
            }
        ));
    }

    #[test]
    fn test_resource_type_as_kind() {
        let args = Args::parse_from(["hyperdrive", "handle", "Custom::LogGroup"]);
        assert!(matches!(
            args.command,
            Command::Handle {
                kind: Some(ResourceKind::LogGroup),
                send_response: false,
                ..
            }
        ));
        assert!(Args::try_parse_from(["hyperdrive", "handle", "Custom::Dummy"]).is_err());
    }

    #[tokio::test]
    async fn test_read_event_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"RequestType":"Create","LogicalResourceId":"Seq","StackId":"stack","ResourceType":"Custom::SequenceGenerator"}}"#
        )
        .unwrap();

        let event = read_event(file.path()).await.unwrap();
        assert_eq!(event.logical_resource_id, "Seq");
        assert_eq!(
            event.resource_type.parse::<ResourceKind>(),
            Ok(ResourceKind::SequenceGenerator)
        );
    }

    #[tokio::test]
    async fn test_read_event_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_event(&dir.path().join("missing.json")).await.unwrap_err();
        assert!(format!("{err:#}").contains("missing.json"));
    }
}
