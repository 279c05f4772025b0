//! Custom resource types served by hyperdrive

use std::fmt;
use std::str::FromStr;

/// The custom resources hyperdrive knows how to reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Counter stored in an SSM parameter
    SequenceGenerator,
    /// A value drawn from a sequence
    SequenceValue,
    /// ACM certificate validated through DNS
    DnsCertificate,
    /// CloudWatch log group in an arbitrary region
    LogGroup,
    /// Empties a bucket (prefix) when its stack is deleted
    S3Cleanup,
    /// Empties an ECR repository when its stack is deleted
    EcrCleanup,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::SequenceGenerator,
        ResourceKind::SequenceValue,
        ResourceKind::DnsCertificate,
        ResourceKind::LogGroup,
        ResourceKind::S3Cleanup,
        ResourceKind::EcrCleanup,
    ];

    /// Short handler name, as used on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::SequenceGenerator => "seq",
            ResourceKind::SequenceValue => "seqval",
            ResourceKind::DnsCertificate => "dnscert",
            ResourceKind::LogGroup => "loggrp",
            ResourceKind::S3Cleanup => "s3cleanup",
            ResourceKind::EcrCleanup => "ecrcleanup",
        }
    }

    /// CloudFormation resource type
    pub fn resource_type(self) -> &'static str {
        match self {
            ResourceKind::SequenceGenerator => "Custom::SequenceGenerator",
            ResourceKind::SequenceValue => "Custom::SequenceValue",
            ResourceKind::DnsCertificate => "Custom::DnsCertificate",
            ResourceKind::LogGroup => "Custom::LogGroup",
            ResourceKind::S3Cleanup => "Custom::S3Cleanup",
            ResourceKind::EcrCleanup => "Custom::EcrCleanup",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    /// Accepts either the short name or the CloudFormation resource type
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s || kind.resource_type() == s)
            .ok_or_else(|| format!("unknown resource kind: {s}"))
    }
}
