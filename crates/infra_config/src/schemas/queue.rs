//! Queue (SQS) configuration.

use serde::{Deserialize, Serialize};

use super::common::{check_kms_key, RemovalPolicy};
use crate::mapper::ConfigSchema;
use crate::validator::{compile, Pattern, SchemaValidator, ViolationRule};

static QUEUE_NAME_PATTERN: Pattern = Pattern::new(|| compile(r"^[A-Za-z0-9_-]{1,80}(\.fifo)?$"));
const FIFO_SUFFIX: &str = ".fifo";

pub const MAX_VISIBILITY_TIMEOUT: u32 = 43_200;
pub const MIN_RETENTION_PERIOD: u32 = 60;
pub const MAX_RETENTION_PERIOD: u32 = 1_209_600;
pub const MAX_DELIVERY_DELAY: u32 = 900;
pub const MAX_RECEIVE_WAIT: u32 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueueEncryption {
    #[default]
    SqsManaged,
    Kms,
    None,
}

/// Where messages go after too many failed receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DeadLetterQueue {
    pub queue_name: String,
    pub max_receive_count: u32,
}

fn default_visibility_timeout() -> u32 {
    30
}

fn default_retention_period() -> u32 {
    345_600
}

/// A queue definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueueConfig {
    pub queue_name: String,
    #[serde(default)]
    pub fifo: bool,
    #[serde(default)]
    pub content_based_deduplication: bool,
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_seconds: u32,
    #[serde(default = "default_retention_period")]
    pub retention_period_seconds: u32,
    #[serde(default)]
    pub delivery_delay_seconds: u32,
    #[serde(default)]
    pub receive_wait_time_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter_queue: Option<DeadLetterQueue>,
    #[serde(default)]
    pub encryption: QueueEncryption,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
}

impl ConfigSchema for QueueConfig {
    const NAME: &'static str = "QueueConfig";

    fn validate(&self, validator: &mut SchemaValidator) {
        validator.pattern(
            "queueName",
            &self.queue_name,
            &QUEUE_NAME_PATTERN,
            "1-80 letters, digits, '_' or '-' with an optional .fifo suffix",
        );
        let suffixed = self.queue_name.ends_with(FIFO_SUFFIX);
        if suffixed != self.fifo {
            validator.add(
                "queueName",
                ViolationRule::Dependent,
                if self.fifo {
                    "must end with .fifo when fifo is true"
                } else {
                    "may only end with .fifo when fifo is true"
                },
            );
        }
        if self.content_based_deduplication {
            validator.dependent("contentBasedDeduplication", true, self.fifo, "fifo is true");
        }

        validator.range(
            "visibilityTimeoutSeconds",
            self.visibility_timeout_seconds,
            0,
            MAX_VISIBILITY_TIMEOUT,
        );
        validator.range(
            "retentionPeriodSeconds",
            self.retention_period_seconds,
            MIN_RETENTION_PERIOD,
            MAX_RETENTION_PERIOD,
        );
        validator.range("deliveryDelaySeconds", self.delivery_delay_seconds, 0, MAX_DELIVERY_DELAY);
        validator.range("receiveWaitTimeSeconds", self.receive_wait_time_seconds, 0, MAX_RECEIVE_WAIT);

        if let Some(dlq) = &self.dead_letter_queue {
            validator.nested("deadLetterQueue", |v| {
                v.required("queueName", &dlq.queue_name);
                v.at_least("maxReceiveCount", dlq.max_receive_count, 1);
                if dlq.queue_name.ends_with(FIFO_SUFFIX) != self.fifo {
                    v.add(
                        "queueName",
                        ViolationRule::Dependent,
                        "must be a FIFO queue exactly when the source queue is",
                    );
                }
            });
        }

        validator.dependent(
            "kmsKeyId",
            self.kms_key_id.is_some(),
            self.encryption == QueueEncryption::Kms,
            "encryption is kms",
        );
        check_kms_key(validator, "kmsKeyId", self.kms_key_id.as_deref());
    }
}
