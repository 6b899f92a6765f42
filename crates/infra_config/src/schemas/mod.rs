//! Config schemas, one per resource family.

pub mod addons;
pub mod common;
pub mod credentials;
pub mod queue;
pub mod role;
pub mod table;

pub use addons::{AddOnConfig, AddOnsConfig, ResolveConflicts};
pub use common::RemovalPolicy;
pub use credentials::ObservabilityCredentials;
pub use queue::{DeadLetterQueue, QueueConfig, QueueEncryption};
pub use role::{AssumedBy, Effect, PolicyStatement, RoleConfig};
pub use table::{
    AttributeType, GlobalSecondaryIndex, KeyAttribute, OnDemandBilling, Projection,
    ProvisionedBilling, StreamViewType, TableConfig, TableEncryption,
};
