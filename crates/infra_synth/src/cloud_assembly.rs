//! Adapter that writes units into a CloudFormation template.

use std::collections::BTreeMap;

use infra_config::{
    AddOnsConfig, QueueConfig, QueueEncryption, ResourceConfig, RoleConfig, TableConfig,
    TableEncryption,
};
use infra_core::{AccountContext, AdapterError, ProvisioningAdapter, ProvisioningUnit, ResourceHandle};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

/// CloudFormation caps logical ids at 255 characters.
const MAX_LOGICAL_ID_PREFIX: usize = 240;

/// Handle attribute listing every logical id a unit produced.
pub const RESOURCES_ATTRIBUTE: &str = "resources";

/// Collects one CloudFormation resource (or several, for add-on bundles)
/// per provisioned unit.
#[derive(Debug)]
pub struct CloudAssemblyAdapter {
    account: AccountContext,
    stack: String,
    resources: Map<String, Value>,
    skipped: Vec<String>,
}

impl CloudAssemblyAdapter {
    /// Adapter name recorded in synthesis logs.
    pub const NAME: &'static str = "cloud-assembly";

    pub fn new(account: AccountContext, stack: &str) -> Self {
        Self {
            account,
            stack: stack.to_string(),
            resources: Map::new(),
            skipped: Vec::new(),
        }
    }

    /// Record a unit left out of the template.
    pub fn note_skipped(&mut self, id: &str) {
        self.skipped.push(id.to_string());
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Logical id for a construct path: its alphanumeric characters plus a
    /// short hash of the full path, so `a-b` and `ab` never meet.
    pub fn logical_id(path: &str) -> String {
        let mut id: String = path
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(MAX_LOGICAL_ID_PREFIX)
            .collect();
        id.push_str(&short_hash(path));
        id
    }

    /// The template built so far.
    pub fn template(&self) -> Value {
        let mut template = json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Description": format!(
                "{} ({}/{})",
                self.stack, self.account.account, self.account.region
            ),
            "Resources": Value::Object(self.resources.clone()),
        });
        if !self.skipped.is_empty() {
            template["Metadata"] = json!({ "SkippedUnits": self.skipped });
        }
        template
    }

    fn insert(&mut self, logical_id: &str, resource_type: &str, properties: Value, depends_on: &[String]) {
        let mut resource = json!({
            "Type": resource_type,
            "Properties": properties,
        });
        if !depends_on.is_empty() {
            resource["DependsOn"] = json!(depends_on);
        }
        self.resources.insert(logical_id.to_string(), resource);
    }

    fn insert_with_policy(
        &mut self,
        logical_id: &str,
        resource_type: &str,
        properties: Value,
        depends_on: &[String],
        deletion_policy: &str,
    ) {
        self.insert(logical_id, resource_type, properties, depends_on);
        if let Some(resource) = self.resources.get_mut(logical_id) {
            resource["DeletionPolicy"] = json!(deletion_policy);
            resource["UpdateReplacePolicy"] = json!(deletion_policy);
        }
    }

    fn queue_properties(&self, queue: &QueueConfig) -> Value {
        let mut properties = json!({
            "QueueName": queue.queue_name,
            "VisibilityTimeout": queue.visibility_timeout_seconds,
            "MessageRetentionPeriod": queue.retention_period_seconds,
            "DelaySeconds": queue.delivery_delay_seconds,
            "ReceiveMessageWaitTimeSeconds": queue.receive_wait_time_seconds,
        });
        if queue.fifo {
            properties["FifoQueue"] = json!(true);
            properties["ContentBasedDeduplication"] = json!(queue.content_based_deduplication);
        }
        match queue.encryption {
            QueueEncryption::SqsManaged => properties["SqsManagedSseEnabled"] = json!(true),
            QueueEncryption::Kms => {
                properties["KmsMasterKeyId"] = json!(queue.kms_key_id.as_deref().unwrap_or("alias/aws/sqs"))
            }
            QueueEncryption::None => properties["SqsManagedSseEnabled"] = json!(false),
        }
        if let Some(dlq) = &queue.dead_letter_queue {
            properties["RedrivePolicy"] = json!({
                "deadLetterTargetArn": self.account.arn("sqs", &dlq.queue_name),
                "maxReceiveCount": dlq.max_receive_count,
            });
        }
        properties
    }

    fn provision_addons(&mut self, path: &str, fallback_cluster: &str, addons: &AddOnsConfig, depends_on: &[String]) -> Vec<String> {
        let cluster = addons.cluster_name.as_deref().unwrap_or(fallback_cluster);
        let mut ids = Vec::new();
        for (field, name, addon) in addons.entries() {
            let logical_id = Self::logical_id(&format!("{}/{}", path, field));
            let mut properties = json!({
                "ClusterName": cluster,
                "AddonName": name,
                "AddonVersion": addon.version,
                "ResolveConflicts": addon.resolve_conflicts.as_str(),
                "PreserveOnDelete": addon.preserve_on_delete,
            });
            if let Some(arn) = &addon.service_account_role_arn {
                properties["ServiceAccountRoleArn"] = json!(arn);
            }
            if let Some(values) = &addon.configuration_values {
                properties["ConfigurationValues"] = json!(values.to_string());
            }
            self.insert(&logical_id, "AWS::EKS::Addon", properties, depends_on);
            ids.push(logical_id);
        }
        ids
    }
}

impl ProvisioningAdapter<ResourceConfig> for CloudAssemblyAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn provision(
        &mut self,
        unit: &ProvisioningUnit<ResourceConfig>,
        predecessors: &[&ProvisioningUnit<ResourceConfig>],
    ) -> Result<ResourceHandle, AdapterError> {
        let identity = unit.identity();
        let path = identity.path();
        let depends_on = depends_on(predecessors)?;
        let logical_id = Self::logical_id(&path);

        let (resource_type, ids) = match unit.config() {
            ResourceConfig::Table(table) => {
                let policy = table.removal_policy.deletion_policy();
                self.insert_with_policy(&logical_id, "AWS::DynamoDB::Table", table_properties(table), &depends_on, policy);
                ("AWS::DynamoDB::Table", vec![logical_id.clone()])
            }
            ResourceConfig::Queue(queue) => {
                let policy = queue.removal_policy.deletion_policy();
                let properties = self.queue_properties(queue);
                self.insert_with_policy(&logical_id, "AWS::SQS::Queue", properties, &depends_on, policy);
                ("AWS::SQS::Queue", vec![logical_id.clone()])
            }
            ResourceConfig::Role(role) => {
                self.insert(&logical_id, "AWS::IAM::Role", role_properties(role), &depends_on);
                ("AWS::IAM::Role", vec![logical_id.clone()])
            }
            ResourceConfig::EksAddOns(addons) => {
                let ids = self.provision_addons(&path, &identity.name, addons, &depends_on);
                ("AWS::EKS::Addon", ids)
            }
        };

        debug!("Wrote {} as {} ({} resources)", path, resource_type, ids.len());
        Ok(ResourceHandle::new(logical_id, resource_type).with_attribute(RESOURCES_ATTRIBUTE, ids.join(",")))
    }
}

/// Logical ids every resource of `predecessors` produced.
fn depends_on(predecessors: &[&ProvisioningUnit<ResourceConfig>]) -> Result<Vec<String>, AdapterError> {
    let mut ids = Vec::new();
    for predecessor in predecessors {
        let handle = predecessor
            .handle()
            .ok_or_else(|| format!("predecessor {} has not been provisioned", predecessor.identity().path()))?;
        match handle.attributes.get(RESOURCES_ATTRIBUTE) {
            Some(resources) => ids.extend(resources.split(',').filter(|id| !id.is_empty()).map(String::from)),
            None => ids.push(handle.logical_id.clone()),
        }
    }
    Ok(ids)
}

fn table_properties(table: &TableConfig) -> Value {
    let mut attributes: BTreeMap<&str, &str> = BTreeMap::new();
    let mut key_schema = vec![json!({"AttributeName": table.partition_key.name, "KeyType": "HASH"})];
    attributes.insert(&table.partition_key.name, table.partition_key.attribute_type.as_str());
    if let Some(sort) = &table.sort_key {
        key_schema.push(json!({"AttributeName": sort.name, "KeyType": "RANGE"}));
        attributes.insert(&sort.name, sort.attribute_type.as_str());
    }

    let mut indexes = Vec::new();
    for index in &table.global_secondary_indexes {
        attributes.insert(&index.partition_key.name, index.partition_key.attribute_type.as_str());
        let mut index_keys = vec![json!({"AttributeName": index.partition_key.name, "KeyType": "HASH"})];
        if let Some(sort) = &index.sort_key {
            attributes.insert(&sort.name, sort.attribute_type.as_str());
            index_keys.push(json!({"AttributeName": sort.name, "KeyType": "RANGE"}));
        }
        let mut projection = json!({"ProjectionType": index.projection.as_str()});
        if !index.non_key_attributes.is_empty() {
            projection["NonKeyAttributes"] = json!(index.non_key_attributes);
        }
        let mut entry = json!({
            "IndexName": index.index_name,
            "KeySchema": index_keys,
            "Projection": projection,
        });
        if let Some(capacity) = &index.provisioned {
            entry["ProvisionedThroughput"] = json!({
                "ReadCapacityUnits": capacity.read_capacity,
                "WriteCapacityUnits": capacity.write_capacity,
            });
        }
        indexes.push(entry);
    }

    let definitions: Vec<Value> = attributes
        .into_iter()
        .map(|(name, attribute_type)| json!({"AttributeName": name, "AttributeType": attribute_type}))
        .collect();

    let mut properties = json!({
        "TableName": table.table_name,
        "KeySchema": key_schema,
        "AttributeDefinitions": definitions,
        "PointInTimeRecoverySpecification": {
            "PointInTimeRecoveryEnabled": table.point_in_time_recovery,
        },
    });
    if !indexes.is_empty() {
        properties["GlobalSecondaryIndexes"] = json!(indexes);
    }

    match (&table.on_demand, &table.provisioned) {
        (_, Some(capacity)) => {
            properties["BillingMode"] = json!("PROVISIONED");
            properties["ProvisionedThroughput"] = json!({
                "ReadCapacityUnits": capacity.read_capacity,
                "WriteCapacityUnits": capacity.write_capacity,
            });
        }
        (Some(on_demand), None) => {
            properties["BillingMode"] = json!("PAY_PER_REQUEST");
            let mut throughput = Map::new();
            if let Some(units) = on_demand.max_read_request_units {
                throughput.insert("MaxReadRequestUnits".to_string(), json!(units));
            }
            if let Some(units) = on_demand.max_write_request_units {
                throughput.insert("MaxWriteRequestUnits".to_string(), json!(units));
            }
            if !throughput.is_empty() {
                properties["OnDemandThroughput"] = Value::Object(throughput);
            }
        }
        (None, None) => {}
    }

    match table.encryption {
        TableEncryption::AwsOwned => {}
        TableEncryption::AwsManaged => {
            properties["SSESpecification"] = json!({"SSEEnabled": true});
        }
        TableEncryption::CustomerManaged => {
            let mut sse = json!({"SSEEnabled": true, "SSEType": "KMS"});
            if let Some(key) = &table.kms_key_arn {
                sse["KMSMasterKeyId"] = json!(key);
            }
            properties["SSESpecification"] = sse;
        }
    }

    if let Some(stream) = table.stream {
        properties["StreamSpecification"] = json!({"StreamViewType": stream.as_str()});
    }
    if let Some(attribute) = &table.time_to_live_attribute {
        properties["TimeToLiveSpecification"] = json!({"AttributeName": attribute, "Enabled": true});
    }
    properties
}

fn role_properties(role: &RoleConfig) -> Value {
    let mut principal = Map::new();
    if let Some(service) = &role.assumed_by.service {
        principal.insert("Service".to_string(), json!(service));
    }
    if let Some(account) = &role.assumed_by.account_id {
        principal.insert("AWS".to_string(), json!(account));
    }
    if let Some(federated) = &role.assumed_by.federated {
        principal.insert("Federated".to_string(), json!(federated));
    }
    let action = if role.assumed_by.federated.is_some() {
        "sts:AssumeRoleWithWebIdentity"
    } else {
        "sts:AssumeRole"
    };

    let mut properties = json!({
        "RoleName": role.role_name,
        "AssumeRolePolicyDocument": {
            "Version": "2012-10-17",
            "Statement": [{"Effect": "Allow", "Principal": principal, "Action": action}],
        },
        "MaxSessionDuration": role.max_session_duration_seconds,
    });
    if let Some(description) = &role.description {
        properties["Description"] = json!(description);
    }
    if let Some(path) = &role.path {
        properties["Path"] = json!(path);
    }
    if !role.managed_policy_arns.is_empty() {
        properties["ManagedPolicyArns"] = json!(role.managed_policy_arns);
    }
    if !role.statements.is_empty() {
        let statements: Vec<Value> = role
            .statements
            .iter()
            .map(|statement| {
                let mut entry = json!({
                    "Effect": statement.effect,
                    "Action": statement.actions,
                    "Resource": statement.resources,
                });
                if let Some(sid) = &statement.sid {
                    entry["Sid"] = json!(sid);
                }
                entry
            })
            .collect();
        properties["Policies"] = json!([{
            "PolicyName": format!("{}-inline", role.role_name),
            "PolicyDocument": {"Version": "2012-10-17", "Statement": statements},
        }]);
    }
    properties
}

/// First 4 bytes of the SHA-256 of `s`, as upper-case hex.
fn short_hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    digest[..4].iter().map(|b| format!("{:02X}", b)).collect()
}
