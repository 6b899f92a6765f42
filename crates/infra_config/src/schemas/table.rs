//! Table (DynamoDB) configuration.

use serde::{Deserialize, Serialize};

use super::common::{check_kms_key, RemovalPolicy};
use crate::mapper::ConfigSchema;
use crate::validator::{compile, Pattern, SchemaValidator, ViolationRule};

static TABLE_NAME_PATTERN: Pattern = Pattern::new(|| compile(r"^[A-Za-z0-9_.-]{3,255}$"));
static INDEX_NAME_PATTERN: Pattern = Pattern::new(|| compile(r"^[A-Za-z0-9_.-]{3,255}$"));

/// Key attribute type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    #[serde(rename = "S")]
    String,
    #[serde(rename = "N")]
    Number,
    #[serde(rename = "B")]
    Binary,
}

impl AttributeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::Number => "N",
            AttributeType::Binary => "B",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct KeyAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
}

/// Pay-per-request billing, with optional throughput ceilings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OnDemandBilling {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_read_request_units: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_write_request_units: Option<u64>,
}

/// Fixed provisioned capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProvisionedBilling {
    pub read_capacity: u64,
    pub write_capacity: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TableEncryption {
    #[default]
    AwsOwned,
    AwsManaged,
    CustomerManaged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StreamViewType {
    KeysOnly,
    NewImage,
    OldImage,
    NewAndOldImages,
}

impl StreamViewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamViewType::KeysOnly => "KEYS_ONLY",
            StreamViewType::NewImage => "NEW_IMAGE",
            StreamViewType::OldImage => "OLD_IMAGE",
            StreamViewType::NewAndOldImages => "NEW_AND_OLD_IMAGES",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Projection {
    #[default]
    All,
    KeysOnly,
    Include,
}

impl Projection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Projection::All => "ALL",
            Projection::KeysOnly => "KEYS_ONLY",
            Projection::Include => "INCLUDE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GlobalSecondaryIndex {
    pub index_name: String,
    pub partition_key: KeyAttribute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<KeyAttribute>,
    #[serde(default)]
    pub projection: Projection,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_key_attributes: Vec<String>,
    /// Required when the table is provisioned, forbidden when on demand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned: Option<ProvisionedBilling>,
}

/// A table definition.
///
/// Billing is chosen by setting exactly one of `onDemand` or `provisioned`;
/// there is no default billing mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TableConfig {
    pub table_name: String,
    pub partition_key: KeyAttribute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<KeyAttribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_demand: Option<OnDemandBilling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned: Option<ProvisionedBilling>,
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
    #[serde(default)]
    pub encryption: TableEncryption,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamViewType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_live_attribute: Option<String>,
    #[serde(default)]
    pub point_in_time_recovery: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_secondary_indexes: Vec<GlobalSecondaryIndex>,
}

impl TableConfig {
    pub fn is_on_demand(&self) -> bool {
        self.on_demand.is_some()
    }
}

fn check_key(validator: &mut SchemaValidator, field: &str, key: &KeyAttribute) {
    validator.nested(field, |v| {
        v.required("name", &key.name);
    });
}

fn check_capacity(validator: &mut SchemaValidator, field: &str, billing: &ProvisionedBilling) {
    validator.nested(field, |v| {
        v.at_least("readCapacity", billing.read_capacity, 1);
        v.at_least("writeCapacity", billing.write_capacity, 1);
    });
}

impl ConfigSchema for TableConfig {
    const NAME: &'static str = "TableConfig";

    fn validate(&self, validator: &mut SchemaValidator) {
        validator.pattern(
            "tableName",
            &self.table_name,
            &TABLE_NAME_PATTERN,
            "3-255 letters, digits, '_', '-' or '.'",
        );
        check_key(validator, "partitionKey", &self.partition_key);
        if let Some(sort_key) = &self.sort_key {
            check_key(validator, "sortKey", sort_key);
        }

        validator.exactly_one(&[
            ("onDemand", self.on_demand.is_some()),
            ("provisioned", self.provisioned.is_some()),
        ]);
        if let Some(on_demand) = &self.on_demand {
            validator.nested("onDemand", |v| {
                if let Some(units) = on_demand.max_read_request_units {
                    v.at_least("maxReadRequestUnits", units, 1);
                }
                if let Some(units) = on_demand.max_write_request_units {
                    v.at_least("maxWriteRequestUnits", units, 1);
                }
            });
        }
        if let Some(provisioned) = &self.provisioned {
            check_capacity(validator, "provisioned", provisioned);
        }

        let customer_managed = self.encryption == TableEncryption::CustomerManaged;
        validator.dependent(
            "kmsKeyArn",
            self.kms_key_arn.is_some(),
            customer_managed,
            "encryption is customerManaged",
        );
        check_kms_key(validator, "kmsKeyArn", self.kms_key_arn.as_deref());

        if let Some(attribute) = &self.time_to_live_attribute {
            validator.required("timeToLiveAttribute", attribute);
        }

        let provisioned_table = self.provisioned.is_some();
        let mut seen = Vec::new();
        for (i, index) in self.global_secondary_indexes.iter().enumerate() {
            validator.element("globalSecondaryIndexes", i, |v| {
                v.pattern("indexName", &index.index_name, &INDEX_NAME_PATTERN, "a valid index name");
                if seen.contains(&index.index_name.as_str()) {
                    v.add(
                        "indexName",
                        ViolationRule::Pattern,
                        format!("duplicate index name '{}'", index.index_name),
                    );
                }
                check_key(v, "partitionKey", &index.partition_key);
                if let Some(sort_key) = &index.sort_key {
                    check_key(v, "sortKey", sort_key);
                }
                v.dependent(
                    "nonKeyAttributes",
                    !index.non_key_attributes.is_empty(),
                    index.projection == Projection::Include,
                    "projection is include",
                );
                v.dependent(
                    "provisioned",
                    index.provisioned.is_some(),
                    provisioned_table,
                    "the table uses provisioned billing",
                );
                if let Some(provisioned) = &index.provisioned {
                    check_capacity(v, "provisioned", provisioned);
                }
            });
            seen.push(index.index_name.as_str());
        }
    }
}
