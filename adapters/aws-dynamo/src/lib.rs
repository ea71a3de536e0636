//! DynamoDB adapter implementing the `MappingStore` port.
//!
//! - Stores mappings in a single table with partition key `short_code`.
//! - Create is a conditional `PutItem` (`attribute_not_exists(short_code)`);
//!   a failed condition is reported as `PutOutcome::AlreadyExists`, not an error.
//! - Click counting uses `UpdateItem` with `if_not_exists(...) + :delta`, so
//!   concurrent increments are applied atomically by DynamoDB.
//! - Provides `from_env()` wiring for Lambda/apps using the `TABLE_NAME` env var.
//!
//! Notes:
//! - The domain `MappingStore` trait is synchronous. We bridge to the async AWS
//!   SDK using `block_on`, either on an owned runtime or the current one.

use aws_sdk_dynamodb::{types::AttributeValue, Client};
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use domain::{CoreError, Mapping, MappingStore, PutOutcome, ShortCode};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

const KEY_ATTR: &str = "short_code";
const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";

/// Store backed by AWS DynamoDB.
///
/// Supports both standalone mode (creates its own Tokio runtime) and Lambda mode
/// (reuses the existing runtime via `Handle::current()`).
#[derive(Clone)]
pub struct DynamoStore {
    table: String,
    client: Client,
    // Optional runtime - None when running inside Lambda (reuses existing runtime)
    rt: Option<std::sync::Arc<tokio::runtime::Runtime>>,
}

impl DynamoStore {
    /// Create a new store from an explicit table name and an AWS SDK client.
    ///
    /// If called from within a Tokio runtime (e.g., Lambda), reuses the existing runtime.
    /// Otherwise creates a new runtime.
    pub fn with_client(table: impl Into<String>, client: Client) -> Result<Self, CoreError> {
        let rt = Self::maybe_create_runtime()?;
        Ok(Self {
            table: table.into(),
            client,
            rt,
        })
    }

    /// Construct with a table name but create a default AWS SDK client using env/IMDS.
    pub fn new(table: impl Into<String>) -> Result<Self, CoreError> {
        let rt = Self::maybe_create_runtime()?;
        let conf = Self::block_on_with_rt(&rt, aws_config::load_from_env());
        let client = Client::new(&conf);
        Ok(Self {
            table: table.into(),
            client,
            rt,
        })
    }

    /// Construct from the `TABLE_NAME` environment variable.
    pub fn from_env() -> Result<Self, CoreError> {
        let table = table_name_from_env()?;
        Self::new(table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Check if we're inside a Tokio runtime. If yes, return None (reuse existing).
    /// If no, create a new runtime.
    fn maybe_create_runtime() -> Result<Option<std::sync::Arc<tokio::runtime::Runtime>>, CoreError>
    {
        if tokio::runtime::Handle::try_current().is_ok() {
            Ok(None)
        } else {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .map_err(|e| CoreError::Storage(format!("tokio runtime init: {e}")))?;
            Ok(Some(std::sync::Arc::new(rt)))
        }
    }

    /// Run an async future, using either our owned runtime or the current runtime.
    fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        Self::block_on_with_rt(&self.rt, fut)
    }

    fn block_on_with_rt<F: std::future::Future>(
        rt: &Option<std::sync::Arc<tokio::runtime::Runtime>>,
        fut: F,
    ) -> F::Output {
        match rt {
            Some(rt) => rt.block_on(fut),
            None => {
                // Requires the multi-threaded runtime, which `#[tokio::main]` provides.
                tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
            }
        }
    }
}

/// Read the table name from `TABLE_NAME`.
pub fn table_name_from_env() -> Result<String, CoreError> {
    std::env::var("TABLE_NAME")
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::Storage("missing TABLE_NAME".into()))
}

impl MappingStore for DynamoStore {
    fn put_if_absent(&self, mapping: &Mapping) -> Result<PutOutcome, CoreError> {
        let table = self.table.clone();
        let item = domain_to_item(mapping);
        let fut = async {
            self.client
                .put_item()
                .table_name(table)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(#k)")
                .expression_attribute_names("#k", KEY_ATTR)
                .send()
                .await
        };
        match self.block_on(fut) {
            Ok(_) => Ok(PutOutcome::Inserted),
            Err(e) => match e.as_service_error() {
                Some(se) if se.code() == Some(CONDITIONAL_CHECK_FAILED) => {
                    tracing::debug!(code = %mapping.short_code, "conditional put lost");
                    Ok(PutOutcome::AlreadyExists)
                }
                _ => Err(map_sdk_err(e)),
            },
        }
    }

    fn get(&self, code: &ShortCode) -> Result<Option<Mapping>, CoreError> {
        let table = self.table.clone();
        let key = code.as_str().to_string();
        let fut = async {
            self.client
                .get_item()
                .table_name(table)
                .key(KEY_ATTR, AttributeValue::S(key))
                .send()
                .await
        };
        let out = self.block_on(fut).map_err(map_sdk_err)?;
        match out.item() {
            Some(item) => Ok(Some(item_to_domain(item)?)),
            None => Ok(None),
        }
    }

    fn increment_counter(
        &self,
        code: &ShortCode,
        field: &str,
        delta: u64,
        default: u64,
    ) -> Result<(), CoreError> {
        let table = self.table.clone();
        let key = code.as_str().to_string();
        let field = field.to_string();

        let fut = async {
            self.client
                .update_item()
                .table_name(table)
                .key(KEY_ATTR, AttributeValue::S(key))
                .update_expression("SET #f = if_not_exists(#f, :default) + :delta")
                .expression_attribute_names("#f", field)
                .expression_attribute_names("#k", KEY_ATTR)
                .expression_attribute_values(":default", AttributeValue::N(default.to_string()))
                .expression_attribute_values(":delta", AttributeValue::N(delta.to_string()))
                // UpdateItem upserts; never let a counter bump create a partial record
                .condition_expression("attribute_exists(#k)")
                .send()
                .await
        };
        self.block_on(fut).map_err(|e| match e.as_service_error() {
            Some(se) if se.code() == Some(CONDITIONAL_CHECK_FAILED) => CoreError::NotFound,
            _ => map_sdk_err(e),
        })?;
        Ok(())
    }
}

fn map_sdk_err<E: ProvideErrorMetadata + std::fmt::Display>(e: E) -> CoreError {
    if let Some(code) = e.code() {
        if code == "ResourceNotFoundException" {
            return CoreError::Storage("missing table".into());
        }
    }
    CoreError::Storage(format!("dynamo error: {e}"))
}

fn system_time_to_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn secs_to_system_time(secs: u64) -> SystemTime {
    UNIX_EPOCH + std::time::Duration::from_secs(secs)
}

fn domain_to_item(mapping: &Mapping) -> HashMap<String, AttributeValue> {
    let mut m = HashMap::new();
    m.insert(
        KEY_ATTR.into(),
        AttributeValue::S(mapping.short_code.as_str().to_string()),
    );
    m.insert(
        "target_url".into(),
        AttributeValue::S(mapping.target_url.clone()),
    );
    m.insert(
        "created_at".into(),
        AttributeValue::N(system_time_to_secs(mapping.created_at).to_string()),
    );
    m.insert(
        "clicks".into(),
        AttributeValue::N(mapping.clicks.to_string()),
    );
    m
}

fn item_to_domain(item: &HashMap<String, AttributeValue>) -> Result<Mapping, CoreError> {
    let code = item
        .get(KEY_ATTR)
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| CoreError::Storage("item missing short_code".into()))?;
    let target_url = item
        .get("target_url")
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| CoreError::Storage("item missing target_url".into()))?
        .to_string();
    let created_at = item
        .get("created_at")
        .and_then(|v| v.as_n().ok())
        .ok_or_else(|| CoreError::Storage("item missing created_at".into()))?;

    // Items written before the first resolve may lack the counter
    let clicks = item
        .get("clicks")
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    let short_code = ShortCode::new(code.to_string())
        .map_err(|e| CoreError::Storage(format!("bad short_code in item: {e}")))?;
    let created_at = created_at
        .parse::<u64>()
        .map(secs_to_system_time)
        .map_err(|e| CoreError::Storage(format!("bad created_at: {e}")))?;

    Ok(Mapping {
        short_code,
        target_url,
        created_at,
        clicks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mapping() -> Mapping {
        let mut m = Mapping::new(
            ShortCode::new("EAaArVRs").unwrap(),
            "https://example.com".into(),
            UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000),
        );
        m.clicks = 7;
        m
    }

    #[test]
    fn roundtrip_item_mapping() {
        let m = sample_mapping();
        let item = domain_to_item(&m);
        assert_eq!(
            item.get("short_code").and_then(|v| v.as_s().ok()).map(String::as_str),
            Some("EAaArVRs")
        );
        assert_eq!(
            item.get("created_at").and_then(|v| v.as_n().ok()).map(String::as_str),
            Some("1700000000")
        );
        let back = item_to_domain(&item).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn missing_clicks_reads_as_zero() {
        let mut item = domain_to_item(&sample_mapping());
        item.remove("clicks");
        let back = item_to_domain(&item).unwrap();
        assert_eq!(back.clicks, 0);
    }

    #[test]
    fn missing_required_attributes_are_storage_errors() {
        let mut item = domain_to_item(&sample_mapping());
        item.remove("target_url");
        assert!(matches!(item_to_domain(&item), Err(CoreError::Storage(_))));

        let mut item = domain_to_item(&sample_mapping());
        item.insert("created_at".into(), AttributeValue::N("soon".into()));
        assert!(matches!(item_to_domain(&item), Err(CoreError::Storage(_))));
    }

    #[test]
    fn table_name_requires_env() {
        std::env::remove_var("TABLE_NAME");
        assert!(matches!(table_name_from_env(), Err(CoreError::Storage(_))));
        std::env::set_var("TABLE_NAME", "mappings");
        assert_eq!(table_name_from_env().unwrap(), "mappings");
        std::env::remove_var("TABLE_NAME");
    }
}
