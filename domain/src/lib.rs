//! Domain library for the URL Shortener.
//!
//! Holds the domain types, ports (traits), and error definitions, plus the two
//! pieces of core logic: the code deriver (`code`) and the mapping gateway
//! (`service`). Keep adapters and IO concerns out of this crate; the only
//! store that lives here is the in-memory one used by tests and demos.

use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

/// A URL-safe short code identifying a mapping.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ShortCode(String);

impl ShortCode {
    pub fn new<S: Into<String>>(s: S) -> Result<Self, CoreError> {
        let val = s.into();
        if val.is_empty() {
            return Err(CoreError::InvalidCode("empty".into()));
        }
        if !val
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidCode("invalid characters".into()));
        }
        Ok(Self(val))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored mapping from a short code to its target URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mapping {
    pub short_code: ShortCode,
    pub target_url: String,
    /// Set once at creation; persisted as unix seconds.
    pub created_at: SystemTime,
    /// Number of successful resolves. Only ever increases.
    pub clicks: u64,
}

impl Mapping {
    /// A freshly created mapping with a zero click counter.
    pub fn new(short_code: ShortCode, target_url: String, created_at: SystemTime) -> Self {
        Self {
            short_code,
            target_url,
            created_at,
            clicks: 0,
        }
    }

    pub fn view(&self) -> MappingView {
        MappingView {
            short_code: self.short_code.clone(),
            target_url: self.target_url.clone(),
        }
    }
}

/// The public part of a mapping returned to callers of create.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MappingView {
    pub short_code: ShortCode,
    pub target_url: String,
}

/// Result of a conditional write against the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    /// A record with the same short code was already present; nothing was written.
    AlreadyExists,
}

/// Result of `MappingGateway::create_mapping`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    /// This call won the conditional write.
    Created(Mapping),
    /// The code was already stored. `target_url` echoes the caller's input.
    AlreadyExists {
        short_code: ShortCode,
        target_url: String,
    },
}

impl CreateOutcome {
    pub fn short_code(&self) -> &ShortCode {
        match self {
            CreateOutcome::Created(m) => &m.short_code,
            CreateOutcome::AlreadyExists { short_code, .. } => short_code,
        }
    }

    pub fn target_url(&self) -> &str {
        match self {
            CreateOutcome::Created(m) => &m.target_url,
            CreateOutcome::AlreadyExists { target_url, .. } => target_url,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }

    pub fn view(&self) -> MappingView {
        MappingView {
            short_code: self.short_code().clone(),
            target_url: self.target_url().to_string(),
        }
    }
}

/// Where a resolved short code should send the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectTarget {
    pub short_code: ShortCode,
    pub location: String,
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall-clock implementation of [`Clock`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Maps a target URL to its short code. Implementations must be pure.
pub trait CodeDeriver: Send + Sync {
    fn derive(&self, url: &str) -> ShortCode;
}

/// Name of the counter attribute bumped on every resolve.
pub const CLICKS_FIELD: &str = "clicks";

/// Store port for persisting and loading mappings.
///
/// All coordination between concurrent callers is delegated to the atomic
/// primitives behind these methods; callers hold no lock of their own.
pub trait MappingStore: Send + Sync {
    /// Write `mapping` only if no record exists for its short code.
    fn put_if_absent(&self, mapping: &Mapping) -> Result<PutOutcome, CoreError>;
    fn get(&self, code: &ShortCode) -> Result<Option<Mapping>, CoreError>;
    /// Atomically add `delta` to `field`, treating an absent field as `default`.
    /// Returns `NotFound` when the record itself does not exist.
    fn increment_counter(
        &self,
        code: &ShortCode,
        field: &str,
        delta: u64,
        default: u64,
    ) -> Result<(), CoreError>;
}

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("missing short code")]
    MissingCode,
    #[error("invalid short code: {0}")]
    InvalidCode(String),
    #[error("not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - domain library loaded", pkg, ver)
}

pub mod adapters;
pub mod code;
pub mod service;
pub mod validate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_code_accepts_url_safe_values() {
        let c = ShortCode::new("EAaArVRs").expect("valid code");
        assert_eq!(c.as_str(), "EAaArVRs");
        assert!(ShortCode::new("-ri17Yzx").is_ok());
        assert!(ShortCode::new("a_b").is_ok());
    }

    #[test]
    fn short_code_rejects_empty_and_bad_chars() {
        assert!(matches!(ShortCode::new(""), Err(CoreError::InvalidCode(_))));
        assert!(matches!(
            ShortCode::new("abc=="),
            Err(CoreError::InvalidCode(_))
        ));
        assert!(matches!(
            ShortCode::new("a/b"),
            Err(CoreError::InvalidCode(_))
        ));
    }

    #[test]
    fn new_mapping_starts_with_zero_clicks() {
        let m = Mapping::new(
            ShortCode::new("abc").unwrap(),
            "https://example.com".into(),
            SystemTime::UNIX_EPOCH,
        );
        assert_eq!(m.clicks, 0);
        assert_eq!(m.view().target_url, "https://example.com");
    }

    #[test]
    fn create_outcome_accessors() {
        let code = ShortCode::new("abc").unwrap();
        let dup = CreateOutcome::AlreadyExists {
            short_code: code.clone(),
            target_url: "https://e".into(),
        };
        assert!(!dup.is_created());
        assert_eq!(dup.short_code(), &code);
        assert_eq!(dup.target_url(), "https://e");

        let created = CreateOutcome::Created(Mapping::new(
            code.clone(),
            "https://e".into(),
            SystemTime::UNIX_EPOCH,
        ));
        assert!(created.is_created());
        assert_eq!(created.view(), dup.view());
    }
}
