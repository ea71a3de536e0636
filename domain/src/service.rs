use tracing::{debug, info, warn};

use crate::validate::{validate_code_present, validate_target_url};
use crate::{
    Clock, CodeDeriver, CoreError, CreateOutcome, Mapping, MappingStore, PutOutcome,
    RedirectTarget, ShortCode, CLICKS_FIELD,
};

/// Application service implementing the create and resolve protocol.
///
/// Generic over store, code deriver, and clock. The store is the only shared
/// mutable resource; this type holds no state of its own and is safe to share
/// behind an `Arc` across any number of concurrent callers.
pub struct MappingGateway<S: MappingStore, D: CodeDeriver, C: Clock> {
    store: S,
    deriver: D,
    clock: C,
}

impl<S: MappingStore, D: CodeDeriver, C: Clock> MappingGateway<S, D, C> {
    pub fn new(store: S, deriver: D, clock: C) -> Self {
        Self {
            store,
            deriver,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Derive the code for `target_url` without touching the store.
    pub fn derive(&self, target_url: &str) -> ShortCode {
        self.deriver.derive(target_url)
    }

    /// Create the mapping for `target_url` unless one already exists for its code.
    ///
    /// Losing the conditional write is not an error: the caller gets
    /// `CreateOutcome::AlreadyExists` with the code re-derived from its own
    /// input. The stored record is not re-read.
    pub fn create_mapping(&self, target_url: &str) -> Result<CreateOutcome, CoreError> {
        validate_target_url(target_url)?;

        let code = self.deriver.derive(target_url);
        let mapping = Mapping::new(code, target_url.to_string(), self.clock.now());

        match self.store.put_if_absent(&mapping)? {
            PutOutcome::Inserted => {
                info!(code = %mapping.short_code, target_url = %mapping.target_url, "mapping created");
                Ok(CreateOutcome::Created(mapping))
            }
            PutOutcome::AlreadyExists => {
                info!(code = %mapping.short_code, "mapping already exists");
                Ok(CreateOutcome::AlreadyExists {
                    short_code: self.deriver.derive(target_url),
                    target_url: target_url.to_string(),
                })
            }
        }
    }

    /// Look up `code` and bump its click counter.
    ///
    /// The increment is best effort: its failure is logged and never changes
    /// the result.
    pub fn resolve(&self, code: &str) -> Result<RedirectTarget, CoreError> {
        validate_code_present(code)?;

        // Anything outside the code alphabet can never have been stored.
        let code = match ShortCode::new(code) {
            Ok(c) => c,
            Err(e) => {
                debug!(code = %code, err = %e, "unparseable code");
                return Err(CoreError::NotFound);
            }
        };

        let mapping = self.store.get(&code)?.ok_or(CoreError::NotFound)?;

        if let Err(e) = self.store.increment_counter(&code, CLICKS_FIELD, 1, 0) {
            warn!(code = %code, err = %e, "click increment failed");
        }

        info!(code = %code, redirect_to = %mapping.target_url, "resolve ok");
        Ok(RedirectTarget {
            short_code: code,
            location: mapping.target_url,
        })
    }

    /// Read a mapping without side effects.
    pub fn get(&self, code: &ShortCode) -> Result<Option<Mapping>, CoreError> {
        self.store.get(code)
    }
}
