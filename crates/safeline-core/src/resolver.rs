//! Public site resolver
//!
//! Turns a scanned `(company_code, site_code)` pair into an active site
//! context. Callers outside the service only ever learn "available" or
//! "unavailable"; the reason is logged.

use crate::deadline::Deadline;
use crate::directory::Directory;
use crate::error::{LifecycleError, LifecycleResult};
use safeline_types::{SiteContext, SiteRef};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Clone)]
pub struct PublicResolver {
    directory: Arc<dyn Directory>,
    deadline: Deadline,
}

impl PublicResolver {
    pub fn new(directory: Arc<dyn Directory>, deadline: Deadline) -> Self {
        Self {
            directory,
            deadline,
        }
    }

    /// Resolve a code pair, distinguishing `NotFound` from `Inactive`.
    ///
    /// Any operational status is accepted; only `is_active` gates access.
    #[instrument(skip_all, fields(site = %site))]
    pub async fn resolve(&self, site: &SiteRef) -> LifecycleResult<SiteContext> {
        if site.company_code.is_empty() || site.site_code.is_empty() {
            debug!("Empty site code");
            return Err(LifecycleError::NotFound(format!("site {}", site)));
        }

        let found = self
            .deadline
            .read("get_site", || self.directory.get_site(site))
            .await?;

        match found {
            None => {
                debug!("Site not found");
                Err(LifecycleError::NotFound(format!("site {}", site)))
            }
            Some(ctx) if !ctx.is_active => {
                debug!(operational_status = ctx.operational_status.as_str(), "Site inactive");
                Err(LifecycleError::Inactive(site.clone()))
            }
            Some(ctx) => Ok(ctx),
        }
    }

    /// Resolve for an unauthenticated caller: `NotFound` and `Inactive` both
    /// become `SiteUnavailable`
    pub async fn resolve_public(&self, site: &SiteRef) -> LifecycleResult<SiteContext> {
        self.resolve(site).await.map_err(|err| match err {
            LifecycleError::NotFound(_) | LifecycleError::Inactive(_) => {
                LifecycleError::SiteUnavailable
            }
            other => other,
        })
    }

    /// Whether the code pair resolves to an active site
    pub async fn validate(&self, site: &SiteRef) -> bool {
        match self.resolve(site).await {
            Ok(_) => true,
            Err(LifecycleError::NotFound(_)) | Err(LifecycleError::Inactive(_)) => false,
            Err(err) => {
                warn!(site = %site, error = %err, "Site validation failed");
                false
            }
        }
    }
}
