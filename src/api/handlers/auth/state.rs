//! Auth state and configuration.

use crate::{
    identity::IdentityProvider,
    provisioning::Provisioner,
    session::CookieBridge,
    store::AccountStore,
};
use std::sync::Arc;
use uuid::Uuid;

use super::rate_limit::RateLimiter;

const DEFAULT_SITE_URL: &str = "https://deonpay.mx";
const DEFAULT_DASHBOARD_URL: &str = "https://dashboard.deonpay.mx";
const DEFAULT_ENVIRONMENT: &str = "production";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    site_url: String,
    dashboard_url: String,
    environment: String,
    identity_configured: bool,
    anon_key_configured: bool,
    cookie_domain_configured: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_URL.to_string())
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new(site_url: String) -> Self {
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            identity_configured: false,
            anon_key_configured: false,
            cookie_domain_configured: false,
        }
    }

    #[must_use]
    pub fn with_dashboard_url(mut self, dashboard_url: String) -> Self {
        self.dashboard_url = dashboard_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: String) -> Self {
        self.environment = environment;
        self
    }

    /// Record which identity settings came from configuration, for `/api/debug`.
    #[must_use]
    pub fn with_identity_configured(mut self, url: bool, anon_key: bool) -> Self {
        self.identity_configured = url;
        self.anon_key_configured = anon_key;
        self
    }

    #[must_use]
    pub fn with_cookie_domain_configured(mut self, configured: bool) -> Self {
        self.cookie_domain_configured = configured;
        self
    }

    #[must_use]
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    #[must_use]
    pub fn dashboard_url(&self) -> &str {
        &self.dashboard_url
    }

    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub(crate) fn identity_configured(&self) -> bool {
        self.identity_configured
    }

    pub(crate) fn anon_key_configured(&self) -> bool {
        self.anon_key_configured
    }

    pub(crate) fn cookie_domain_configured(&self) -> bool {
        self.cookie_domain_configured
    }

    /// Landing page of the confirmation email link.
    pub(super) fn signin_url(&self) -> String {
        format!("{}/signin", self.site_url)
    }

    /// Landing page of the password recovery email link.
    pub(super) fn reset_password_url(&self) -> String {
        format!("{}/reset-password", self.site_url)
    }

    pub(super) fn dashboard_redirect(&self, merchant_id: Uuid) -> String {
        format!("{}/{merchant_id}", self.dashboard_url)
    }
}

pub struct AuthState {
    config: AuthConfig,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn AccountStore>,
    provisioner: Provisioner,
    cookies: CookieBridge,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn AccountStore>,
        cookies: CookieBridge,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let provisioner = Provisioner::new(Arc::clone(&store), Arc::clone(&identity));
        Self {
            config,
            identity,
            store,
            provisioner,
            cookies,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    #[must_use]
    pub fn cookies(&self) -> &CookieBridge {
        &self.cookies
    }

    pub(super) fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}
