//! Host environment seam.
//!
//! The original flow reached straight into page globals for mobile
//! detection, deep-link redirects, and post-chain-switch reloads. Those
//! touchpoints are collected here behind one trait so headless hosts and
//! tests can supply their own behavior.

use url::Url;

/// The environment hosting the claim flow.
pub trait HostRuntime: Send + Sync {
    /// Whether this is a mobile runtime (in-app browsers, deep links).
    fn is_mobile(&self) -> bool;

    /// The page URL the flow is running on, used to build wallet deep
    /// links.
    fn current_url(&self) -> Url;

    /// Navigates the whole page to `url` (mobile wallet deep link).
    fn redirect(&self, url: &str);

    /// Reloads the page. Called after a chain change because a wallet's
    /// signing context is not trusted to survive a chain switch.
    fn reload(&self);
}

/// Desktop/headless runtime: never mobile, redirects and reloads only
/// logged.
#[derive(Debug, Clone)]
pub struct DesktopRuntime {
    url: Url,
}

impl DesktopRuntime {
    /// Creates a desktop runtime reporting the given page URL.
    #[must_use]
    pub const fn new(url: Url) -> Self {
        Self { url }
    }
}

impl Default for DesktopRuntime {
    fn default() -> Self {
        #[allow(clippy::expect_used)]
        Self::new(Url::parse("http://localhost/").expect("static URL parses"))
    }
}

impl HostRuntime for DesktopRuntime {
    fn is_mobile(&self) -> bool {
        false
    }

    fn current_url(&self) -> Url {
        self.url.clone()
    }

    fn redirect(&self, url: &str) {
        tracing::info!(%url, "redirect requested (no-op on desktop runtime)");
    }

    fn reload(&self) {
        tracing::info!("page reload requested (no-op on desktop runtime)");
    }
}
