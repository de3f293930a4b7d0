//! Logout: drop the persisted token set and send the user to the provider.

use log::*;

use crate::config::AuthSettings;
use crate::session::token_key;
use crate::store::TransientStore;

/// Provider path of the logout endpoint, relative to the issuer.
pub const LOGOUT_PATH: &str = "logout";

/// Clear the token set and return the URL to redirect the user agent to.
///
/// Never fails: a store error is logged and the redirect still happens, and
/// without an issuer URL the user goes straight to the post-logout URL.
pub async fn logout(
    settings: &AuthSettings,
    store: &dyn TransientStore,
    session_id: Option<&str>,
) -> String {
    match token_key(settings, session_id) {
        Some(key) => {
            if let Err(e) = store.delete(&key).await {
                error!("Failed to clear token set on logout: {}", e);
            }
        }
        None => debug!("Logout without a session; no token set to clear"),
    }

    logout_url(settings)
}

/// `<issuer>/logout?redirect=<post_logout_redirect_url>`, or the post-logout
/// URL itself when the issuer is not configured.
pub fn logout_url(settings: &AuthSettings) -> String {
    match settings.endpoint(LOGOUT_PATH) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair("redirect", &settings.post_logout_redirect_url);
            url.into()
        }
        Err(_) => {
            warn!("Issuer URL not configured; redirecting straight to post-logout URL");
            settings.post_logout_redirect_url.clone()
        }
    }
}
