use url::Url;

use crate::client::MatchmakingApi;
use crate::config::ApiConfig;
use crate::error::ApiError;

/// OAuth provider the backend delegates login to.
const OAUTH_PROVIDER: &str = "github";

/// Sends the user somewhere outside the client: the OAuth login page or the
/// public landing page after logout.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &Url);
}

pub fn login_url(config: &ApiConfig) -> Result<Url, ApiError> {
    config.endpoint(&["oauth2", "authorization", OAUTH_PROVIDER])
}

pub fn begin_login(config: &ApiConfig, navigator: &dyn Navigator) -> Result<(), ApiError> {
    let target = login_url(config)?;
    tracing::info!(target: "devmatch::auth", url = %target, "redirecting to login");
    navigator.navigate(&target);
    Ok(())
}

/// Ends the backend session and navigates to the landing page. A session the
/// backend already considers expired is treated as logged out.
pub async fn logout(
    api: &dyn MatchmakingApi,
    config: &ApiConfig,
    navigator: &dyn Navigator,
) -> Result<(), ApiError> {
    match api.logout().await {
        Ok(()) => {}
        Err(err) if err.is_unauthorized() => {
            tracing::debug!(target: "devmatch::auth", "session already expired at logout");
        }
        Err(err) => return Err(err),
    }
    navigator.navigate(config.base_url());
    Ok(())
}
