pub mod auth;
pub mod comments;
pub mod error;
pub mod posts;
pub mod users;

mod convert;

pub use error::ApiError;

use std::sync::Arc;
use std::time::Duration;

use meadow_db::{Database, StoreError, StoreResult};
use meadow_mailer::Mailer;
use tracing::error;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub mailer: Arc<dyn Mailer>,
    pub config: ApiConfig,
}

/// Explicit configuration handed to the handlers at construction time;
/// there are no global config singletons.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub env: String,
    /// Base URL the activation link points at.
    pub frontend_url: String,
    pub invitation_ttl: Duration,
    /// When set, the mail gateway validates but does not deliver.
    pub sandbox_mail: bool,
}

/// Run blocking store work off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(res) => res,
        Err(err) => {
            error!("spawn_blocking join error: {err}");
            Err(StoreError::Internal(format!("blocking task failed: {err}")))
        }
    }
}
