//! Shared handler state.

use std::sync::Arc;

use crate::auth::JwtManager;
use crate::mail::MailDispatcherHandle;
use flashmart_core::Clock;
use flashmart_db::Database;

/// Cloned into every request. Everything inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub clock: Arc<dyn Clock>,
    pub jwt: Arc<JwtManager>,
    pub mail: MailDispatcherHandle,
}

impl AppState {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        jwt: JwtManager,
        mail: MailDispatcherHandle,
    ) -> Self {
        AppState {
            db,
            clock,
            jwt: Arc::new(jwt),
            mail,
        }
    }
}
