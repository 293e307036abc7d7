use sqlx::PgPool;
use std::sync::Arc;

use crate::routes::auth::OwnerResolver;
use crate::services::fun_facts::FunFactsService;
use crate::services::jobs::StoryService;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub stories: Arc<StoryService>,
    pub fun_facts: Arc<FunFactsService>,
    /// Present when stories are stored in Postgres; used by the health check.
    pub db: Option<PgPool>,
    pub auth: Arc<OwnerResolver>,
}

impl AppState {
    pub fn new(
        stories: StoryService,
        fun_facts: FunFactsService,
        db: Option<PgPool>,
        auth: OwnerResolver,
    ) -> Self {
        Self {
            stories: Arc::new(stories),
            fun_facts: Arc::new(fun_facts),
            db,
            auth: Arc::new(auth),
        }
    }
}
