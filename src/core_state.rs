//! Transport-agnostic application state.
//!
//! `CoreState` is the single shared state behind the HTTP layer: the
//! record store plus the three services that own its invariants. It is
//! wrapped in `Arc` at startup so every handler and middleware sees the
//! same instance.

use std::sync::Arc;

use crate::auth::{LogSink, NotificationSink, OtpAuthenticator};
use crate::capacity::{CapacityAllocator, PlanGenerator, TemplatePlanGenerator};
use crate::config::AppConfig;
use crate::scheduling::SlotScheduler;
use crate::seed;
use crate::store::RecordStore;

/// Shared application core.
pub struct CoreState {
    pub store: Arc<RecordStore>,
    pub authenticator: OtpAuthenticator,
    pub scheduler: SlotScheduler,
    pub allocator: CapacityAllocator,
    pub plan_generator: Arc<dyn PlanGenerator>,
    pub config: AppConfig,
}

impl CoreState {
    /// Wire the default collaborators: log-based code delivery and the
    /// template plan generator.
    pub fn new(config: AppConfig) -> Self {
        Self::with_collaborators(config, Arc::new(LogSink), Arc::new(TemplatePlanGenerator))
    }

    /// Inject alternative collaborators (real delivery channel, remote
    /// plan service, or test doubles).
    pub fn with_collaborators(
        config: AppConfig,
        sink: Arc<dyn NotificationSink>,
        plan_generator: Arc<dyn PlanGenerator>,
    ) -> Self {
        let store = Arc::new(RecordStore::new());
        if config.seed_demo {
            seed::seed_demo_roster(&store);
        }
        Self {
            authenticator: OtpAuthenticator::new(store.clone(), config.otp.clone(), sink),
            scheduler: SlotScheduler::new(store.clone()),
            allocator: CapacityAllocator::new(store.clone()),
            plan_generator,
            store,
            config,
        }
    }
}
