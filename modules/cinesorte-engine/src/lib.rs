//! The Cinesorte engine: progression, trophies, genre affinity, interactions,
//! reviews, the follow graph and the notifications they emit, plus the account,
//! profile and curated-list flows around them.
//!
//! Every state transition that touches more than one document goes through a
//! single [`SocialStore`] method. Derived values are computed by pure functions
//! in this crate and handed to the store as closures, so a retried transaction
//! recomputes from fresh reads.

pub mod accounts;
pub mod affinity;
pub mod alerts;
pub mod feeds;
pub mod follows;
pub mod interactions;
pub mod lists;
pub mod notifications;
pub mod profiles;
pub mod progression;
pub mod reviews;
pub mod social;
pub mod trophies;
pub mod validation;

#[cfg(feature = "test-support")]
pub mod testing;

use std::sync::Arc;
use std::time::Duration;

use typed_builder::TypedBuilder;

use cinesorte_store::SocialStore;

pub use accounts::{CreatedAccount, IdentityProvider, LoginOutcome, Registration, SignedInAccount};
pub use affinity::MediaCatalog;
pub use alerts::{alerts_from_config, AlertSink, NoopAlerts, TelegramAlerts};
pub use feeds::ReviewView;
pub use interactions::{InteractionAction, RecordInteraction};
pub use lists::{CollectionPost, ListDetail, ListDraft, NewListItem};
pub use profiles::ProfileUpdate;
pub use progression::{level_title, Progress, XpCurve};
pub use reviews::{NewComment, NewReview, ReviewEdit};
pub use social::{Suggestion, UserStats, UserSummary};

/// Records removed per round trip when purging an account.
pub const PURGE_PAGE_SIZE: usize = 400;

fn noop_alerts() -> Arc<dyn AlertSink> {
    Arc::new(NoopAlerts)
}

/// Shared handle to every collaborator the flows need. Cheap to clone.
#[derive(Clone, TypedBuilder)]
pub struct Cinesorte {
    store: Arc<dyn SocialStore>,
    catalog: Arc<dyn MediaCatalog>,
    identity: Arc<dyn IdentityProvider>,
    #[builder(default = noop_alerts())]
    alerts: Arc<dyn AlertSink>,
    #[builder(default)]
    curve: XpCurve,
    #[builder(default = PURGE_PAGE_SIZE)]
    purge_page_size: usize,
    #[builder(default = Duration::from_millis(50))]
    purge_pause: Duration,
}

impl Cinesorte {
    pub fn store(&self) -> &Arc<dyn SocialStore> {
        &self.store
    }

    pub fn alerts(&self) -> &Arc<dyn AlertSink> {
        &self.alerts
    }

    pub fn curve(&self) -> XpCurve {
        self.curve
    }
}
