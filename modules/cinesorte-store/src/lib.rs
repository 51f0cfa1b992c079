pub mod postgres;
pub mod traits;

#[cfg(feature = "test-utils")]
pub mod memory;

pub use postgres::PgStore;
pub use traits::{
    Effects, FollowCommit, FollowFn, InteractionCommit, InteractionFn, LikeToggle, ListDetails,
    OwnedCollection, ProfileCommit, ProfileFn, ReviewCommit, ReviewFilter, ReviewFn, SocialStore,
};

#[cfg(feature = "test-utils")]
pub use memory::MemoryStore;
