//! Client operations.
//!
//! Each sub-module adds an `impl Client` block for one domain.  Operations
//! that only touch local state are synchronous; those that may reach the
//! remote backend are `async`.

pub mod backup;
pub mod communities;
pub mod feed;
pub mod messaging;
pub mod session;
pub mod social;

pub use communities::CommunityDraft;
pub use feed::EventDraft;
