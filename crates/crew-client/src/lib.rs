//! Client core for Crew: profiles, teams and live team channels.
//!
//! Every service here is generic over a [`crew_core::store::RecordStore`] and
//! holds it behind an [`std::sync::Arc`]. The [`session::Session`] composes
//! them and is what a presentation layer drives.
//!
//! # Wiring
//!
//! ```rust,ignore
//! let (source, feed) = identity::identity_channel(None);
//! let mut session = Session::new(Arc::new(store), feed);
//! source.sign_in("u1");
//! while let Some(event) = session.next_event().await {
//!   render(session.state(), event);
//! }
//! ```

pub mod channel;
pub mod directory;
pub mod error;
pub mod identity;
pub mod registry;
pub mod session;

pub use error::{Error, Result};
pub use session::{Session, SessionEvent, SessionState};
