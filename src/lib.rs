//! Navflow: Throttled Navigation Queue with Single-Flight Load Handoff
//!
//! Navigation requests issued before the display surface exists are queued and
//! replayed in order once it is ready, spaced so the surface is never asked to
//! start two transitions back to back. Entity loads are deduplicated per id,
//! retried with linear backoff, and hand the resolved entity to the queue so
//! the destination screen needs no second fetch.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod intent;
pub mod logging;
pub mod navigator;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod simulate;
pub mod surface;

pub use coordinator::{Handoff, LoadCoordinator, LoadTicket, LoaderConfig};
pub use error::{FetchError, LoadError, NavigationError, SurfaceError};
pub use fetcher::{Entity, EntityFetcher};
pub use intent::{IntentId, IntentKind, NavigationIntent, Params};
pub use navigator::Navigator;
pub use queue::{NavigationQueue, QueueConfig};
pub use scheduler::{Scheduler, TokioScheduler};
pub use surface::DisplaySurface;
