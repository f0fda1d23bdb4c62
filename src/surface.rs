//! Display surface abstraction.
//!
//! The routing layer the app's screens live in. The queue treats it as a black
//! box that either accepts a transition or reports a [`SurfaceError`].

use crate::error::SurfaceError;
use crate::intent::{IntentKind, NavigationIntent, Params};

pub trait DisplaySurface: Send + Sync {
    /// Push `target` with `params`.
    fn navigate_to(&self, target: &str, params: &Params) -> Result<(), SurfaceError>;

    /// Replace the navigation stack with `target`.
    fn reset_to(&self, target: &str, params: &Params) -> Result<(), SurfaceError>;
}

/// Dispatch an intent to the matching surface call.
pub(crate) fn execute(
    surface: &dyn DisplaySurface,
    intent: &NavigationIntent,
) -> Result<(), SurfaceError> {
    match intent.kind() {
        IntentKind::Navigate => surface.navigate_to(intent.target(), intent.params()),
        IntentKind::Reset => surface.reset_to(intent.target(), intent.params()),
    }
}
