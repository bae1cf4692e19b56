//! User-visible error reporting.

use crate::error::Error;

/// Sink for errors that must reach the user.
///
/// Background failures never go through here; only explicit user actions
/// (sign-in, sign-out, manual refresh, name save, permission change) and
/// non-recoverable profile reads do.
pub trait Notifier: Send + Sync {
    fn notify(&self, error: &Error);
}

/// Notifier that writes errors to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, error: &Error) {
        tracing::error!("{}", error);
    }
}
