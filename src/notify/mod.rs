pub mod normalize;
pub mod notifier;
pub mod queue;

pub use normalize::{normalize, normalize_inline};
pub use notifier::Notifier;
pub use queue::{DEFAULT_DISMISS_DELAY, NotificationQueue};
