// ============================================================================
// Logging Setup
// ============================================================================

use tracing::Level;

/// Install a formatting subscriber that prints thread names, so stop-executor
/// output can be told apart from client threads.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
