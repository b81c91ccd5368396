// src/shutdown.rs
// =============================================================================
// Ctrl+C handling.
//
// The first Ctrl+C cancels the token shared by every stage of the walk: no new
// requests are started, in-flight ones finish, and whatever was mirrored so
// far is still cached. A second Ctrl+C exits immediately.
// =============================================================================

use tokio_util::sync::CancellationToken;

/// Exit code for a forced quit (128 + SIGINT).
const FORCE_QUIT_CODE: i32 = 130;

pub fn install(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }

        eprintln!("\nShutdown requested, finishing in-flight requests...");
        eprintln!("Press Ctrl+C again to force quit.");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Force quit!");
            std::process::exit(FORCE_QUIT_CODE);
        }
    });
}
