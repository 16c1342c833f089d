//! Realtime event stream.

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;
use crate::session::{self, Session};

use super::events::render_line;

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let realtime = session.client().realtime();
    let format = global.output;
    let quiet = global.quiet;

    realtime.on_connect(move || {
        info!("realtime channel connected");
        if !quiet {
            eprintln!("connected, waiting for events (Ctrl-C to stop)");
        }
    });
    realtime.on_disconnect(move |reason| {
        warn!(reason, "realtime channel disconnected");
    });
    realtime.on_event(move |event| {
        output::print_output(&render_line(format, event), false);
    });

    // Rotated refresh tokens are saved as they arrive so a long watch
    // never leaves a stale token in the cache.
    let mut rotations = session.client().subscribe_token_refresh();
    let profile = session.profile_name().to_owned();
    let tokens = session.tokens().clone();
    let saver = tokio::spawn(async move {
        loop {
            match rotations.recv().await {
                Ok(rotated) => session::save_token(&tokens, &profile, &rotated.refresh_token),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    realtime.connect()?;
    tokio::signal::ctrl_c().await?;

    info!("interrupted, closing realtime channel");
    realtime.disconnect().await;
    saver.abort();

    let dropped = realtime.dropped_frames();
    if dropped > 0 {
        warn!(dropped, "some realtime events were dropped");
    }
    Ok(())
}
