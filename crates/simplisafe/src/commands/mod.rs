//! Command dispatch: bridges CLI args -> core calls -> output formatting.

pub mod arm;
pub mod config_cmd;
pub mod events;
pub mod locks;
pub mod pins;
pub mod systems;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::session::Session;

/// Dispatch an account-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Systems(args) => systems::handle(session, args, global).await,
        Command::Arm(args) => arm::handle(session, args, global).await,
        Command::Pins(args) => pins::handle(session, args, global).await,
        Command::Locks(args) => locks::handle(session, args, global).await,
        Command::Events(args) => events::handle(session, args, global).await,
        Command::Watch => watch::handle(session, global).await,
        // Handled before login
        Command::Config(_) => unreachable!(),
    }
}
