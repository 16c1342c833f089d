//! Arm/disarm handler.

use serde::Serialize;

use simplisafe_core::{AlarmSystem, ArmTarget, SystemState};

use crate::cli::{ArmArgs, ArmMode, GlobalOpts};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

#[derive(Serialize)]
struct ArmResult {
    system_id: u64,
    state: SystemState,
}

impl From<ArmMode> for ArmTarget {
    fn from(mode: ArmMode) -> Self {
        match mode {
            ArmMode::Off => Self::Off,
            ArmMode::Home => Self::Home,
            ArmMode::Away => Self::Away,
        }
    }
}

pub async fn handle(session: &Session, args: ArmArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut system = session.system(global.system).await?;
    let target = ArmTarget::from(args.mode);

    tracing::info!(system_id = system.system_id(), %target, "setting alarm state");
    system.set_state(target).await?;

    let result = ArmResult {
        system_id: system.system_id(),
        state: system.state(),
    };
    let out = output::render_single(
        global.output,
        &result,
        |r| format!("System {} is now {}", r.system_id, r.state),
        |r| r.state.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
