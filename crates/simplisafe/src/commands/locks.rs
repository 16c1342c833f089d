//! Door lock command handlers.

use serde::Serialize;
use tabled::Tabled;

use simplisafe_core::{Entity, Lock, LockState};

use crate::cli::{GlobalOpts, LocksArgs, LocksCommand};
use crate::error::CliError;
use crate::output;
use crate::session::{Session, require_v3};

#[derive(Serialize)]
#[allow(clippy::struct_excessive_bools)]
struct LockInfo {
    serial: String,
    name: String,
    state: LockState,
    low_battery: bool,
    offline: bool,
    pin_pad_offline: bool,
    disabled: bool,
}

impl From<&Lock> for LockInfo {
    fn from(lock: &Lock) -> Self {
        Self {
            serial: lock.serial().to_owned(),
            name: lock.name().to_owned(),
            state: lock.state(),
            low_battery: lock.low_battery(),
            offline: lock.offline(),
            pin_pad_offline: lock.pin_pad_offline(),
            disabled: lock.disabled(),
        }
    }
}

#[derive(Tabled)]
struct LockRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Online")]
    online: String,
}

impl From<&LockInfo> for LockRow {
    fn from(l: &LockInfo) -> Self {
        Self {
            serial: l.serial.clone(),
            name: l.name.clone(),
            state: l.state.to_string(),
            battery: if l.low_battery { "low" } else { "ok" }.into(),
            online: match (l.offline, l.pin_pad_offline) {
                (true, _) => "no".into(),
                (false, true) => "pin pad offline".into(),
                (false, false) => "yes".into(),
            },
        }
    }
}

pub async fn handle(session: &Session, args: LocksArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut system = session.system(global.system).await?;

    let (serial, lock) = match args.command {
        LocksCommand::List => {
            let v3 = require_v3(&mut system, "locks list")?;
            let locks: Vec<LockInfo> = v3.locks().values().map(LockInfo::from).collect();
            let out = output::render_list(global.output, &locks, |l| LockRow::from(l), |l| {
                l.serial.clone()
            });
            output::print_output(&out, global.quiet);
            return Ok(());
        }
        LocksCommand::Lock { serial } => (serial, true),
        LocksCommand::Unlock { serial } => (serial, false),
    };

    let v3 = require_v3(&mut system, if lock { "locks lock" } else { "locks unlock" })?;
    if lock {
        v3.lock(&serial).await?;
    } else {
        v3.unlock(&serial).await?;
    }

    let info = v3
        .lock_by_serial(&serial)
        .map(LockInfo::from)
        .ok_or_else(|| CliError::NotFound {
            resource_type: "lock".into(),
            identifier: serial.clone(),
            list_command: "locks list".into(),
        })?;
    let out = output::render_single(
        global.output,
        &info,
        |l| format!("{} ({}) is now {}", l.name, l.serial, l.state),
        |l| l.state.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
