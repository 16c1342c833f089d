//! PIN command handlers.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::{GlobalOpts, PinsArgs, PinsCommand};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

#[derive(Clone, Serialize, Tabled)]
struct PinRow {
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "PIN")]
    pin: String,
}

fn mask(pin: &str) -> String {
    "*".repeat(pin.chars().count())
}

pub async fn handle(session: &Session, args: PinsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut system = session.system(global.system).await?;

    let out = match args.command {
        PinsCommand::List { reveal } => {
            let pins = system.get_pins(false).await?;
            let rows: Vec<PinRow> = pins
                .iter()
                .map(|(label, pin)| PinRow {
                    label: label.to_owned(),
                    pin: if reveal { pin.to_owned() } else { mask(pin) },
                })
                .collect();
            output::render_list(global.output, &rows, PinRow::clone, |r| r.label.clone())
        }
        PinsCommand::Set { label, pin } => {
            system.set_pin(&label, &pin).await?;
            format!("PIN '{label}' set")
        }
        PinsCommand::Remove { label_or_pin } => {
            let label = system.remove_pin(&label_or_pin).await?;
            format!("PIN '{label}' removed")
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
