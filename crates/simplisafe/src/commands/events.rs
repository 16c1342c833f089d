//! Event history handler, plus the row/line rendering `watch` reuses.

use tabled::Tabled;

use simplisafe_core::Event;

use crate::cli::{EventsArgs, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output::{self, or_dash};
use crate::session::Session;

#[derive(Tabled)]
pub(crate) struct EventRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Event")]
    kind: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Sensor")]
    sensor: String,
    #[tabled(rename = "By")]
    changed_by: String,
    #[tabled(rename = "Info")]
    info: String,
}

impl From<&Event> for EventRow {
    fn from(e: &Event) -> Self {
        Self {
            time: timestamp(e),
            kind: e.kind.to_string(),
            category: e.category().to_string(),
            sensor: or_dash(e.sensor_name.as_deref().filter(|s| !s.is_empty())),
            changed_by: or_dash(e.changed_by.as_deref().filter(|s| !s.is_empty())),
            info: e.info.clone(),
        }
    }
}

fn timestamp(e: &Event) -> String {
    or_dash(e.timestamp.map(|t| t.format("%Y-%m-%d %H:%M:%S")))
}

/// One line per event for streaming output.
pub(crate) fn render_line(format: OutputFormat, event: &Event) -> String {
    match format {
        OutputFormat::Table => format!("{}  {:<32} {}", timestamp(event), event.kind.as_ref(), event.info),
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json_compact(event),
        OutputFormat::Plain => event.kind.to_string(),
    }
}

pub async fn handle(session: &Session, args: EventsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let system = session.system(global.system).await?;

    let events = if args.latest {
        vec![system.get_latest_event().await?]
    } else {
        system.get_events(args.since, args.limit).await?
    };

    let out = output::render_list(global.output, &events, |e| EventRow::from(e), |e| {
        e.kind.to_string()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
