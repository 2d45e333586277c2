use std::{fmt, sync::OnceLock};

use colored::Colorize;
use tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{
    fmt::{self as tracing_fmt, FmtContext, FormatEvent, FormatFields},
    registry::LookupSpan,
    EnvFilter,
};

/// Visitor that flattens tracing fields into `key=value` pairs.
struct FieldCollector {
    fields: Vec<(String, String)>,
    message: Option<String>,
}

impl FieldCollector {
    fn new() -> Self {
        Self {
            fields: Vec::new(),
            message: None,
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields
                .push((field.name().to_string(), format!("\"{}\"", value)));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.push((field.name().to_string(), value.to_string()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.push((field.name().to_string(), value.to_string()));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.push((field.name().to_string(), value.to_string()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.push((field.name().to_string(), value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }
}

/// Single-line formatter: timestamp, level, target, message, then fields.
struct VigilLogFormatter;

impl<S, N> FormatEvent<S, N> for VigilLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: tracing_fmt::format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        write!(writer, "{} ", chrono::Utc::now().to_rfc3339().dimmed())?;

        let level_str = match *meta.level() {
            Level::TRACE => "TRACE".purple(),
            Level::DEBUG => "DEBUG".green(),
            Level::INFO => "INFO".blue(),
            Level::WARN => "WARN".yellow(),
            Level::ERROR => "ERROR".red(),
        };
        write!(writer, "[{}] ", level_str)?;
        write!(writer, "{} ", meta.target().cyan().bold())?;

        let mut collector = FieldCollector::new();
        event.record(&mut collector);

        if let Some(msg) = &collector.message {
            write!(writer, "{}", msg.white())?;
        }
        for (name, value) in &collector.fields {
            write!(writer, " {}={}", name.white(), value.yellow())?;
        }

        writeln!(writer)
    }
}

static TRACING: OnceLock<()> = OnceLock::new();

/// Install the global subscriber. Safe to call more than once; only the
/// first call takes effect. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_fmt::Subscriber::builder()
            .with_env_filter(filter)
            .event_format(VigilLogFormatter)
            .init();
    });
}
