//! Logging setup
//!
//! Components never write to a process-wide logger of their own; they emit
//! `tracing` events inside spans that carry `stage`/`run_id` fields, and the
//! subscriber installed here (or any subscriber a test installs with
//! `tracing::subscriber::with_default`) decides where those events go.

use clap::ValueEnum;
use std::fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::common::error::MgrError;
use crate::common::result::MgrResult;

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Output layout for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// `LEVEL | timestamp | span{fields}: message` aligned columns
    Columns,
    /// Stock tracing-subscriber layout
    Plain,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Columns
    }
}

/// Aligned column layout: `INFO \t| 2024-01-01 12:00:00\t | update{run_id=1}: message`
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnFormat;

impl<S, N> FormatEvent<S, N> for ColumnFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = event.metadata().level().to_string();
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        write!(writer, "{:<5}\t| {}\t | ", level, stamp)?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{}}}", fields)?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(format: LogFormat) -> MgrResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Columns => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(ColumnFormat)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Plain => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    result.map_err(|e| MgrError::internal_error_with_source("Failed to install log subscriber", e))
}
