//! # Tagged stderr logging for the binary.
//!
//! Every record is written as `"{tag}: {message}"` on one line, with no timestamp,
//! level or target. The tag defaults to `INIT`.
//!
//! Filtering follows `RUST_LOG` and defaults to `info`.

use std::fmt;

use tracing::{Event, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Default line prefix.
pub const DEFAULT_TAG: &str = "INIT";

/// Event formatter prefixing each line with a fixed tag.
#[derive(Debug, Clone)]
pub struct TagFormat {
    tag: String,
}

impl TagFormat {
    /// Creates a formatter writing `"{tag}: "` before each message.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Default for TagFormat {
    fn default() -> Self {
        Self::new(DEFAULT_TAG)
    }
}

impl<S, N> FormatEvent<S, N> for TagFormat
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
        write!(writer, "{}: ", self.tag)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs the global subscriber: tagged lines on stderr, `RUST_LOG` filtering.
///
/// Returns an error if a global subscriber is already set.
pub fn init(tag: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(TagFormat::new(tag))
        .try_init()
}
