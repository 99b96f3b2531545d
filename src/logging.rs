//! Logging setup for the entry binary.
//!
//! Two channels share one writer:
//!
//! - the **log** channel: operator-facing events, `INFO` and above, or
//!   `DEBUG` and above in debug mode;
//! - the **diag** channel: events with target [`DIAG_TARGET`], printed as
//!   bare messages. Its layer is only installed in debug mode, so without
//!   debug those events have no subscriber at all.

use tracing::Subscriber;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;

use crate::constants::DIAG_TARGET;

/// Builds the subscriber for both channels over `writer`.
pub fn subscriber<W>(debug: bool, writer: W) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Clone + Send + Sync + 'static,
{
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let log_layer = fmt::layer()
        .with_writer(writer.clone())
        .with_target(false)
        .with_ansi(false)
        .compact()
        .with_filter(
            Targets::new()
                .with_default(level)
                .with_target(DIAG_TARGET, LevelFilter::OFF),
        );

    let diag_layer = debug.then(|| {
        fmt::layer()
            .with_writer(writer)
            .with_target(false)
            .with_level(false)
            .with_ansi(false)
            .without_time()
            .with_filter(Targets::new().with_target(DIAG_TARGET, LevelFilter::TRACE))
    });

    tracing_subscriber::registry()
        .with(log_layer)
        .with(diag_layer)
}

/// Installs the global subscriber writing to stderr.
pub fn init(debug: bool) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    tracing::subscriber::set_global_default(subscriber(debug, std::io::stderr))
}
