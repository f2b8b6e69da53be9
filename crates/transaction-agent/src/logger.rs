// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log formatting for embedders that let the agent install the global
//! subscriber.
//!
//! Lines look like:
//!
//! ```text
//! TX_AGENT | INFO | AGENT | Started, sending to https://logs.example.com
//! TX_AGENT | WARN | flush{worker=2}: SENDER | Failed to send transactions, status: 503, response: busy
//! ```

use std::fmt;
use tracing::debug;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(&mut writer, "TX_AGENT | {} | ", event.metadata().level())?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Installs a global subscriber filtered at `log_level`.
///
/// `RUST_LOG` style directives are accepted. Calling it when a global
/// subscriber is already installed leaves that subscriber in place.
pub fn init(log_level: &str) -> Result<(), ConfigError> {
    let directives = format!("h2=off,hyper=off,rustls=off,{log_level}");
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| ConfigError::Invalid(format!("Invalid log filter '{directives}': {e}")))?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .event_format(Formatter)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("A global subscriber is already installed, keeping it");
        return Ok(());
    }
    debug!("Logging subsystem enabled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::{info, info_span, warn};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn output(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture<F: FnOnce()>(f: F) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_ansi(false)
            .event_format(Formatter)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        captured.output()
    }

    #[test]
    fn test_format_plain_event() {
        let output = capture(|| info!("AGENT | Started"));
        assert_eq!(output, "TX_AGENT | INFO | AGENT | Started\n");
    }

    #[test]
    fn test_format_event_in_span() {
        let output = capture(|| {
            let span = info_span!("flush", worker = 2);
            let _guard = span.enter();
            warn!("SENDER | retrying");
        });
        assert_eq!(output, "TX_AGENT | WARN | flush{worker=2}: SENDER | retrying\n");
    }

    #[test]
    fn test_init_rejects_bad_filter() {
        assert!(matches!(
            init("transaction_agent=loud"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
