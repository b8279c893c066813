//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing_subscriber::prelude::*;
use tracing_subscriber::Layer;

use crate::config::{Logging, LoggingStyle};

/// Guard returned by [`init`]; must be held for the process lifetime or the
/// non-blocking file appender stops flushing.
pub struct LoggingGuard(#[allow(dead_code)] Option<tracing_appender::non_blocking::WorkerGuard>);

/// Sets up the global `tracing` subscriber per §6a: an `EnvFilter` seeded
/// from `logging.level` (overridable via `RUST_LOG`), and either a
/// non-blocking daily-rotating file layer (when `logging.file` is set) or a
/// stderr layer, in compact or JSON style.
pub fn init(config: &Logging) -> LoggingGuard {
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(config.level.parse().unwrap_or_else(|_| "info".parse().unwrap()))
        .from_env_lossy();

    let (writer, guard) = match &config.file {
        Some(path) => {
            let dir = std::path::Path::new(path).parent().unwrap_or_else(|| std::path::Path::new("."));
            let name = std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "ospfprobed.log".to_owned());
            let appender = tracing_appender::rolling::daily(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (non_blocking, Some(guard))
        }
        None => {
            let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());
            (non_blocking, Some(guard))
        }
    };

    let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_target(false);
    let layer = match config.style {
        LoggingStyle::Compact => layer.compact().boxed(),
        LoggingStyle::Json => layer.json().boxed(),
    };

    tracing_subscriber::registry().with(env_filter).with(layer).init();

    LoggingGuard(guard)
}
