// src/omnixtracker/omnixmetry.rs ~=#######D]======A===r===c====M===o===o===n=====<Lord[OMNIXTRACKER]Xyn>=====S===t===u===d===i===o===s======[R|$>

use crate::constants::{INITIAL_LOG_LEVEL, LOG_FILE_PATH};
use tracing_subscriber::{Layer, Registry, EnvFilter};
use tracing::{Event, Level, Metadata, Subscriber};
use anyhow::{Context, Result as AnyhowResult};
use tracing_subscriber::prelude::*;
use std::fmt::Write as FmtWrite;
use std::fs::{OpenOptions, File};
use std::io::{Write, BufWriter};
use std::path::Path;
use parking_lot::RwLock;
use std::sync::Arc;
use chrono::Local;
use colored::*;

/// Tracing layer that echoes NTM events to stdout and, optionally, to an
/// append-only log file.
#[derive(Clone)]
pub struct OmniXMetry {
    log_file: Arc<RwLock<Option<BufWriter<File>>>>,
    log_level: Arc<RwLock<Level>>,
    echo_stdout: bool,
}

impl OmniXMetry {
    /// Opens the file named by `LOG_FILE_PATH`; an empty path disables file output.
    pub fn init() -> AnyhowResult<Self> {
        if LOG_FILE_PATH.is_empty() {
            return Ok(Self::without_file());
        }
        Self::with_log_file(Path::new(&*LOG_FILE_PATH))
    }

    pub fn with_log_file(path: &Path) -> AnyhowResult<Self> {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        Ok(Self {
            log_level: Arc::new(RwLock::new(*INITIAL_LOG_LEVEL)),
            log_file: Arc::new(RwLock::new(Some(BufWriter::new(log_file)))),
            echo_stdout: true,
        })
    }

    pub fn without_file() -> Self {
        Self {
            log_level: Arc::new(RwLock::new(*INITIAL_LOG_LEVEL)),
            log_file: Arc::new(RwLock::new(None)),
            echo_stdout: true,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.echo_stdout = false;
        self
    }

    pub fn set_log_level(&self, level: Level) {
        let mut log_level = self.log_level.write();
        *log_level = level;
    }

    pub fn get_log_level(&self) -> Level {
        *self.log_level.read()
    }

    pub fn is_log_file_initialized(&self) -> bool {
        self.log_file.read().is_some()
    }

    pub fn write_log(&self, log_entry: &str) -> std::io::Result<()> {
        if let Some(ref mut file) = *self.log_file.write() {
            writeln!(file, "{}", log_entry)?;
            file.flush()?;
        }
        Ok(())
    }

    fn format_entry(&self, level: Level, target: &str, fields: &str) -> (String, String) {
        let level_str = match level {
            Level::ERROR => "ERROR",
            Level::WARN => "WARN ",
            Level::INFO => "INFO ",
            Level::DEBUG => "DEBUG",
            Level::TRACE => "TRACE",
        };
        let colored_level = match level {
            Level::ERROR => level_str.red(),
            Level::WARN => level_str.yellow(),
            Level::INFO => level_str.green(),
            Level::DEBUG => level_str.blue(),
            Level::TRACE => level_str.magenta(),
        };
        let stamp = Local::now().format("%B, %d %Y @ %I:%M %p");

        // The file gets the plain tag; ANSI codes only go to the terminal.
        (
            format!("{} [{}] {}: {}", stamp, colored_level, target, fields),
            format!("{} [{}] {}: {}", stamp, level_str, target, fields),
        )
    }
}

impl<S> Layer<S> for OmniXMetry
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let level = *event.metadata().level();
        if level <= self.get_log_level() {
            let mut fields = String::new();
            {
                let mut visitor = FieldVisitor { output: &mut fields };
                event.record(&mut visitor);
            }

            let (terminal_entry, file_entry) =
                self.format_entry(level, event.metadata().target(), &fields);

            if self.echo_stdout {
                println!("{}", terminal_entry);
            }

            if let Err(e) = self.write_log(&file_entry) {
                eprintln!("Failed to write to log file: {}", e);
            }
        }
    }

    fn enabled(
        &self,
        metadata: &Metadata<'_>,
        _: tracing_subscriber::layer::Context<'_, S>,
    ) -> bool {
        *metadata.level() <= self.get_log_level()
    }
}

struct FieldVisitor<'a> {
    output: &'a mut String,
}

impl<'a> tracing::field::Visit for FieldVisitor<'a> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if !self.output.is_empty() {
            self.output.push_str(", ");
        }
        if field.name() == "message" {
            let _ = write!(self.output, "{:?}", value);
        } else {
            let _ = write!(self.output, "{} = {:?}", field.name(), value);
        }
    }
}

pub fn setup_global_subscriber(omnixmetry: OmniXMetry) -> AnyhowResult<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let subscriber = Registry::default().with(env_filter).with(omnixmetry);
    tracing::subscriber::set_global_default(subscriber).context("Failed to set global subscriber")?;
    Ok(())
}
