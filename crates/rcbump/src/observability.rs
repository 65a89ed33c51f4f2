//! Observability setup: structured JSONL logging.
//!
//! stdout carries step outputs (`key=value` lines or JSON), so this module
//! never writes to it. Logs go to a daily-rolled JSONL file, or to stderr
//! when no log location is writable.

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use tracing::Event;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "RCBUMP_LOG_PATH";
const ENV_LOG_DIR: &str = "RCBUMP_LOG_DIR";
const DEFAULT_LOG_DIR_UNIX: &str = "/var/log";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Configuration for observability setup.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// The service name used for the log file name and data directory.
    pub service: String,
    /// Directory for JSONL log files from config. Falls back to platform defaults if unset.
    pub log_dir: Option<Utf8PathBuf>,
}

impl ObservabilityConfig {
    /// Create config for this binary, with the configured log directory.
    pub fn from_env_with_overrides(log_dir: Option<Utf8PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
        }
    }
}

/// Where log lines end up.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LogTarget {
    dir: Utf8PathBuf,
    file_name: String,
}

impl LogTarget {
    fn in_dir(dir: Utf8PathBuf, service: &str) -> Self {
        Self {
            dir,
            file_name: format!("{service}{LOG_FILE_SUFFIX}"),
        }
    }

    fn from_path(path: &Utf8Path) -> Result<Self, String> {
        let file_name = path
            .file_name()
            .ok_or_else(|| format!("{ENV_LOG_PATH} must include a file name"))?
            .to_string();
        let dir = path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        Ok(Self {
            dir: dir.to_path_buf(),
            file_name,
        })
    }

    #[cfg(test)]
    fn path(&self) -> Utf8PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Create the directory and open the file once to prove it is writable.
    fn ensure_writable(&self) -> Result<(), String> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| format!("failed to create log directory {}: {e}", self.dir))?;

        let path = self.dir.join(&self.file_name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| format!("failed to open log file {path}: {e}"))?;
        Ok(())
    }
}

/// Guard that must be held for the lifetime of the application so buffered
/// log lines are flushed on exit.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize logging.
///
/// Returns a guard that must be held for the application lifetime.
///
/// # Errors
///
/// Currently infallible: an unwritable log location degrades to stderr.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (log_writer, log_guard) = match build_log_writer(&cfg.service, cfg.log_dir.as_deref()) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("Warning: {err}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLogLayer::new(log_writer))
        .init();

    tracing::debug!("observability initialized");

    Ok(ObservabilityGuard {
        _log_guard: log_guard,
    })
}

/// Build an `EnvFilter` based on CLI flags and environment.
///
/// Priority: quiet flag > verbose flag > RUST_LOG env > default_level
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }

    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

// ============================================================================
// JSON Log Layer
// ============================================================================

struct JsonLogLayer<W> {
    writer: W,
}

impl<W> JsonLogLayer<W> {
    const fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<S, W> tracing_subscriber::Layer<S> for JsonLogLayer<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = JsonVisitor::default();
            attrs.record(&mut visitor);
            span.extensions_mut().insert(SpanFields {
                values: visitor.values,
            });
        }
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            let mut extensions = span.extensions_mut();
            if let Some(fields) = extensions.get_mut::<SpanFields>() {
                fields.values.extend(visitor.values);
            } else {
                extensions.insert(SpanFields {
                    values: visitor.values,
                });
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let mut map = Map::new();

        let timestamp = format_timestamp();
        map.insert("timestamp".to_string(), Value::String(timestamp));
        map.insert(
            "level".to_string(),
            Value::String(event.metadata().level().as_str().to_lowercase()),
        );
        map.insert(
            "target".to_string(),
            Value::String(event.metadata().target().to_string()),
        );

        // Span fields, outermost first; the innermost span names the entry.
        if let Some(scope) = ctx.event_scope(event) {
            let mut innermost = None;
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    map.extend(fields.values.clone());
                }
                innermost = Some(span.name());
            }
            if let Some(name) = innermost {
                map.insert("span".to_string(), Value::String(name.to_string()));
            }
        }

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        map.extend(visitor.values);

        let mut writer = self.writer.make_writer();
        if serde_json::to_writer(&mut writer, &Value::Object(map)).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

#[derive(Clone, Debug)]
struct SpanFields {
    values: Map<String, Value>,
}

#[derive(Default)]
struct JsonVisitor {
    values: Map<String, Value>,
}

impl tracing::field::Visit for JsonVisitor {
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.values
            .insert(field.name().to_string(), Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.values
            .insert(field.name().to_string(), Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.values
            .insert(field.name().to_string(), Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.values
                .insert(field.name().to_string(), Value::Number(number));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.values
            .insert(field.name().to_string(), Value::String(value.to_string()));
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.values
            .insert(field.name().to_string(), Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.values.insert(
            field.name().to_string(),
            Value::String(format!("{value:?}")),
        );
    }
}

/// Format the current time as RFC 3339 (UTC, millisecond precision).
fn format_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    let secs = now.as_secs();
    let nanos = now.subsec_nanos();

    // Convert to datetime components (UTC)
    let days_since_epoch = secs / 86400;
    let secs_of_day = secs % 86400;
    let hours = secs_of_day / 3600;
    let minutes = (secs_of_day % 3600) / 60;
    let seconds = secs_of_day % 60;

    // Calculate year/month/day from days since epoch (1970-01-01)
    let (year, month, day) = days_to_ymd(days_since_epoch as i64);

    format!(
        "{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}.{millis:03}Z",
        millis = nanos / 1_000_000
    )
}

/// Convert days since Unix epoch to (year, month, day).
const fn days_to_ymd(days: i64) -> (i32, u32, u32) {
    // Algorithm from Howard Hinnant's date algorithms
    let z = days + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as i32, m, d)
}

// ============================================================================
// Log Target Resolution
// ============================================================================

fn build_log_writer(
    service: &str,
    config_log_dir: Option<&Utf8Path>,
) -> Result<
    (
        tracing_appender::non_blocking::NonBlocking,
        tracing_appender::non_blocking::WorkerGuard,
    ),
    String,
> {
    let target = resolve_log_target(
        service,
        env_path(ENV_LOG_PATH),
        env_path(ENV_LOG_DIR),
        config_log_dir.map(Utf8Path::to_path_buf),
    )?;

    let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn env_path(name: &str) -> Option<Utf8PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(Utf8PathBuf::from)
}

/// Pick the log file.
///
/// Explicit choices (`RCBUMP_LOG_PATH`, `RCBUMP_LOG_DIR`, config `log_dir`)
/// must be writable; otherwise the first writable of `/var/log`, the
/// platform data dir, and the working directory wins.
fn resolve_log_target(
    service: &str,
    path_override: Option<Utf8PathBuf>,
    dir_override: Option<Utf8PathBuf>,
    config_dir: Option<Utf8PathBuf>,
) -> Result<LogTarget, String> {
    let explicit = match (path_override, dir_override.or(config_dir)) {
        (Some(path), _) => Some(LogTarget::from_path(&path)?),
        (None, Some(dir)) => Some(LogTarget::in_dir(dir, service)),
        (None, None) => None,
    };
    if let Some(target) = explicit {
        target.ensure_writable()?;
        return Ok(target);
    }

    fallback_dirs(service)
        .into_iter()
        .map(|dir| LogTarget::in_dir(dir, service))
        .find(|target| target.ensure_writable().is_ok())
        .ok_or_else(|| "no writable log directory found".to_string())
}

fn fallback_dirs(service: &str) -> Vec<Utf8PathBuf> {
    let mut candidates = Vec::new();

    if cfg!(unix) {
        candidates.push(Utf8PathBuf::from(DEFAULT_LOG_DIR_UNIX));
    }

    if let Some(dir) = directories::ProjectDirs::from("", "", service)
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.data_local_dir().join("logs")).ok())
    {
        candidates.push(dir);
    }

    if let Some(dir) = std::env::current_dir()
        .ok()
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
    {
        candidates.push(dir);
    }

    candidates
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8_tmp(tmp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap()
    }

    #[test]
    fn env_filter_quiet_overrides() {
        let filter = env_filter(true, 2, "info");
        assert_eq!(filter.to_string(), "error");
    }

    #[test]
    fn env_filter_verbose_maps_to_debug_and_trace() {
        assert_eq!(env_filter(false, 1, "info").to_string(), "debug");
        assert_eq!(env_filter(false, 3, "info").to_string(), "trace");
    }

    #[test]
    fn log_target_from_path_splits_dir_and_name() {
        let target = LogTarget::from_path(Utf8Path::new("/var/tmp/rcbump/custom.jsonl")).unwrap();
        assert_eq!(target.dir, "/var/tmp/rcbump");
        assert_eq!(target.file_name, "custom.jsonl");
    }

    #[test]
    fn log_target_from_bare_file_name_uses_cwd() {
        let target = LogTarget::from_path(Utf8Path::new("run.jsonl")).unwrap();
        assert_eq!(target.dir, ".");
    }

    #[test]
    fn path_override_wins() {
        let tmp = TempDir::new().unwrap();
        let file_path = utf8_tmp(&tmp).join("override.jsonl");
        let other = utf8_tmp(&tmp).join("other");

        let target =
            resolve_log_target("demo", Some(file_path.clone()), Some(other.clone()), Some(other))
                .unwrap();
        assert_eq!(target.path(), file_path);
    }

    #[test]
    fn dir_override_beats_config_dir() {
        let tmp = TempDir::new().unwrap();
        let env_dir = utf8_tmp(&tmp).join("env");
        let config_dir = utf8_tmp(&tmp).join("config");

        let target =
            resolve_log_target("demo", None, Some(env_dir.clone()), Some(config_dir)).unwrap();
        assert_eq!(target.dir, env_dir);
        assert_eq!(target.file_name, format!("demo{LOG_FILE_SUFFIX}"));
    }

    #[test]
    fn config_dir_is_created() {
        let tmp = TempDir::new().unwrap();
        let config_dir = utf8_tmp(&tmp).join("nested").join("logs");

        let target = resolve_log_target("demo", None, None, Some(config_dir.clone())).unwrap();
        assert_eq!(target.dir, config_dir);
        assert!(target.path().is_file());
    }

    #[test]
    fn unwritable_explicit_dir_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = utf8_tmp(&tmp).join("file");
        std::fs::write(&blocker, "").unwrap();

        let result = resolve_log_target("demo", None, Some(blocker.join("logs")), None);
        assert!(result.is_err());
    }

    #[test]
    fn format_timestamp_produces_valid_rfc3339() {
        let ts = format_timestamp();
        assert!(ts.ends_with('Z'), "timestamp should end with Z: {ts}");
        assert_eq!(ts.len(), 24, "timestamp should be 24 chars: {ts}");
        assert_eq!(&ts[10..11], "T", "date-time separator");
    }

    #[test]
    fn days_to_ymd_known_dates() {
        assert_eq!(days_to_ymd(0), (1970, 1, 1));
        assert_eq!(days_to_ymd(19782), (2024, 2, 29));
    }
}
