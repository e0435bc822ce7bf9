use crate::config::{LoggingConfig, Section};
use parking_lot::Mutex;
use std::{
    io::{IsTerminal, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::Level;
use tracing_subscriber::{filter::FilterFn, fmt};

use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};

const DEFAULT_MAX_SIZE_MB: u64 = 10;
const DEFAULT_MAX_BACKUPS: usize = 3;

// -------- level helpers --------
fn parse_tracing_level(s: &str) -> Option<tracing::Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

/// Returns true if target == prefix or target starts with "prefix::"
fn matches_target(target: &str, prefix: &str) -> bool {
    target == prefix
        || (target.starts_with(prefix) && target[prefix.len()..].starts_with("::"))
}

type RestFilter = FilterFn<Box<dyn Fn(&tracing::Metadata<'_>) -> bool + Send + Sync + 'static>>;

/// Passes events whose target has no explicit section, up to `max_level`.
fn rest_filter(explicit: &[String], max_level: Level) -> RestFilter {
    let explicit = explicit.to_vec();
    FilterFn::new(Box::new(move |meta: &tracing::Metadata<'_>| {
        !explicit.iter().any(|p| matches_target(meta.target(), p)) && meta.level() <= &max_level
    }))
}

// -------- rotating file writer --------

#[derive(Clone)]
struct RotatingFile(Arc<Mutex<FileRotate<AppendCount>>>);

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().flush()
    }
}

/// Open `path` for appending with size-based rotation, creating parent dirs.
fn open_rotating(path: &Path, section: &Section) -> std::io::Result<RotatingFile> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let backups = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);
    let rot = FileRotate::new(
        path,
        AppendCount::new(backups),
        ContentLimit::BytesSurpassed(max_bytes as usize),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    Ok(RotatingFile(Arc::new(Mutex::new(rot))))
}

/// Resolve a log file path against `base_dir` (the configured home_dir).
fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

/// A writer that silently drops output when no file is routed.
struct MaybeFile(Option<RotatingFile>);

impl Write for MaybeFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.0 {
            Some(w) => w.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.0 {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

/// Routes each event to the file of the longest matching target prefix,
/// or to the default file.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<RotatingFile>,
    by_prefix: Vec<(String, RotatingFile)>,
}

impl FileRouter {
    fn build(cfg: &LoggingConfig, base_dir: &Path) -> Self {
        let mut router = FileRouter::default();
        for (name, section) in cfg {
            if section.file.trim().is_empty() {
                continue;
            }
            let path = resolve_log_path(&section.file, base_dir);
            match open_rotating(&path, section) {
                Ok(file) if name == "default" => router.default = Some(file),
                Ok(file) => router.by_prefix.push((name.clone(), file)),
                Err(e) => eprintln!(
                    "failed to open log file for '{}': {} ({})",
                    name,
                    path.display(),
                    e
                ),
            }
        }
        router
            .by_prefix
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        router
    }

    fn route(&self, target: &str) -> Option<RotatingFile> {
        self.by_prefix
            .iter()
            .find(|(prefix, _)| matches_target(target, prefix))
            .map(|(_, f)| f.clone())
            .or_else(|| self.default.clone())
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = MaybeFile;

    fn make_writer(&'a self) -> Self::Writer {
        MaybeFile(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        MaybeFile(self.route(meta.target()))
    }
}

// -------- filters built from sections --------

fn explicit_targets(cfg: &LoggingConfig) -> Vec<String> {
    let mut names: Vec<String> = cfg.keys().filter(|k| *k != "default").cloned().collect();
    names.sort();
    names
}

fn console_targets(cfg: &LoggingConfig) -> tracing_subscriber::filter::Targets {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::filter::Targets;

    cfg.iter()
        .filter(|(name, _)| *name != "default")
        .filter_map(|(name, s)| {
            parse_tracing_level(&s.console_level).map(|l| (name.clone(), LevelFilter::from_level(l)))
        })
        .fold(Targets::new().with_default(LevelFilter::OFF), |t, (name, level)| {
            t.with_target(name, level)
        })
}

fn file_targets(cfg: &LoggingConfig) -> tracing_subscriber::filter::Targets {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::filter::Targets;

    cfg.iter()
        .filter(|(name, s)| *name != "default" && !s.file.trim().is_empty())
        .filter_map(|(name, s)| {
            parse_tracing_level(&s.file_level).map(|l| (name.clone(), LevelFilter::from_level(l)))
        })
        .fold(Targets::new().with_default(LevelFilter::OFF), |t, (name, level)| {
            t.with_target(name, level)
        })
}

// -------- public init --------

/// Install the global tracing subscriber described by `cfg`.
///
/// Console output goes to stderr (stdout belongs to command output). Sections
/// with a `file` also get a JSON layer written through a rotating file.
/// Relative file paths are resolved against `base_dir`. Calling this twice
/// is harmless: the second subscriber is not installed.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    use tracing_subscriber::{prelude::*, Registry};

    // Bridge `log` → `tracing` before installing the subscriber
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        init_default_logging();
        return;
    }

    let ansi = std::io::stderr().is_terminal();
    let explicit = explicit_targets(cfg);
    let default_section = cfg.get("default");
    let router = FileRouter::build(cfg, base_dir);

    let console_explicit = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_targets(cfg));

    let console_rest = default_section
        .and_then(|s| parse_tracing_level(&s.console_level))
        .map(|level| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(ansi)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_filter(rest_filter(&explicit, level))
        });

    let file_explicit = (!router.by_prefix.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router.clone())
            .with_filter(file_targets(cfg))
    });

    let file_rest = default_section
        .filter(|_| router.default.is_some())
        .and_then(|s| parse_tracing_level(&s.file_level))
        .map(|level| {
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(router.clone())
                .with_filter(rest_filter(&explicit, level))
        });

    let _ = Registry::default()
        .with(console_explicit)
        .with(console_rest)
        .with(file_explicit)
        .with(file_rest)
        .try_init();
}

fn init_default_logging() {
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .try_init();
}

// =================== tests ===================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_logging_config;
    use std::fs;
    use tempfile::tempdir;

    fn section(file: &str) -> Section {
        Section {
            console_level: "info".into(),
            file: file.into(),
            file_level: "debug".into(),
            max_backups: Some(2),
            max_size_mb: Some(1),
        }
    }

    #[test]
    fn test_logging_level_parsing() {
        assert_eq!(parse_tracing_level("trace"), Some(Level::TRACE));
        assert_eq!(parse_tracing_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_tracing_level("Warn"), Some(Level::WARN));
        assert_eq!(parse_tracing_level("off"), None);
        assert_eq!(parse_tracing_level("none"), None);
        assert_eq!(parse_tracing_level("loud"), Some(Level::INFO));
    }

    #[test]
    fn test_target_prefix_matching() {
        assert!(matches_target("listing_engine", "listing_engine"));
        assert!(matches_target("listing_engine::engine", "listing_engine"));
        assert!(!matches_target("listing_engine_ext", "listing_engine"));
        assert!(!matches_target("listing", "listing_engine"));
    }

    #[test]
    fn test_log_paths_resolved_against_home_dir() {
        let tmp = tempdir().unwrap();
        let resolved = resolve_log_path("logs/engine.log", tmp.path());
        assert!(resolved.starts_with(tmp.path()));
        assert!(resolved.ends_with("logs/engine.log"));

        let abs = tmp.path().join("abs.log");
        assert_eq!(resolve_log_path(&abs.to_string_lossy(), Path::new("/elsewhere")), abs);
    }

    #[test]
    fn test_rotating_file_creates_parent_and_writes() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested/dir/catalog.log");

        let mut file = open_rotating(&path, &section("unused")).unwrap();
        file.write_all(b"{\"msg\":\"hello\"}\n").unwrap();
        file.flush().unwrap();

        assert!(path.parent().unwrap().is_dir());
        assert!(fs::read_to_string(&path).unwrap().contains("hello"));
    }

    #[test]
    fn test_router_prefers_longest_prefix() {
        let tmp = tempdir().unwrap();
        let mut cfg = default_logging_config();
        cfg.insert("default".into(), section("logs/all.log"));
        cfg.insert("listing_engine".into(), section("logs/engine.log"));
        cfg.insert("listing_engine::facet".into(), section("logs/facet.log"));
        cfg.insert("catalog_cli".into(), section(""));

        let router = FileRouter::build(&cfg, tmp.path());
        assert!(router.default.is_some());
        assert_eq!(router.by_prefix.len(), 2, "sections without a file get no writer");
        assert_eq!(router.by_prefix[0].0, "listing_engine::facet");

        let write_via = |target: &str, line: &[u8]| {
            let mut w = MaybeFile(router.route(target));
            w.write_all(line).unwrap();
            w.flush().unwrap();
        };
        write_via("listing_engine::facet", b"facet\n");
        write_via("listing_engine::engine", b"engine\n");
        write_via("catalog_cli", b"cli\n");

        let read = |name: &str| fs::read_to_string(tmp.path().join("logs").join(name)).unwrap();
        assert_eq!(read("facet.log"), "facet\n");
        assert_eq!(read("engine.log"), "engine\n");
        assert_eq!(read("all.log"), "cli\n");
    }

    #[test]
    fn test_router_without_files_drops_output() {
        let cfg = default_logging_config();
        let router = FileRouter::build(&cfg, Path::new("/nonexistent"));
        assert!(router.default.is_none() && router.by_prefix.is_empty());
        let mut w = MaybeFile(router.route("anything"));
        assert_eq!(w.write(b"dropped").unwrap(), 7);
    }

    #[test]
    fn test_explicit_targets_skip_default() {
        let mut cfg = default_logging_config();
        cfg.insert("listing_engine".into(), section(""));
        assert_eq!(explicit_targets(&cfg), vec!["listing_engine".to_string()]);
    }
}
