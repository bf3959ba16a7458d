use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::demux::table::FieldDescriptorTable;
use crate::layout::{preset, DeviceLayout};
use crate::logging::LogLevel;

/// Which strategies the check runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyChoice {
    All,
    Static,
    Dynamic,
    Parallel,
}

/// Check options that can be set via CLI
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOptions {
    pub records: usize,
    pub workers: usize,
    pub strategy: StrategyChoice,
    /// Built-in layout name, used when no layout file is given
    pub preset: String,
    pub layout_file: Option<PathBuf>,
    pub seed: u64,
    pub log_level: LogLevel,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            records: 1_000_000,
            workers: default_workers(),
            strategy: StrategyChoice::All,
            preset: "mouse".to_string(),
            layout_file: None,
            seed: 0x5EED,
            log_level: LogLevel::Warning,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Parse a record count, accepting `k` and `m` suffixes (e.g. "250k", "1M")
pub fn parse_record_count(s: &str) -> Result<usize> {
    let s = s.trim();
    let (digits, scale) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 1_000),
        Some((i, 'm' | 'M')) => (&s[..i], 1_000_000),
        _ => (s, 1),
    };
    let count: usize = digits
        .replace('_', "")
        .parse()
        .context("Invalid record count")?;
    let count = count
        .checked_mul(scale)
        .context("Record count too large")?;
    if count == 0 {
        anyhow::bail!("Record count must be positive");
    }
    Ok(count)
}

/// Parse a worker count; `auto` uses every available core
pub fn parse_workers(s: &str) -> Result<usize> {
    if s.eq_ignore_ascii_case("auto") {
        return Ok(default_workers());
    }
    let workers: usize = s.parse().context("Invalid worker count")?;
    if workers == 0 {
        anyhow::bail!("Worker count must be positive");
    }
    Ok(workers)
}

/// Parse a strategy selection (all, static, dynamic, parallel)
pub fn parse_strategy(s: &str) -> Result<StrategyChoice> {
    match s.to_lowercase().as_str() {
        "all" => Ok(StrategyChoice::All),
        "static" => Ok(StrategyChoice::Static),
        "dynamic" => Ok(StrategyChoice::Dynamic),
        "parallel" => Ok(StrategyChoice::Parallel),
        _ => anyhow::bail!(
            "Invalid strategy: {}. Valid options: all, static, dynamic, parallel",
            s
        ),
    }
}

/// Load a layout file and validate it into a table
pub fn load_layout(path: &Path) -> Result<(DeviceLayout, FieldDescriptorTable)> {
    let layout = DeviceLayout::load(path)
        .with_context(|| format!("Failed to load layout {}", path.display()))?;
    let table = layout
        .build_table()
        .with_context(|| format!("Layout '{}' is invalid", layout.name))?;
    Ok((layout, table))
}

/// Resolve the layout the options select: the file if given, else the preset
pub fn select_layout(opts: &CheckOptions) -> Result<(DeviceLayout, FieldDescriptorTable)> {
    if let Some(path) = &opts.layout_file {
        return load_layout(path);
    }
    let layout = preset(&opts.preset).with_context(|| {
        format!(
            "Unknown layout preset: {}. Valid options: mouse, gamepad",
            opts.preset
        )
    })?;
    let table = layout
        .build_table()
        .with_context(|| format!("Preset '{}' is invalid", layout.name))?;
    Ok((layout, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_record_count() {
        assert_eq!(parse_record_count("1000").unwrap(), 1000);
        assert_eq!(parse_record_count("250k").unwrap(), 250_000);
        assert_eq!(parse_record_count("1M").unwrap(), 1_000_000);
        assert_eq!(parse_record_count("1_000").unwrap(), 1000);
        assert!(parse_record_count("0").is_err());
        assert!(parse_record_count("lots").is_err());
        assert!(parse_record_count("k").is_err());
    }

    #[test]
    fn test_parse_workers() {
        assert_eq!(parse_workers("4").unwrap(), 4);
        assert!(parse_workers("auto").unwrap() >= 1);
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("-2").is_err());
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(parse_strategy("static").unwrap(), StrategyChoice::Static);
        assert_eq!(parse_strategy("DYNAMIC").unwrap(), StrategyChoice::Dynamic);
        assert!(parse_strategy("fast").is_err());
    }

    #[test]
    fn test_options_default() {
        let opts = CheckOptions::default();
        assert_eq!(opts.records, 1_000_000);
        assert_eq!(opts.strategy, StrategyChoice::All);
        assert!(opts.workers >= 1);
        assert!(opts.layout_file.is_none());
    }

    #[test]
    fn test_select_preset_and_file() {
        let (layout, table) = select_layout(&CheckOptions::default()).unwrap();
        assert_eq!(layout.name, "mouse");
        assert_eq!(table.len(), 11);

        let unknown = CheckOptions {
            preset: "wheel".to_string(),
            ..Default::default()
        };
        assert!(select_layout(&unknown).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = knob").unwrap();
        writeln!(file, "record_bits = 16").unwrap();
        writeln!(file, "field.angle = unsigned 0 12 float 0").unwrap();
        let from_file = CheckOptions {
            layout_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let (layout, table) = select_layout(&from_file).unwrap();
        assert_eq!(layout.name, "knob");
        assert_eq!(table.record_bytes(), 2);
    }

    #[test]
    fn test_invalid_layout_file_has_context() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name = broken").unwrap();
        writeln!(file, "record_bits = 8").unwrap();
        writeln!(file, "field.a = unsigned 6 4 uint 0").unwrap();
        let err = load_layout(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Layout 'broken' is invalid"));
    }
}
