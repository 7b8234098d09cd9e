use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{info, warn, LevelFilter};

const DEFAULT_CONFIG: &str = "\
# forksh configuration
# prompt = \"[{user}@{host}:{cwd}]$ \"
# history_size = 5000
# history_file = ~/.local/share/forksh/history
# log_file = ~/.local/share/forksh/forksh.log
# log_level = warn
# edit_mode = emacs
#startup
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Emacs,
    Vi,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub prompt: Option<String>,
    pub history_size: usize,
    pub history_file: PathBuf,
    pub log_file: PathBuf,
    pub log_level: LevelFilter,
    pub edit_mode: EditMode,
    pub startup: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data = data_dir();
        Self {
            prompt: None,
            history_size: 5000,
            history_file: data.join("history"),
            log_file: data.join("forksh.log"),
            log_level: LevelFilter::Warn,
            edit_mode: EditMode::Emacs,
            startup: vec![],
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("forksh")
}

//config file
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("forksh/forksh.conf"))
}

/// Load the default config file, writing a commented template on first run.
pub fn init() -> Config {
    let Some(path) = config_file_path() else {
        return Config::default();
    };

    if !path.exists() {
        if let Err(e) = write_default(&path) {
            warn!("could not create {}: {e:#}", path.display());
        }
    }

    load_or_default(&path)
}

fn write_default(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG).with_context(|| format!("writing {}", path.display()))
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    info!("loaded config from {}", path.display());
    Ok(parse_config(&content))
}

pub fn load_or_default(path: &Path) -> Config {
    load_config(path).unwrap_or_else(|e| {
        warn!("{e:#}");
        Config::default()
    })
}

fn expand_path(value: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(value).into_owned())
}

fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

pub fn parse_config(content: &str) -> Config {
    let mut config = Config::default();
    let mut in_startup = false;

    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(comment) = line.strip_prefix('#') {
            if comment.trim().eq_ignore_ascii_case("startup") {
                in_startup = true;
            }
            continue;
        }

        if in_startup {
            config.startup.push(line.to_string());
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            warn!("config: ignoring line {line:?}");
            continue;
        };
        let value = value.trim().trim_matches('"');

        match key.trim() {
            "prompt" => config.prompt = Some(value.to_string()),
            "history_size" => match value.parse() {
                Ok(n) => config.history_size = n,
                Err(_) => warn!("config: bad history_size {value:?}"),
            },
            "history_file" => config.history_file = expand_path(value),
            "log_file" => config.log_file = expand_path(value),
            "log_level" => match parse_level(value) {
                Some(level) => config.log_level = level,
                None => warn!("config: bad log_level {value:?}"),
            },
            "edit_mode" => match value {
                "emacs" => config.edit_mode = EditMode::Emacs,
                "vi" => config.edit_mode = EditMode::Vi,
                _ => warn!("config: bad edit_mode {value:?}"),
            },
            other => warn!("config: unknown key {other:?}"),
        }
    }
    config
}

/// Run the startup section through the sequencer.
pub fn run_startup(config: &Config) {
    for cmd_line in &config.startup {
        let status = crate::shell::exec(cmd_line);
        if status != 0 {
            warn!("startup command {cmd_line:?} exited with {status}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        assert_eq!(parse_config(""), Config::default());
        assert_eq!(parse_config(DEFAULT_CONFIG), Config::default());
    }

    #[test]
    fn reads_known_keys() {
        let config = parse_config(
            "prompt = \"{user}> \"\n\
             history_size = 10\n\
             log_level = DEBUG\n\
             edit_mode = vi\n\
             log_file = /tmp/forksh.log\n",
        );
        assert_eq!(config.prompt.as_deref(), Some("{user}> "));
        assert_eq!(config.history_size, 10);
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.edit_mode, EditMode::Vi);
        assert_eq!(config.log_file, PathBuf::from("/tmp/forksh.log"));
    }

    #[test]
    fn bad_values_keep_defaults() {
        let config = parse_config(
            "history_size = lots\nlog_level = loud\nedit_mode = ed\nnonsense\n",
        );
        assert_eq!(config, Config::default());
    }

    #[test]
    fn tilde_paths_are_expanded() {
        let config = parse_config("history_file = ~/hist");
        let home = dirs::home_dir().unwrap();
        assert_eq!(config.history_file, home.join("hist"));
    }

    #[test]
    fn startup_section_collects_commands() {
        let config = parse_config("log_level = off\n#startup\necho one\n# note\nls && pwd\n");
        assert_eq!(config.log_level, LevelFilter::Off);
        assert_eq!(config.startup, vec!["echo one", "ls && pwd"]);
    }
}
