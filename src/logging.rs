use std::{fs, path::Path};

use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};

/// Send log records to `path`. Logs never go to the terminal, where they
/// would mix with command output.
/// Best-effort: if the file cannot be opened, logging stays disabled.
pub fn init(path: &Path, level: LevelFilter) {
    if level == LevelFilter::Off {
        return;
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let Ok(file) = fs::OpenOptions::new().create(true).append(true).open(path) else {
        return;
    };

    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();
    let _ = WriteLogger::init(level, config, file);
}
