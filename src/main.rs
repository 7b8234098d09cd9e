mod completions;
mod config;
mod logging;
mod parse;
mod process_exec;
mod prompt;
mod shell;

use std::{
    io::{self, BufRead, IsTerminal},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use nu_ansi_term::{Color, Style};
use reedline::{
    default_emacs_keybindings, default_vi_insert_keybindings, default_vi_normal_keybindings,
    ColumnarMenu, DefaultHinter, EditCommand, EditMode, Emacs, FileBackedHistory, KeyCode,
    KeyModifiers, MenuBuilder, Reedline, ReedlineEvent, ReedlineMenu, Signal, Vi,
};

use crate::{
    completions::create_default_completer,
    config::Config,
    prompt::PromptSystem,
};

const EXIT_KEYWORD: &str = "exit";

#[derive(Parser, Debug)]
#[command(version, about = "A small fork/exec shell supporting ;, && and |")]
struct Cli {
    /// Run one command line and exit with its status
    #[arg(short = 'c', value_name = "COMMAND")]
    command: Option<String>,

    /// Read configuration from this file
    #[arg(long, value_name = "PATH", conflicts_with = "no_config")]
    config: Option<PathBuf>,

    /// Skip the configuration file and its startup commands
    #[arg(long)]
    no_config: bool,

    /// Override the configured log level
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<LevelFilter>,
}

/// What the front end should do with one line of input.
#[derive(Debug, PartialEq, Eq)]
enum LineAction<'a> {
    Exit,
    Skip,
    Run(&'a str),
}

fn classify(line: &str) -> LineAction<'_> {
    match line {
        EXIT_KEYWORD => LineAction::Exit,
        "" => LineAction::Skip,
        _ => LineAction::Run(line),
    }
}

fn load_config(cli: &Cli, interactive: bool) -> Config {
    if cli.no_config {
        return Config::default();
    }
    match &cli.config {
        Some(path) => config::load_or_default(path),
        None if interactive => config::init(),
        None => config::config_file_path()
            .filter(|p| p.exists())
            .map(|p| config::load_or_default(&p))
            .unwrap_or_default(),
    }
}

// Statuses outside 0..=255 cannot be an exit code
fn exit_code(status: i32) -> u8 {
    u8::try_from(status).unwrap_or(1)
}

// Lines from a non-terminal stdin, no prompt. Bytes that are not UTF-8
// are replaced rather than ending the script.
fn run_script(mut input: impl BufRead) -> Result<i32> {
    let mut status = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).context("reading stdin")? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches('\n').trim_end_matches('\r');
        match classify(line) {
            LineAction::Exit => break,
            LineAction::Skip => continue,
            LineAction::Run(text) => status = shell::exec(text),
        }
    }
    Ok(status)
}

fn edit_mode(mode: config::EditMode) -> Box<dyn EditMode> {
    match mode {
        config::EditMode::Vi => Box::new(Vi::new(
            default_vi_insert_keybindings(),
            default_vi_normal_keybindings(),
        )),
        config::EditMode::Emacs => {
            let mut keybindings = default_emacs_keybindings();
            keybindings.add_binding(
                KeyModifiers::CONTROL,
                KeyCode::Char('c'),
                ReedlineEvent::Edit(vec![EditCommand::Clear]),
            );
            keybindings.add_binding(
                KeyModifiers::NONE,
                KeyCode::Tab,
                ReedlineEvent::UntilFound(vec![
                    ReedlineEvent::Menu("completion_menu".into()),
                    ReedlineEvent::MenuNext,
                ]),
            );
            keybindings.add_binding(
                KeyModifiers::SHIFT,
                KeyCode::BackTab,
                ReedlineEvent::UntilFound(vec![
                    ReedlineEvent::Menu("completion_menu".into()),
                    ReedlineEvent::MenuPrevious,
                ]),
            );
            Box::new(Emacs::new(keybindings))
        }
    }
}

fn run_interactive(cfg: &Config) -> Result<i32> {
    let prompt = PromptSystem::new(cfg.prompt.clone());

    if let Some(parent) = cfg.history_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let history = Box::new(
        FileBackedHistory::with_file(cfg.history_size, cfg.history_file.clone())
            .unwrap_or_else(|_| FileBackedHistory::default()),
    );

    let menu = ReedlineMenu::EngineCompleter(Box::new(
        ColumnarMenu::default()
            .with_name("completion_menu")
            .with_column_width(Some(20)),
    ));

    let mut editor = Reedline::create()
        .with_history(history)
        .with_completer(create_default_completer())
        .with_menu(menu)
        .with_hinter(Box::new(
            DefaultHinter::default()
                .with_style(Style::new().italic().fg(Color::Rgb(120, 120, 120)))
                .with_min_chars(1),
        ))
        .with_edit_mode(edit_mode(cfg.edit_mode));

    // The shell survives ^C and ^\; children restore the defaults
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_IGN);
        libc::signal(libc::SIGQUIT, libc::SIG_IGN);
    }

    let mut status = 0;
    loop {
        match editor.read_line(&prompt) {
            Ok(Signal::Success(buf)) => match classify(&buf) {
                LineAction::Exit => break,
                LineAction::Skip => continue,
                LineAction::Run(text) => status = shell::exec(text),
            },
            Ok(Signal::CtrlD) => break,
            Ok(_) => continue,
            Err(e) => return Err(e).context("reading line"),
        }
    }
    Ok(status)
}

fn run(cli: Cli) -> Result<i32> {
    let interactive = cli.command.is_none() && io::stdin().is_terminal();
    let cfg = load_config(&cli, interactive);
    logging::init(&cfg.log_file, cli.log_level.unwrap_or(cfg.log_level));
    info!("forksh starting (interactive: {interactive})");

    if let Some(line) = &cli.command {
        return Ok(match classify(line) {
            LineAction::Exit | LineAction::Skip => 0,
            LineAction::Run(text) => shell::exec(text),
        });
    }

    if interactive {
        config::run_startup(&cfg);
        run_interactive(&cfg)
    } else {
        run_script(io::stdin().lock())
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(status) => ExitCode::from(exit_code(status)),
        Err(e) => {
            eprintln!("forksh: {e:#}");
            ExitCode::FAILURE
        }
    }
}
