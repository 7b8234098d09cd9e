use std::{
    collections::BTreeSet,
    env, fs,
    os::unix::fs::PermissionsExt,
    path::PathBuf,
};
use reedline::{Completer, Span, Suggestion};

/// Completes program names at the start of a unit and file names elsewhere
pub struct CommandCompleter {
    commands: BTreeSet<String>,
}

impl CommandCompleter {
    pub fn new() -> Self {
        Self { commands: Self::load_commands() }
    }

    /// Executables found on PATH, plus the `exit` keyword
    pub fn load_commands() -> BTreeSet<String> {
        let mut commands = BTreeSet::new();

        if let Some(path_var) = env::var_os("PATH") {
            env::split_paths(&path_var)
                .flat_map(|dir| fs::read_dir(dir).ok().into_iter().flatten())
                .flatten()
                .filter(|entry| {
                    entry
                        .metadata()
                        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
                        .unwrap_or(false)
                })
                .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
                .for_each(|cmd| {
                    commands.insert(cmd);
                });
        }

        commands.insert("exit".to_string());
        commands
    }

    fn complete_commands(&self, current: &str, span: Span) -> Vec<Suggestion> {
        self.commands
            .iter()
            .filter(|cmd| cmd.starts_with(current))
            .map(|cmd| Suggestion {
                value: cmd.clone(),
                span,
                append_whitespace: true,
                ..Default::default()
            })
            .collect()
    }

    fn complete_files(&self, current: &str, span: Span) -> Vec<Suggestion> {
        let last_slash = current.rfind('/').map_or(0, |i| i + 1);
        let (base, partial) = current.split_at(last_slash);

        let dir = if base.is_empty() {
            PathBuf::from(".")
        } else {
            PathBuf::from(base)
        };

        let Ok(reader) = fs::read_dir(&dir) else {
            return Vec::new();
        };
        let partial_span = Span::new(span.start + last_slash, span.end);

        let mut suggestions: Vec<Suggestion> = reader
            .flatten()
            .filter_map(|entry| {
                let file_name = entry.file_name();
                let name = file_name.to_str()?;

                if !partial.starts_with('.') && name.starts_with('.') {
                    return None;
                }
                // Whitespace always splits a token, so such names can't be typed
                if !name.starts_with(partial) || name.contains(char::is_whitespace) {
                    return None;
                }

                let is_dir = entry.path().is_dir();
                Some(Suggestion {
                    value: if is_dir { format!("{name}/") } else { name.to_string() },
                    span: partial_span,
                    append_whitespace: !is_dir,
                    ..Default::default()
                })
            })
            .collect();
        suggestions.sort_by(|a, b| a.value.cmp(&b.value));
        suggestions
    }
}

impl Default for CommandCompleter {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the word at `word_start` is the first word of a unit.
fn at_command_position(line: &str, word_start: usize) -> bool {
    let before = line[..word_start].trim_end();
    before.is_empty() || before.ends_with(';') || before.ends_with("&&") || before.ends_with('|')
}

impl Completer for CommandCompleter {
    fn complete(&mut self, line: &str, pos: usize) -> Vec<Suggestion> {
        let line = &line[..pos];
        let word_start = line
            .rfind([' ', '\t', ';', '|'])
            .map_or(0, |i| i + 1);
        let span = Span::new(word_start, pos);
        let current_word = &line[word_start..];

        if at_command_position(line, word_start) && !current_word.contains('/') {
            return self.complete_commands(current_word, span);
        }
        self.complete_files(current_word, span)
    }
}

pub fn create_default_completer() -> Box<dyn Completer> {
    Box::new(CommandCompleter::new())
}
