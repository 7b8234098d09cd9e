use nu_ansi_term::Color;
use reedline::{Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus};
use std::{borrow::Cow, env, ffi::CStr};

/// Login name of the current user.
pub fn current_user() -> String {
    let pw = unsafe { libc::getpwuid(libc::getuid()) };
    if pw.is_null() {
        return "user".into();
    }
    unsafe { CStr::from_ptr((*pw).pw_name) }
        .to_string_lossy()
        .into_owned()
}

pub fn current_host() -> String {
    let mut buf = [0 as libc::c_char; 256];
    if unsafe { libc::gethostname(buf.as_mut_ptr(), buf.len()) } != 0 {
        return "localhost".into();
    }
    // gethostname may not terminate a truncated name
    buf[buf.len() - 1] = 0;
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

pub fn current_directory() -> String {
    env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "?".into())
}

/// Fill `{user}`, `{host}` and `{cwd}` in a prompt template.
pub fn render_template(template: &str, user: &str, host: &str, cwd: &str) -> String {
    template
        .replace("{user}", user)
        .replace("{host}", host)
        .replace("{cwd}", cwd)
}

pub struct PromptSystem {
    template: Option<String>,
}

impl PromptSystem {
    pub fn new(template: Option<String>) -> Self {
        Self { template }
    }

    /// The prompt text, uncoloured.
    pub fn plain(&self) -> String {
        let template = self.template.as_deref().unwrap_or("[{user}@{host}:{cwd}]$ ");
        render_template(template, &current_user(), &current_host(), &current_directory())
    }
}

impl Prompt for PromptSystem {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        if self.template.is_some() {
            return Cow::Owned(self.plain());
        }

        let who = Color::Green.bold().paint(format!("{}@{}", current_user(), current_host()));
        let cwd = Color::Blue.bold().paint(current_directory());
        Cow::Owned(format!("[{who}:{cwd}]$ "))
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed("> ")
    }

    fn render_prompt_history_search_indicator(&self, search: PromptHistorySearch) -> Cow<'_, str> {
        let prefix = match search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!("({prefix}reverse-search: {}) ", search.term))
    }
}
