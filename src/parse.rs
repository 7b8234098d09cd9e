use std::fmt;

// Redirection targets a command can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectType {
    Stdout,       // > or 1>
    StdoutAppend, // >> or 1>>
    Stderr,       // 2>
    StderrAppend, // 2>>
}

impl RedirectType {
    pub fn is_append(self) -> bool {
        matches!(self, Self::StdoutAppend | Self::StderrAppend)
    }

    pub fn is_stderr(self) -> bool {
        matches!(self, Self::Stderr | Self::StderrAppend)
    }
}

static REDIRECTS: &[(&str, RedirectType)] = &[
    (">", RedirectType::Stdout),
    ("1>", RedirectType::Stdout),
    (">>", RedirectType::StdoutAppend),
    ("1>>", RedirectType::StdoutAppend),
    ("2>", RedirectType::Stderr),
    ("2>>", RedirectType::StderrAppend),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectType,
    pub path: String,
}

/// One command unit after tokenizing: program arguments plus at most one
/// target per output stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub args: Vec<String>,
    pub stdout: Option<Redirect>,
    pub stderr: Option<Redirect>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    MissingTarget(&'static str),
    NulByte(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTarget(op) => write!(f, "syntax error: missing target after '{op}'"),
            Self::NulByte(token) => write!(f, "syntax error: NUL byte in {token:?}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Strip every quote character, then trim spaces and tabs.
///
/// Quotes are removed wherever they appear; they do not group words.
pub fn clean_token(s: &str) -> String {
    let unquoted: String = s.chars().filter(|c| !matches!(c, '"' | '\'')).collect();
    unquoted.trim_matches([' ', '\t']).to_string()
}

/// Split on every occurrence of `delim`, normalizing each piece.
/// The trailing piece is always kept, even when empty.
pub fn split(s: &str, delim: &str) -> Vec<String> {
    s.split(delim).map(clean_token).collect()
}

/// Split a unit at its first `|`. Only one split point is honored;
/// further bars stay in the right-hand text.
pub fn split_pipe(s: &str) -> Option<(&str, &str)> {
    s.split_once('|')
}

fn redirect_type(token: &str) -> Option<(&'static str, RedirectType)> {
    REDIRECTS
        .iter()
        .find(|(op, _)| *op == token)
        .map(|(op, kind)| (*op, *kind))
}

/// Tokenize one command on whitespace and resolve its redirections.
///
/// A later redirection of the same stream replaces an earlier one.
pub fn parse_command(input: &str) -> Result<Command, ParseError> {
    let mut cmd = Command::default();
    let mut tokens = input.split_whitespace();

    while let Some(token) = tokens.next() {
        if token.contains('\0') {
            return Err(ParseError::NulByte(token.to_string()));
        }

        let Some((op, kind)) = redirect_type(token) else {
            cmd.args.push(clean_token(token));
            continue;
        };

        let target = tokens.next().ok_or(ParseError::MissingTarget(op))?;
        if target.contains('\0') {
            return Err(ParseError::NulByte(target.to_string()));
        }
        let redirect = Redirect { kind, path: clean_token(target) };
        if kind.is_stderr() {
            cmd.stderr = Some(redirect);
        } else {
            cmd.stdout = Some(redirect);
        }
    }

    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_token_strips_quotes_anywhere() {
        assert_eq!(clean_token("he\"llo"), "hello");
        assert_eq!(clean_token("  'a b'\t"), "a b");
        assert_eq!(clean_token("\"'\"'"), "");
        assert_eq!(clean_token(" \t "), "");
    }

    #[test]
    fn clean_token_is_idempotent() {
        for s in ["  \"x\" ", "a'b'c", "\t\t", "plain", " ' spaced ' "] {
            let once = clean_token(s);
            assert_eq!(clean_token(&once), once, "input: {s:?}");
        }
    }

    #[test]
    fn clean_token_keeps_inner_whitespace() {
        assert_eq!(clean_token(" echo   hi "), "echo   hi");
    }

    #[test]
    fn split_keeps_trailing_and_empty_pieces() {
        assert_eq!(split("a; b ;c", ";"), vec!["a", "b", "c"]);
        assert_eq!(split("a;", ";"), vec!["a", ""]);
        assert_eq!(split(";;", ";"), vec!["", "", ""]);
        assert_eq!(split(" whole ", "&&"), vec!["whole"]);
    }

    #[test]
    fn split_is_leftmost_non_overlapping() {
        assert_eq!(split("a&&&b", "&&"), vec!["a", "&b"]);
        assert_eq!(split("true && false&&echo", "&&"), vec!["true", "false", "echo"]);
    }

    #[test]
    fn split_rejoins_to_normalized_input() {
        let line = "echo a && echo b&&echo c";
        let joined = split(line, "&&").join("&&");
        assert_eq!(joined, "echo a&&echo b&&echo c");
    }

    #[test]
    fn split_pipe_uses_first_bar_only() {
        assert_eq!(split_pipe("a | b | c"), Some(("a ", " b | c")));
        assert_eq!(split_pipe("no pipe"), None);
    }

    #[test]
    fn parse_plain_arguments() {
        let cmd = parse_command("  echo 'hello'   \"world\" ").unwrap();
        assert_eq!(cmd.args, vec!["echo", "hello", "world"]);
        assert_eq!(cmd.stdout, None);
        assert_eq!(cmd.stderr, None);
    }

    #[test]
    fn parse_all_redirect_operators() {
        let cases = [
            (">", RedirectType::Stdout),
            ("1>", RedirectType::Stdout),
            (">>", RedirectType::StdoutAppend),
            ("1>>", RedirectType::StdoutAppend),
            ("2>", RedirectType::Stderr),
            ("2>>", RedirectType::StderrAppend),
        ];
        for (op, kind) in cases {
            let cmd = parse_command(&format!("ls {op} out.txt -l")).unwrap();
            assert_eq!(cmd.args, vec!["ls", "-l"], "op: {op}");
            let redirect = if kind.is_stderr() { cmd.stderr } else { cmd.stdout };
            assert_eq!(redirect, Some(Redirect { kind, path: "out.txt".into() }), "op: {op}");
        }
    }

    #[test]
    fn later_redirect_wins() {
        let cmd = parse_command("cmd > a >> b 2> c 2>> d").unwrap();
        assert_eq!(cmd.stdout, Some(Redirect { kind: RedirectType::StdoutAppend, path: "b".into() }));
        assert_eq!(cmd.stderr, Some(Redirect { kind: RedirectType::StderrAppend, path: "d".into() }));
    }

    #[test]
    fn redirect_target_is_normalized() {
        let cmd = parse_command("echo hi > \"out.txt\"").unwrap();
        assert_eq!(cmd.stdout.unwrap().path, "out.txt");
    }

    #[test]
    fn missing_target_is_an_error() {
        assert_eq!(parse_command("echo hi >"), Err(ParseError::MissingTarget(">")));
        assert_eq!(parse_command("echo hi 2>>"), Err(ParseError::MissingTarget("2>>")));
    }

    #[test]
    fn bar_in_command_text_is_literal() {
        let cmd = parse_command(" b | c").unwrap();
        assert_eq!(cmd.args, vec!["b", "|", "c"]);
    }

    #[test]
    fn quote_only_tokens_become_empty_args() {
        let cmd = parse_command("'' \"\" ls").unwrap();
        assert_eq!(cmd.args, vec!["", "", "ls"]);
        assert!(parse_command("> f").unwrap().args.is_empty());
    }
}
