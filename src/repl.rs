use crate::{
    diagnostics::to_reports,
    language::{lexer::lex, token::TokenKind},
    references::Fetcher,
    runtime::Value,
    session::{Outcome, ScriptSession, SubmissionReport},
};
use rustyline::{error::ReadlineError, DefaultEditor};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

const PROMPT: &str = "prime> ";
const CONTINUATION: &str = "  ...> ";
const HISTORY_FILE: &str = ".prime_repl_history";

/// What one read from a [`LineSource`] produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Ctrl-C: drop the pending input and prompt again.
    Interrupted,
    Eof,
}

/// Where the loop gets its input from.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> io::Result<Line>;

    fn add_history(&mut self, _entry: &str) {}
}

/// Terminal input with line editing and history kept in the home directory.
pub struct Editor {
    editor: DefaultEditor,
    history: PathBuf,
}

impl Editor {
    pub fn new() -> rustyline::Result<Self> {
        let mut editor = DefaultEditor::new()?;
        let history = history_path();
        let _ = editor.load_history(&history);
        Ok(Self { editor, history })
    }

    pub fn save_history(&mut self) {
        if let Err(error) = self.editor.save_history(&self.history) {
            tracing::debug!(
                target: "repl",
                %error,
                path = %self.history.display(),
                "history not saved"
            );
        }
    }
}

impl LineSource for Editor {
    fn read_line(&mut self, prompt: &str) -> io::Result<Line> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Line::Text(line)),
            Err(ReadlineError::Interrupted) => Ok(Line::Interrupted),
            Err(ReadlineError::Eof) => Ok(Line::Eof),
            Err(ReadlineError::Io(error)) => Err(error),
            Err(other) => Err(io::Error::other(other)),
        }
    }

    fn add_history(&mut self, entry: &str) {
        let _ = self.editor.add_history_entry(entry);
    }
}

fn history_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(HISTORY_FILE),
        None => PathBuf::from(HISTORY_FILE),
    }
}

/// Plain lines from a reader, for piped input. Prompts are not shown.
pub struct ScriptedLines<R> {
    lines: io::Lines<R>,
}

impl<R: BufRead> ScriptedLines<R> {
    pub fn new(input: R) -> Self {
        Self {
            lines: input.lines(),
        }
    }
}

impl<R: BufRead> LineSource for ScriptedLines<R> {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Line> {
        Ok(match self.lines.next().transpose()? {
            Some(line) => Line::Text(line),
            None => Line::Eof,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Vars,
    Reset,
    Help,
    Quit,
}

impl Command {
    /// `None` when `line` is not a command at all.
    pub fn parse(line: &str) -> Option<Result<Self, String>> {
        let name = line.trim().strip_prefix(':')?;
        Some(match name {
            "vars" => Ok(Command::Vars),
            "reset" => Ok(Command::Reset),
            "help" | "h" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command `:{other}`, try `:help`")),
        })
    }
}

/// Whether `source` can be submitted as is. Open brackets, strings or block
/// comments ask for another line.
pub fn is_complete(source: &str) -> bool {
    match lex(source) {
        Ok(tokens) => {
            let depth = tokens.iter().fold(0i64, |depth, token| match token.kind {
                TokenKind::LParen | TokenKind::LBrace | TokenKind::LBracket => depth + 1,
                TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => depth - 1,
                _ => depth,
            });
            depth <= 0
        }
        Err(errors) => !errors
            .iter()
            .any(|error| error.message.starts_with("Unterminated")),
    }
}

/// Prints one submission's results: output and value to `out`,
/// diagnostics and failures to `err`.
pub fn print_report(
    name: &str,
    source: &str,
    report: &SubmissionReport,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    for line in &report.output {
        writeln!(out, "{line}")?;
    }
    for diagnostic in to_reports(name, source, &report.diagnostics) {
        writeln!(err, "{diagnostic:?}")?;
    }
    if let Outcome::Executed { value } = &report.outcome {
        if !matches!(value, Value::Unit) {
            writeln!(out, "{}", value.repr())?;
        }
    }
    if let Some(failure) = report.failure() {
        writeln!(err, "{failure}")?;
    }
    Ok(())
}

/// Reads submissions from `input` until end of input or `:quit`.
pub async fn run<F: Fetcher>(
    session: &mut ScriptSession<F>,
    input: &mut impl LineSource,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() { PROMPT } else { CONTINUATION };
        let line = match input.read_line(prompt)? {
            Line::Text(line) => line,
            Line::Interrupted => {
                buffer.clear();
                continue;
            }
            Line::Eof => break,
        };

        if buffer.is_empty() {
            match Command::parse(&line) {
                Some(Ok(Command::Quit)) => break,
                Some(Ok(command)) => {
                    input.add_history(line.trim());
                    run_command(session, command, out)?;
                    continue;
                }
                Some(Err(message)) => {
                    writeln!(err, "{message}")?;
                    continue;
                }
                None if line.trim().is_empty() => continue,
                None => {}
            }
        }

        buffer.push_str(&line);
        buffer.push('\n');
        if !is_complete(&buffer) {
            continue;
        }

        let source = std::mem::take(&mut buffer);
        input.add_history(source.trim_end());
        let report = session.submit(&source).await;
        let ordinal = report.submission.unwrap_or(session.submission_index() + 1);
        print_report(&format!("Submission#{ordinal}"), &source, &report, out, err)?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

fn run_command<F: Fetcher>(
    session: &mut ScriptSession<F>,
    command: Command,
    out: &mut impl Write,
) -> io::Result<()> {
    match command {
        Command::Vars => {
            let variables = session.variables();
            if variables.is_empty() {
                writeln!(out, "(no variables)")?;
            }
            for (name, value) in variables {
                writeln!(out, "{name} = {}", value.repr())?;
            }
        }
        Command::Reset => {
            session.reset();
            writeln!(out, "session reset")?;
        }
        Command::Help => {
            writeln!(out, ":vars   list session variables")?;
            writeln!(out, ":reset  forget every submission")?;
            writeln!(out, ":quit   leave")?;
        }
        Command::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        references::{ReferenceCache, StdlibFetcher},
        session::SessionOptions,
    };
    use std::{collections::VecDeque, sync::Arc};

    /// Replays typed lines and records the prompts it was shown.
    #[derive(Default)]
    struct Typed {
        lines: VecDeque<Line>,
        prompts: Vec<String>,
        history: Vec<String>,
    }

    impl Typed {
        fn new(lines: impl IntoIterator<Item = Line>) -> Self {
            Self {
                lines: lines.into_iter().collect(),
                ..Self::default()
            }
        }
    }

    impl LineSource for Typed {
        fn read_line(&mut self, prompt: &str) -> io::Result<Line> {
            self.prompts.push(prompt.to_string());
            Ok(self.lines.pop_front().unwrap_or(Line::Eof))
        }

        fn add_history(&mut self, entry: &str) {
            self.history.push(entry.to_string());
        }
    }

    fn text(line: &str) -> Line {
        Line::Text(line.to_string())
    }

    fn session() -> ScriptSession<StdlibFetcher> {
        let cache = ReferenceCache::new(StdlibFetcher, StdlibFetcher::locations());
        ScriptSession::new(Arc::new(cache), SessionOptions::default())
    }

    #[tokio::test]
    async fn interrupt_discards_pending_input() {
        let mut session = session();
        let mut input = Typed::new([
            text("fn f(x) {"),
            Line::Interrupted,
            text("let a = 2;"),
            text(":vars"),
            text("[a,"),
            text(" 3]"),
            Line::Eof,
            text("never read"),
        ]);
        let (mut out, mut err) = (Vec::new(), Vec::new());
        run(&mut session, &mut input, &mut out, &mut err)
            .await
            .expect("repl runs");

        assert_eq!(String::from_utf8(out).expect("utf8"), "a = 2\n[2, 3]\n\n");
        assert_eq!(
            input.prompts,
            [PROMPT, CONTINUATION, PROMPT, PROMPT, PROMPT, CONTINUATION, PROMPT]
        );
        assert_eq!(input.history, ["let a = 2;", ":vars", "[a,\n 3]"]);
        assert_eq!(input.lines, [text("never read")]);
        assert_eq!(session.submission_index(), 2);
    }

    #[tokio::test]
    async fn scripted_input_stops_at_quit() {
        let mut session = session();
        let mut input = ScriptedLines::new("let a = 1;\na + 1\n:quit\na + 2\n".as_bytes());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        run(&mut session, &mut input, &mut out, &mut err)
            .await
            .expect("repl runs");

        assert_eq!(String::from_utf8(out).expect("utf8"), "2\n\n");
        assert_eq!(session.submission_index(), 2);
    }

    #[test]
    fn waits_for_closing_brackets_and_strings() {
        assert!(!is_complete("fn f(x) {\n"));
        assert!(!is_complete("let s = \"abc\n"));
        assert!(is_complete("fn f(x) { x }\n"));
        assert!(is_complete("let x = );\n"));
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse(":vars"), Some(Ok(Command::Vars)));
        assert_eq!(Command::parse("  :q "), Some(Ok(Command::Quit)));
        assert!(matches!(Command::parse(":nope"), Some(Err(_))));
        assert_eq!(Command::parse("x = 1;"), None);
    }
}
