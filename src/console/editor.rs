use crate::console::command::{
    AT_PREFIX, HELP_COMMAND, HELP_COMMAND_SHORT, QUIT_COMMAND, QUIT_COMMAND_SHORT,
};
use crossterm::style::{Color, Stylize};
use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::HistoryHinter;
use rustyline::history::MemHistory;
use rustyline::validate::MatchingBracketValidator;
use rustyline::{CompletionType, Config, Context, Editor};
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;

/// Console keywords as `(name, alias)`.
const KEYWORDS: &[(&str, &str)] = &[
    (HELP_COMMAND, HELP_COMMAND_SHORT),
    (QUIT_COMMAND, QUIT_COMMAND_SHORT),
];

/// Keywords for the first word, source files after `@`.
///
/// Anything else typed at the prompt is an expression of the debuggee, nothing to
/// complete locally.
pub struct InputCompleter {
    files: FilenameCompleter,
}

impl InputCompleter {
    fn keywords(line: &str) -> Vec<Pair> {
        KEYWORDS
            .iter()
            .filter(|(name, _)| !line.is_empty() && name.starts_with(line))
            .map(|(name, alias)| Pair {
                display: format!("{name} ({})", alias.bold()),
                replacement: name.to_string(),
            })
            .collect()
    }
}

impl Completer for InputCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        match line.strip_prefix(AT_PREFIX) {
            // `@file:line:col`, only the file part is completed
            Some(location) if !location.contains(':') => {
                let at = pos.saturating_sub(AT_PREFIX.len());
                let (start, files) = self.files.complete(location, at, ctx)?;
                Ok((start + AT_PREFIX.len(), files))
            }
            Some(_) => Ok((pos, vec![])),
            None => Ok((0, Self::keywords(&line[..pos]))),
        }
    }
}

#[derive(Helper, Completer, Hinter, Validator)]
pub struct ConsoleHelper {
    #[rustyline(Completer)]
    completer: InputCompleter,
    #[rustyline(Hinter)]
    hinter: HistoryHinter,
    #[rustyline(Validator)]
    brackets: MatchingBracketValidator,
    prompt: String,
}

impl Highlighter for ConsoleHelper {
    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        default: bool,
    ) -> Cow<'b, str> {
        if default {
            Cow::Borrowed(self.prompt.as_str())
        } else {
            Cow::Borrowed(prompt)
        }
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(hint.with(Color::DarkGrey).to_string())
    }
}

pub fn create_editor(prompt: &str) -> anyhow::Result<Editor<ConsoleHelper, MemHistory>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .build();

    let helper = ConsoleHelper {
        completer: InputCompleter {
            files: FilenameCompleter::new(),
        },
        hinter: HistoryHinter {},
        brackets: MatchingBracketValidator::new(),
        prompt: prompt.with(Color::DarkGreen).to_string(),
    };

    let mut editor = Editor::with_history(config, MemHistory::new())?;
    editor.set_helper(Some(helper));
    Ok(editor)
}
