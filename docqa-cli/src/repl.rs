//! Interactive question loop.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use docqa_rag::{DEFAULT_HISTORY_LIMIT, DocumentId, LocalModelSize};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::app::App;

const HELP: &str = "\
Type a question to ask about your documents, or one of:
  /ingest <file> [title]   add a .pdf, .txt or .md file
  /books                   list your documents
  /delete <id>             remove a document
  /history [n]             show the last n questions and answers
  /model [small|medium|large]
                           show or switch the local model
  /help                    show this help
  /quit                    leave";

/// One line of input.
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Ask(&'a str),
    Ingest { path: &'a str, title: Option<&'a str> },
    Books,
    Delete(&'a str),
    History(Option<&'a str>),
    Model(Option<&'a str>),
    Help,
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Ask(line);
    };

    let (name, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
    let rest = rest.trim();
    let arg = (!rest.is_empty()).then_some(rest);
    match name {
        "ingest" | "upload" => match arg {
            Some(arg) => {
                let (path, title) = arg.split_once(char::is_whitespace).unwrap_or((arg, ""));
                let title = title.trim();
                Input::Ingest { path, title: (!title.is_empty()).then_some(title) }
            }
            None => Input::Unknown(line),
        },
        "books" => Input::Books,
        "delete" => arg.map_or(Input::Unknown(line), Input::Delete),
        "history" => Input::History(arg),
        "model" => Input::Model(arg),
        "help" | "start" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(line),
    }
}

pub async fn run(app: &App) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut out = std::io::stdout();
    writeln!(out, "{HELP}\n")?;

    loop {
        let line = match editor.readline("docqa> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let input = parse(&line);
        if input != Input::Empty {
            let _ = editor.add_history_entry(line.as_str());
        }

        let result: Result<()> = match input {
            Input::Empty => Ok(()),
            Input::Quit => break,
            Input::Help => writeln!(out, "{HELP}").map_err(Into::into),
            Input::Unknown(text) => {
                writeln!(out, "Unknown or incomplete command: {text}\n{HELP}").map_err(Into::into)
            }
            Input::Ask(question) => app.ask(question, true, false, &mut out).await,
            Input::Ingest { path, title } => {
                app.ingest(Path::new(path), title.map(str::to_string), &mut out).await
            }
            Input::Books => app.books(false, &mut out).await,
            Input::Delete(id) => match id.parse::<i64>() {
                Ok(id) => app.delete(&DocumentId::from(id), &mut out).await,
                Err(_) => {
                    writeln!(out, "Document ids are numbers; see /books.").map_err(Into::into)
                }
            },
            Input::History(limit) => match limit.map(str::parse::<usize>).transpose() {
                Ok(limit) => app.history(limit.unwrap_or(DEFAULT_HISTORY_LIMIT), &mut out).await,
                Err(_) => writeln!(out, "Usage: /history [count]").map_err(Into::into),
            },
            Input::Model(size) => match size.map(str::parse::<LocalModelSize>).transpose() {
                Ok(size) => app.model(size, &mut out).await,
                Err(e) => writeln!(out, "{e}").map_err(Into::into),
            },
        };

        if let Err(e) = result {
            writeln!(out, "Error: {e:#}")?;
        }
        out.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_text_is_a_question() {
        assert_eq!(parse("  Where did the cat sit? "), Input::Ask("Where did the cat sit?"));
        assert_eq!(parse("   "), Input::Empty);
    }

    #[test]
    fn commands_with_arguments() {
        assert_eq!(
            parse("/ingest books/moby.pdf"),
            Input::Ingest { path: "books/moby.pdf", title: None }
        );
        assert_eq!(
            parse("/ingest moby.pdf Moby Dick"),
            Input::Ingest { path: "moby.pdf", title: Some("Moby Dick") }
        );
        assert_eq!(parse("/delete 7"), Input::Delete("7"));
        assert_eq!(parse("/model"), Input::Model(None));
        assert_eq!(parse("/model large"), Input::Model(Some("large")));
        assert_eq!(parse("/books"), Input::Books);
        assert_eq!(parse("/history"), Input::History(None));
        assert_eq!(parse("/history 3"), Input::History(Some("3")));
        assert_eq!(parse("/quit"), Input::Quit);
    }

    #[test]
    fn incomplete_commands_are_reported() {
        assert_eq!(parse("/delete"), Input::Unknown("/delete"));
        assert_eq!(parse("/ingest"), Input::Unknown("/ingest"));
        assert_eq!(parse("/frobnicate"), Input::Unknown("/frobnicate"));
    }
}
