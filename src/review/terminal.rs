//! Line-oriented review loop for a terminal.
//!
//! ```text
//! confirm [Y]  edit list [E]  cancel [C]: e
//! Which number to edit? 3
//! Enter new name (with extension) or leave blank to mark (missing): setup.exe
//! ```
//!
//! `e 3 setup.exe` does the same on one line.  End of input cancels.

use std::io::{self, BufRead, Write};

use super::{Command, ReviewError, ReviewSession, SessionState, Verb};

pub const PROMPT: &str = "confirm [Y]  edit list [E]  cancel [C]: ";
pub const INDEX_PROMPT: &str = "Which number to edit? ";
pub const NAME_PROMPT: &str = "Enter new name (with extension) or leave blank to mark (missing): ";

fn read_line<R: BufRead>(input: &mut R) -> io::Result<Option<String>> {
    let mut line = String::new();
    match input.read_line(&mut line)? {
        0 => Ok(None),
        _ => Ok(Some(line.trim_end_matches(['\r', '\n']).to_string())),
    }
}

fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> io::Result<Option<String>> {
    write!(out, "{prompt}")?;
    out.flush()?;
    read_line(input)
}

/// Drive `session` from `input` until it reaches a terminal state.
pub fn run<R: BufRead, W: Write>(
    session: &mut ReviewSession,
    mut input: R,
    mut out: W,
) -> io::Result<SessionState> {
    writeln!(out, "\nProposed names\n")?;
    write!(out, "{}", session.render())?;
    writeln!(out)?;

    while !session.state().is_terminal() {
        let Some(line) = ask(&mut input, &mut out, PROMPT)? else {
            return cancel(session, &mut out);
        };
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        let cmd = match Verb::parse(word) {
            None => continue,
            Some(Verb::Confirm) => Command::Confirm,
            Some(Verb::Cancel) => Command::Cancel,
            Some(Verb::Edit) => match read_edit(session, rest.trim(), &mut input, &mut out)? {
                EditInput::Command(cmd) => cmd,
                EditInput::Rejected => continue,
                EditInput::EndOfInput => return cancel(session, &mut out),
            },
        };

        match session.apply(cmd) {
            Ok(SessionState::Proposed) => {
                writeln!(out)?;
                write!(out, "{}", session.render())?;
                writeln!(out)?;
            }
            Ok(SessionState::Cancelled) => writeln!(out, "[!] Aborting.")?,
            Ok(SessionState::Confirmed) => {}
            Err(e) => writeln!(out, "[!] {e}")?,
        }
    }
    Ok(session.state())
}

fn cancel<W: Write>(session: &mut ReviewSession, out: &mut W) -> io::Result<SessionState> {
    writeln!(out)?;
    match session.cancel() {
        Ok(state) => {
            writeln!(out, "[!] Aborting.")?;
            Ok(state)
        }
        Err(ReviewError::Closed(state)) => Ok(state),
        Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
    }
}

enum EditInput {
    Command(Command),
    Rejected,
    EndOfInput,
}

fn read_edit<R: BufRead, W: Write>(
    session: &ReviewSession,
    inline:  &str,
    input:   &mut R,
    out:     &mut W,
) -> io::Result<EditInput> {
    let (index_text, inline_name) = if inline.is_empty() {
        match ask(input, out, INDEX_PROMPT)? {
            Some(t) => (t.trim().to_string(), None),
            None => return Ok(EditInput::EndOfInput),
        }
    } else {
        let (idx, name) = inline.split_once(char::is_whitespace).unwrap_or((inline, ""));
        let name = name.trim();
        (idx.to_string(), (!name.is_empty()).then(|| name.to_string()))
    };

    let Ok(index) = index_text.parse::<usize>() else {
        writeln!(out, "[!] Invalid index.")?;
        return Ok(EditInput::Rejected);
    };
    if !session.contains(index) {
        writeln!(out, "[!] Index not in list.")?;
        return Ok(EditInput::Rejected);
    }

    let name = match inline_name {
        Some(n) => n,
        None => match ask(input, out, NAME_PROMPT)? {
            Some(n) => n,
            None => return Ok(EditInput::EndOfInput),
        },
    };
    Ok(EditInput::Command(Command::Edit { index, name }))
}
