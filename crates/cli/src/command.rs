//! REPL command parsing.
//!
//! Plain lines are queries; lines starting with `:` are commands.

use lookahead_core::{SearchType, SortOrder};

/// Which anticipation signal a hover command simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Enter,
    Focus,
    TouchStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Query(String),
    Next,
    Prev,
    First,
    Last,
    Goto(u32),
    Hover(Signal, u32),
    Prefetch(u32),
    Type(SearchType),
    Sort(String),
    Order(SortOrder),
    PerPage(u32),
    Param { name: String, value: String },
    Stats,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command :{0} (try ?)")]
    Unknown(String),

    #[error(":{command} needs {expected}")]
    MissingArgument { command: String, expected: &'static str },

    #[error("invalid argument for :{command}: {value}")]
    InvalidArgument { command: String, value: String },
}

pub const HELP: &str = "\
<text>          search for <text> (submitted once typing settles)
:n / :p         next / previous page
:first / :last  first / last reachable page
:g N            go to page N
:h N  :f N  :t N  hover / focus / touch the link to page N
:prefetch N     warm page N now
:type T         issues | repositories | code | commits | users | topics | labels
:sort S         sort field (updated, created, stars, ...)
:order O        asc | desc
:per N          results per page (1-100)
:param K=V      extra endpoint parameter (empty V removes it)
:stats          cache statistics
:q              quit";

fn page_arg(command: &str, arg: Option<&str>) -> Result<u32, CommandError> {
    let value = arg.ok_or_else(|| CommandError::MissingArgument { command: command.into(), expected: "a page" })?;
    match value.parse::<u32>() {
        Ok(page) if page > 0 => Ok(page),
        _ => Err(CommandError::InvalidArgument { command: command.into(), value: value.into() }),
    }
}

fn text_arg<'a>(command: &str, arg: Option<&'a str>, expected: &'static str) -> Result<&'a str, CommandError> {
    arg.ok_or_else(|| CommandError::MissingArgument { command: command.into(), expected })
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line == "?" {
        return Ok(Some(Command::Help));
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Some(Command::Query(line.to_string())));
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_lowercase();
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());
    let invalid = |value: &str| CommandError::InvalidArgument { command: name.clone(), value: value.into() };

    let command = match name.as_str() {
        "n" | "next" => Command::Next,
        "p" | "prev" => Command::Prev,
        "first" => Command::First,
        "last" => Command::Last,
        "g" | "goto" => Command::Goto(page_arg(&name, arg)?),
        "h" | "hover" => Command::Hover(Signal::Enter, page_arg(&name, arg)?),
        "f" | "focus" => Command::Hover(Signal::Focus, page_arg(&name, arg)?),
        "t" | "touch" => Command::Hover(Signal::TouchStart, page_arg(&name, arg)?),
        "prefetch" => Command::Prefetch(page_arg(&name, arg)?),
        "type" => {
            let value = text_arg(&name, arg, "a search type")?;
            Command::Type(value.parse().map_err(|_| invalid(value))?)
        }
        "sort" => Command::Sort(text_arg(&name, arg, "a sort field")?.to_string()),
        "order" => {
            let value = text_arg(&name, arg, "asc or desc")?;
            Command::Order(value.parse().map_err(|_| invalid(value))?)
        }
        "per" => {
            let value = text_arg(&name, arg, "a page size")?;
            match value.parse::<u32>() {
                Ok(n) if (1..=100).contains(&n) => Command::PerPage(n),
                _ => return Err(invalid(value)),
            }
        }
        "param" => {
            let value = text_arg(&name, arg, "name=value")?;
            let Some((k, v)) = value.split_once('=') else {
                return Err(invalid(value));
            };
            if k.trim().is_empty() {
                return Err(invalid(value));
            }
            Command::Param { name: k.trim().to_string(), value: v.trim().to_string() }
        }
        "stats" => Command::Stats,
        "help" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        _ => return Err(CommandError::Unknown(name)),
    };
    Ok(Some(command))
}
