//! Startup command combinator
//!
//! A [`StartupCommand`] is an ordered list of clauses joined by shell
//! separators. It renders to a single POSIX shell line.

use std::fmt;

/// Separator placed between two clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `&&`: run the next clause only if the previous one succeeded
    AndThen,
    /// `||`: run the next clause only if the previous one failed
    OrElse,
    /// `;`: run the next clause regardless
    Always,
}

impl Separator {
    fn as_str(self) -> &'static str {
        match self {
            Separator::AndThen => " && ",
            Separator::OrElse => " || ",
            Separator::Always => " ; ",
        }
    }
}

/// A single unit of a startup command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Shell text emitted verbatim
    Simple(String),
    /// `(cmd &)`: detached background launch
    Background(Box<StartupCommand>),
    /// `(if test ... ; then ...; else ...; fi)`: one-time setup behind a sentinel test
    Guarded {
        test: String,
        then: Box<StartupCommand>,
        otherwise: Box<StartupCommand>,
    },
}

impl Clause {
    /// Verbatim shell text
    pub fn simple(text: impl Into<String>) -> Self {
        Clause::Simple(text.into())
    }

    /// Run `command` detached in the background
    pub fn background(command: StartupCommand) -> Self {
        Clause::Background(Box::new(command))
    }

    /// Run `then` when `test` succeeds, `otherwise` when it fails
    pub fn once_guard(
        test: impl Into<String>,
        then: StartupCommand,
        otherwise: StartupCommand,
    ) -> Self {
        Clause::Guarded {
            test: test.into(),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }
}

impl From<&str> for Clause {
    fn from(text: &str) -> Self {
        Clause::simple(text)
    }
}

impl From<String> for Clause {
    fn from(text: String) -> Self {
        Clause::Simple(text)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::Simple(text) => f.write_str(text),
            Clause::Background(command) => write!(f, "({command} &)"),
            Clause::Guarded {
                test,
                then,
                otherwise,
            } => write!(f, "(if {test} ; then {then}; else {otherwise}; fi)"),
        }
    }
}

/// Ordered clauses joined by separators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupCommand {
    first: Clause,
    rest: Vec<(Separator, Clause)>,
}

impl StartupCommand {
    /// Start a command with its first clause
    pub fn new(clause: impl Into<Clause>) -> Self {
        StartupCommand {
            first: clause.into(),
            rest: Vec::new(),
        }
    }

    /// Append `clause` joined with `sep`
    pub fn then(mut self, sep: Separator, clause: impl Into<Clause>) -> Self {
        self.rest.push((sep, clause.into()));
        self
    }

    pub fn and_then(self, clause: impl Into<Clause>) -> Self {
        self.then(Separator::AndThen, clause)
    }

    pub fn or_else(self, clause: impl Into<Clause>) -> Self {
        self.then(Separator::OrElse, clause)
    }

    pub fn always(self, clause: impl Into<Clause>) -> Self {
        self.then(Separator::Always, clause)
    }

    /// Clauses in order, each with the separator that precedes it
    pub fn clauses(&self) -> impl Iterator<Item = (Option<Separator>, &Clause)> {
        std::iter::once((None, &self.first)).chain(self.rest.iter().map(|(s, c)| (Some(*s), c)))
    }

    /// Render as a single shell line
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StartupCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first)?;
        for (sep, clause) in &self.rest {
            write!(f, "{}{clause}", sep.as_str())?;
        }
        Ok(())
    }
}

/// Escape `value` for use inside double quotes, keeping `$` expansion.
pub fn double_quote_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Render `value` as a single shell word, single-quoting only when needed.
pub fn shell_word(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:=,@%$".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}
