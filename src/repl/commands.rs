//! Built-in console commands
//!
//! Anything that is not a built-in, a template invocation or the multi-line
//! trigger is a query for the agent.

/// Line that switches to multi-line input
pub const MULTILINE_TRIGGER: &str = "\\\\";

/// One parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Info,
    Templates,
    Clear,
    Quit,
    MultiLine,
    Template { name: String, context: String },
    Query(String),
    Empty,
}

impl Command {
    /// Parse a raw input line.
    ///
    /// Built-ins are matched case-insensitively on the whole trimmed line.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Command::Empty;
        }
        if trimmed == MULTILINE_TRIGGER {
            return Command::MultiLine;
        }

        match trimmed.to_lowercase().as_str() {
            "help" => return Command::Help,
            "info" => return Command::Info,
            "templates" => return Command::Templates,
            "clear" => return Command::Clear,
            "quit" | "exit" | "bye" => return Command::Quit,
            _ => {}
        }

        if let Some(rest) = trimmed.strip_prefix('/') {
            let mut parts = rest.splitn(2, char::is_whitespace);
            if let Some(name) = parts.next().filter(|name| !name.is_empty()) {
                let context = parts.next().map(str::trim).unwrap_or("").to_string();
                return Command::Template {
                    name: name.to_string(),
                    context,
                };
            }
        }

        Command::Query(trimmed.to_string())
    }

    /// True for commands that end the session
    pub fn is_exit(&self) -> bool {
        matches!(self, Command::Quit)
    }
}
