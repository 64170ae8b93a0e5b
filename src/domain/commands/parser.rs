//! Prefix command parsing.

/// A message recognized as a command by its prefix.
///
/// `name` is empty when the message holds only the prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Parses `body` if it starts with `prefix`.
    ///
    /// The command name is lower-cased; arguments keep their case and are
    /// split on any run of whitespace.
    pub fn parse(body: &str, prefix: &str) -> Option<Self> {
        if prefix.is_empty() {
            return None;
        }
        let rest = body.strip_prefix(prefix)?;
        let mut tokens = rest.split_whitespace();
        let name = tokens.next().unwrap_or_default().to_lowercase();
        let args = tokens.map(str::to_string).collect();
        Some(Self { name, args })
    }

    /// First argument, if any.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Arguments from `start` joined by single spaces.
    pub fn rest_from(&self, start: usize) -> String {
        self.args.get(start..).map(|a| a.join(" ")).unwrap_or_default()
    }
}
