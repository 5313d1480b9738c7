//! Storage commands understood by the worker.

use std::fmt;
use std::str::FromStr;

/// One of the three operations the worker proxies to the object store.
///
/// Requests carry the command as a free-form string on the wire so that
/// unknown commands can be recognised (and ignored) instead of failing
/// deserialization of the whole message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Write a value under a key, overwriting any existing entry.
    Put,
    /// Read the value stored under a key.
    Get,
    /// Remove the entry for a key if present.
    Delete,
}

impl Command {
    /// Wire name of the command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Put => "put",
            Self::Get => "get",
            Self::Delete => "delete",
        }
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "put" => Ok(Self::Put),
            "get" => Ok(Self::Get),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unrecognized command: {other}")),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!("put".parse::<Command>(), Ok(Command::Put));
        assert_eq!("get".parse::<Command>(), Ok(Command::Get));
        assert_eq!("delete".parse::<Command>(), Ok(Command::Delete));
    }

    #[test]
    fn rejects_unknown_and_differently_cased_commands() {
        assert!("clear".parse::<Command>().is_err());
        assert!("PUT".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
    }

    #[test]
    fn display_matches_wire_name() {
        assert_eq!(Command::Delete.to_string(), "delete");
    }
}
