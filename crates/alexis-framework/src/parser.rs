//! Command parsing.
//!
//! Turns raw message text into a [`ParsedCommand`] given the prefix
//! configured for the server. Two invocation forms are recognised:
//!
//! ```text
//! !set hello world     → name "set", args ["hello", "world"], text "hello world"
//! ! hello world        → name "hello", args ["world"], text "world"   (spaced form)
//! ```
//!
//! Anything else is "not a command". That is not an error: the text still
//! reaches prefix, mention and event handlers.

/// A command parsed out of message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// The command name, without prefix. Compared case-sensitively.
    pub name: String,
    /// Whitespace-separated arguments after the name.
    pub args: Vec<String>,
    /// Text after the command name, leading whitespace removed.
    pub text: String,
    /// `true` for the `<prefix> <name>` form.
    pub spaced: bool,
}

impl ParsedCommand {
    /// Number of arguments.
    pub fn argc(&self) -> usize {
        self.args.len()
    }
}

/// Parses `raw` as a command invoked with `prefix`.
///
/// Returns `None` when the text does not start with the prefix, when nothing
/// follows it, or when the prefix is empty.
pub fn parse(raw: &str, prefix: &str) -> Option<ParsedCommand> {
    if prefix.is_empty() {
        return None;
    }
    let rest = raw.strip_prefix(prefix)?;
    let first = rest.chars().next()?;

    let spaced = first.is_whitespace();
    let body = if spaced { rest.trim_start() } else { rest };

    let name_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let (name, remainder) = body.split_at(name_end);
    if name.is_empty() {
        return None;
    }
    let text = remainder.trim_start();

    Some(ParsedCommand {
        name: name.to_string(),
        args: text.split_whitespace().map(str::to_string).collect(),
        text: text.to_string(),
        spaced,
    })
}

/// Extracts the user id from mention markup (`<@id>` or `<@!id>`).
pub fn parse_user_mention(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("<@")?.strip_suffix('>')?;
    let id = inner.strip_prefix('!').unwrap_or(inner);
    (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then_some(id)
}

/// If `raw` opens with a mention of `self_id`, returns the text after it
/// with leading whitespace removed.
pub fn strip_self_mention<'a>(raw: &'a str, self_id: &str) -> Option<&'a str> {
    let rest = raw.strip_prefix("<@")?;
    let rest = rest.strip_prefix('!').unwrap_or(rest);
    let rest = rest.strip_prefix(self_id)?.strip_prefix('>')?;
    Some(rest.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_form() {
        let cmd = parse("!cmd a b", "!").unwrap();
        assert_eq!(cmd.name, "cmd");
        assert_eq!(cmd.args, vec!["a", "b"]);
        assert_eq!(cmd.text, "a b");
        assert!(!cmd.spaced);
    }

    #[test]
    fn test_spaced_form() {
        let cmd = parse("! raw text", "!").unwrap();
        assert_eq!(cmd.name, "raw");
        assert_eq!(cmd.args, vec!["text"]);
        assert!(cmd.spaced);
    }

    #[test]
    fn test_not_a_command() {
        assert_eq!(parse("notacommand", "!"), None);
        assert_eq!(parse("!", "!"), None);
        assert_eq!(parse("!   ", "!"), None);
        assert_eq!(parse("!cmd", ""), None);
    }

    #[test]
    fn test_remainder_keeps_inner_spacing() {
        let cmd = parse("!set  name   some  content ", "!").unwrap();
        assert_eq!(cmd.name, "set");
        assert_eq!(cmd.args, vec!["name", "some", "content"]);
        assert_eq!(cmd.text, "name   some  content ");
        assert_eq!(cmd.argc(), 3);
    }

    #[test]
    fn test_multichar_prefix_and_case() {
        let cmd = parse("ax!Ping", "ax!").unwrap();
        assert_eq!(cmd.name, "Ping");
        assert!(cmd.args.is_empty());
        assert_eq!(cmd.text, "");
    }

    #[test]
    fn test_user_mentions() {
        assert_eq!(parse_user_mention("<@1234>"), Some("1234"));
        assert_eq!(parse_user_mention("<@!1234>"), Some("1234"));
        assert_eq!(parse_user_mention("<#1234>"), None);
        assert_eq!(parse_user_mention("<@abc>"), None);
        assert_eq!(parse_user_mention("1234"), None);
    }

    #[test]
    fn test_self_mention() {
        assert_eq!(strip_self_mention("<@42> hi there", "42"), Some("hi there"));
        assert_eq!(strip_self_mention("<@!42>hi", "42"), Some("hi"));
        assert_eq!(strip_self_mention("<@43> hi", "42"), None);
        assert_eq!(strip_self_mention("<@421> hi", "42"), None);
        assert_eq!(strip_self_mention("hi <@42>", "42"), None);
    }
}
