use papertalk_core::SearchMode;

use crate::session::Screen;

/// One parsed line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run a search with the current mode and bound.
    Search(String),
    /// Ask the model a question about the open paper.
    Ask(String),
    SetMode(SearchMode),
    SetMax(usize),
    /// Open result N (1-based) for chat.
    Open(usize),
    /// Print citations for result N, or for the open paper.
    Cite(Option<usize>),
    Back,
    Help,
    Quit,
    /// Unusable input; the message says why.
    Invalid(String),
    None,
}

fn index_arg(arg: Option<&str>, command: &str) -> Result<usize, String> {
    match arg.map(str::parse::<usize>) {
        Some(Ok(n)) if n > 0 => Ok(n),
        Some(_) => Err(format!(":{} expects a result number, e.g. :{} 1", command, command)),
        None => Err(format!(":{} needs a result number", command)),
    }
}

/// Interpret a line typed on `screen`. Lines starting with `:` are commands;
/// anything else is a search query or, in chat, a question.
pub fn parse_input(line: &str, screen: &Screen) -> Action {
    let line = line.trim();
    if line.is_empty() {
        return Action::None;
    }
    let Some(command) = line.strip_prefix(':') else {
        return match screen {
            Screen::Search => Action::Search(line.to_string()),
            Screen::Chat => Action::Ask(line.to_string()),
        };
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next();
    match name.as_str() {
        "q" | "quit" | "exit" => Action::Quit,
        "h" | "help" | "?" => Action::Help,
        "b" | "back" => Action::Back,
        "mode" => match arg.map(str::parse::<SearchMode>) {
            Some(Ok(mode)) => Action::SetMode(mode),
            Some(Err(e)) => Action::Invalid(e),
            None => Action::Invalid(":mode needs one of general, title, id".to_string()),
        },
        "max" => match arg.map(str::parse::<usize>) {
            Some(Ok(n)) => Action::SetMax(n),
            _ => Action::Invalid(":max expects a number between 10 and 300".to_string()),
        },
        "o" | "open" => match index_arg(arg, "open") {
            Ok(n) => Action::Open(n),
            Err(e) => Action::Invalid(e),
        },
        "cite" => match arg {
            None => Action::Cite(None),
            Some(_) => match index_arg(arg, "cite") {
                Ok(n) => Action::Cite(Some(n)),
                Err(e) => Action::Invalid(e),
            },
        },
        other => Action::Invalid(format!("unknown command :{} (try :help)", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_depends_on_screen() {
        assert_eq!(
            parse_input("  vision transformers ", &Screen::Search),
            Action::Search("vision transformers".into())
        );
        assert_eq!(
            parse_input("What is Table 2?", &Screen::Chat),
            Action::Ask("What is Table 2?".into())
        );
    }

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_input("   ", &Screen::Chat), Action::None);
    }

    #[test]
    fn commands_parse() {
        let s = &Screen::Search;
        assert_eq!(parse_input(":quit", s), Action::Quit);
        assert_eq!(parse_input(":back", s), Action::Back);
        assert_eq!(parse_input(":mode title", s), Action::SetMode(SearchMode::Title));
        assert_eq!(parse_input(":max 100", s), Action::SetMax(100));
        assert_eq!(parse_input(":open 3", s), Action::Open(3));
        assert_eq!(parse_input(":cite", s), Action::Cite(None));
        assert_eq!(parse_input(":cite 2", s), Action::Cite(Some(2)));
    }

    #[test]
    fn bad_arguments_are_invalid() {
        let s = &Screen::Search;
        assert!(matches!(parse_input(":open", s), Action::Invalid(_)));
        assert!(matches!(parse_input(":open 0", s), Action::Invalid(_)));
        assert!(matches!(parse_input(":open two", s), Action::Invalid(_)));
        assert!(matches!(parse_input(":mode abstract", s), Action::Invalid(_)));
        assert!(matches!(parse_input(":frobnicate", s), Action::Invalid(_)));
    }
}
