/// Line commands for the interactive driver, with autocomplete-style matching
use crate::hn::{FeedType, ItemId};

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub usage: &'static str,
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "feed",
    aliases: &["f"],
    usage: "feed <top|new|best|ask|show|job>",
    description: "Switch feed (a bare feed name works too)",
  },
  Command {
    name: "more",
    aliases: &["m", "next"],
    usage: "more",
    description: "Load the next batch",
  },
  Command {
    name: "item",
    aliases: &["i", "open"],
    usage: "item <id>",
    description: "Open an item and its comments",
  },
  Command {
    name: "expand",
    aliases: &["e", "x"],
    usage: "expand <id>",
    description: "Load replies under a comment",
  },
  Command {
    name: "refresh",
    aliases: &["r", "reload"],
    usage: "refresh",
    description: "Clear the cache and reload the feed",
  },
  Command {
    name: "live",
    aliases: &["l"],
    usage: "live <on|off>",
    description: "Toggle live updates",
  },
  Command {
    name: "check",
    aliases: &["c"],
    usage: "check",
    description: "Check for new posts now",
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    usage: "help",
    description: "List commands",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    usage: "quit",
    description: "Exit hnfeed",
  },
];

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  Feed(FeedType),
  More,
  Item(ItemId),
  Expand(ItemId),
  Refresh,
  Live(bool),
  Check,
  Help,
  Quit,
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    if cmd.name == input_lower {
      matches.push((cmd, 0));
      continue;
    }

    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Parse one input line. Empty lines parse to `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Action>, String> {
  let mut words = line.split_whitespace();
  let Some(word) = words.next() else {
    return Ok(None);
  };
  let arg = words.next();

  // `top`, `ask`, ... select a feed directly
  if let Ok(feed) = word.parse::<FeedType>() {
    return Ok(Some(Action::Feed(feed)));
  }

  let cmd = get_suggestions(word)
    .into_iter()
    .next()
    .ok_or_else(|| format!("Unknown command: {}", word))?;

  let action = match cmd.name {
    "feed" => Action::Feed(required(cmd, arg)?.parse()?),
    "more" => Action::More,
    "item" => Action::Item(parse_id(cmd, arg)?),
    "expand" => Action::Expand(parse_id(cmd, arg)?),
    "refresh" => Action::Refresh,
    "live" => match required(cmd, arg)?.to_lowercase().as_str() {
      "on" | "true" | "1" => Action::Live(true),
      "off" | "false" | "0" => Action::Live(false),
      other => return Err(format!("Expected on or off, got: {}", other)),
    },
    "check" => Action::Check,
    "help" => Action::Help,
    "quit" => Action::Quit,
    other => return Err(format!("Command not handled: {}", other)),
  };

  Ok(Some(action))
}

fn required<'a>(cmd: &Command, arg: Option<&'a str>) -> Result<&'a str, String> {
  arg.ok_or_else(|| format!("Usage: {}", cmd.usage))
}

fn parse_id(cmd: &Command, arg: Option<&str>) -> Result<ItemId, String> {
  let arg = required(cmd, arg)?;
  arg
    .parse()
    .map_err(|_| format!("Not an item id: {} (usage: {})", arg, cmd.usage))
}
