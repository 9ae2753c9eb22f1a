/// Available commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "repos",
    aliases: &["r", "repositories", "all"],
    description: "All repositories",
  },
  Command {
    name: "starred",
    aliases: &["star"],
    description: "Starred repositories",
  },
  Command {
    name: "active",
    aliases: &["recent"],
    description: "Repositories updated in the last 6 months",
  },
  Command {
    name: "private",
    aliases: &["priv"],
    description: "Private repositories",
  },
  Command {
    name: "public",
    aliases: &["pub"],
    description: "Public repositories",
  },
  Command {
    name: "archived",
    aliases: &["arch"],
    description: "Archived repositories",
  },
  Command {
    name: "forked",
    aliases: &["forks"],
    description: "Forked repositories",
  },
  Command {
    name: "comments",
    aliases: &["c", "ai"],
    description: "AI review comments",
  },
  Command {
    name: "overview",
    aliases: &["o", "stats", "home"],
    description: "Dashboard statistics",
  },
  Command {
    name: "logout",
    aliases: &["signout"],
    description: "End the session and clear cached data",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit ghdash",
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = COMMANDS
    .iter()
    .filter_map(|cmd| match_rank(cmd, &input_lower).map(|rank| (cmd, rank)))
    .collect();

  // Stable sort keeps table order within a rank
  matches.sort_by_key(|(_, rank)| *rank);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Lower is better; `None` when the command does not match at all.
fn match_rank(cmd: &Command, input: &str) -> Option<u32> {
  if cmd.name == input {
    Some(0)
  } else if cmd.aliases.contains(&input) {
    Some(1)
  } else if cmd.name.starts_with(input) {
    Some(2)
  } else if cmd.aliases.iter().any(|a| a.starts_with(input)) {
    Some(3)
  } else if cmd.name.contains(input) {
    Some(4)
  } else if cmd.aliases.iter().any(|a| a.contains(input)) {
    Some(5)
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("starred");
    assert_eq!(suggestions[0].name, "starred");
  }

  #[test]
  fn test_alias_beats_prefix() {
    // "c" is an alias of comments, even though no other name starts with it
    assert_eq!(get_suggestions("c")[0].name, "comments");
    // "all" is an alias of repos; no name contains it
    assert_eq!(get_suggestions("all")[0].name, "repos");
  }

  #[test]
  fn test_prefix_match_keeps_table_order() {
    let names: Vec<_> = get_suggestions("a").iter().map(|c| c.name).collect();
    assert_eq!(&names[..2], &["active", "archived"]);
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("ork");
    assert_eq!(suggestions[0].name, "forked");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }
}
