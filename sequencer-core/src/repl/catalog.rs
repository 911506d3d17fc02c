//! Console command table.
//!
//! The parser dispatches on the same [`CommandSpec`] entries that `help`
//! prints, so keywords and usage strings stay in step.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Run,
    Enable,
    Disable,
    Status,
    List,
    Tick,
    Wait,
    Help,
}

/// What may follow a command keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Argument {
    Nothing,
    /// Required kebab-case catalog name such as `start-intaking`.
    Sequence,
    /// Optional unsuffixed integer.
    Count,
    /// Required duration literal: `1500us`, `250ms` or `2s`.
    Duration,
    /// Optional command keyword.
    Topic,
}

impl Argument {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Argument::Nothing => "end of command",
            Argument::Sequence => "sequence name",
            Argument::Count => "count",
            Argument::Duration => "duration",
            Argument::Topic => "command name",
        }
    }

    #[must_use]
    pub const fn is_required(self) -> bool {
        matches!(self, Argument::Sequence | Argument::Duration)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub argument: Argument,
    pub usage: &'static str,
    pub summary: &'static str,
}

impl CommandSpec {
    const fn new(
        name: &'static str,
        tag: CommandTag,
        argument: Argument,
        usage: &'static str,
        summary: &'static str,
    ) -> Self {
        Self {
            name,
            tag,
            argument,
            usage,
            summary,
        }
    }
}

static COMMANDS: [CommandSpec; 8] = [
    CommandSpec::new(
        "run",
        CommandTag::Run,
        Argument::Sequence,
        "run <sequence>",
        "queue a catalog sequence, aborting whatever it conflicts with",
    ),
    CommandSpec::new(
        "enable",
        CommandTag::Enable,
        Argument::Nothing,
        "enable",
        "accept run requests",
    ),
    CommandSpec::new(
        "disable",
        CommandTag::Disable,
        Argument::Nothing,
        "disable",
        "abort every sequence and ignore run requests",
    ),
    CommandSpec::new(
        "status",
        CommandTag::Status,
        Argument::Nothing,
        "status",
        "show running sequences and what blocks them",
    ),
    CommandSpec::new(
        "list",
        CommandTag::List,
        Argument::Nothing,
        "list",
        "list catalog sequences",
    ),
    CommandSpec::new(
        "tick",
        CommandTag::Tick,
        Argument::Count,
        "tick [count]",
        "advance the manual clock by whole ticks (default 1)",
    ),
    CommandSpec::new(
        "wait",
        CommandTag::Wait,
        Argument::Duration,
        "wait <duration>",
        "advance the manual clock, ticking all the way",
    ),
    CommandSpec::new(
        "help",
        CommandTag::Help,
        Argument::Topic,
        "help [command]",
        "describe commands",
    ),
];

/// Every command in presentation order.
#[must_use]
pub fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Finds a command by keyword, ignoring ASCII case.
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_unique_and_findable() {
        for (index, spec) in commands().iter().enumerate() {
            assert_eq!(find(spec.name), Some(spec));
            assert!(
                commands()[index + 1..]
                    .iter()
                    .all(|other| other.tag != spec.tag && other.name != spec.name),
                "{} listed twice",
                spec.name
            );
        }
        assert_eq!(find("WAIT").map(|spec| spec.tag), Some(CommandTag::Wait));
        assert_eq!(find("launch"), None);
    }

    #[test]
    fn usage_shows_the_argument() {
        for spec in commands() {
            assert!(spec.usage.starts_with(spec.name), "{}", spec.name);
            let has_argument = spec.usage.len() > spec.name.len();
            assert_eq!(has_argument, spec.argument != Argument::Nothing, "{}", spec.name);
            if spec.argument.is_required() {
                assert!(spec.usage.contains('<'), "{}", spec.name);
            }
        }
    }
}
