//! Tokenizer and parser for console lines.
//!
//! `regal` splits a line into a bounded [`Tokens`] buffer. The parser is a
//! few `winnow` parsers over that token slice: the first word picks a
//! [`catalog`](super::catalog) entry and the entry's [`Argument`] decides
//! what may follow.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::{IncrementalError, TokenCache};
use regal_macros::RegalLexer;
use winnow::Parser;

use super::catalog::{self, Argument, CommandTag};

/// Tokens kept per console line.
pub const MAX_TOKENS: usize = 16;

/// The cache also records skipped blanks.
const CACHE_SLOTS: usize = MAX_TOKENS * 2;

/// Largest `tick` count one command may request.
pub const MAX_TICKS: u32 = 60_000;

/// Longest `wait` one command may request.
pub const MAX_WAIT: Duration = Duration::from_secs(600);

#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Digits followed by `us`, `ms` or `s`.
    #[regex(r"[0-9]+(?:us|ms|s)", priority = 2)]
    Duration,
    #[regex(r"[0-9]+")]
    Number,
    /// Keyword, sequence name or help topic.
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*")]
    Word,
    #[regex(r"[ \t]+", skip)]
    Blank,
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Newline,
    /// Anything no other pattern accepts.
    #[default]
    #[regex(r".", priority = 1024)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte range of `text` within the line.
    pub span: Range<usize>,
}

impl<'a> Token<'a> {
    #[must_use]
    pub fn column(&self) -> usize {
        self.span.start
    }

    fn out_of_range(&self, what: &'static str) -> SyntaxError<'a> {
        SyntaxError::OutOfRange {
            what,
            text: self.text,
            column: self.column(),
        }
    }
}

pub type Tokens<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexError {
    /// The line holds more than [`MAX_TOKENS`] tokens.
    TooLong,
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooLong => write!(f, "line holds more than {MAX_TOKENS} tokens"),
            LexError::Engine => f.write_str("lexer failure"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyntaxError<'a> {
    Unexpected {
        expected: &'static str,
        found: &'a str,
        column: usize,
    },
    /// The line ended before a required token.
    Missing { expected: &'static str },
    /// Well-formed literal whose value does not fit.
    OutOfRange {
        what: &'static str,
        text: &'a str,
        column: usize,
    },
    Unsupported { text: &'a str, column: usize },
}

impl<'a> SyntaxError<'a> {
    fn expected(expected: &'static str, found: Option<&Token<'a>>) -> Self {
        match found {
            Some(token) if token.kind != TokenKind::Newline => SyntaxError::Unexpected {
                expected,
                found: token.text,
                column: token.column(),
            },
            _ => SyntaxError::Missing { expected },
        }
    }
}

impl fmt::Display for SyntaxError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxError::Unexpected {
                expected,
                found,
                column,
            } => write!(f, "expected {expected}, found {found:?} at column {column}"),
            SyntaxError::Missing { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            SyntaxError::OutOfRange { what, text, column } => {
                write!(f, "{what} `{text}` out of range at column {column}")
            }
            SyntaxError::Unsupported { text, column } => {
                write!(f, "unsupported input `{text}` at column {column}")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Syntax(SyntaxError<'a>),
}

impl From<LexError> for ParseError<'_> {
    fn from(error: LexError) -> Self {
        ParseError::Lex(error)
    }
}

impl<'a> From<SyntaxError<'a>> for ParseError<'a> {
    fn from(error: SyntaxError<'a>) -> Self {
        ParseError::Syntax(error)
    }
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(error) => error.fmt(f),
            ParseError::Syntax(error) => error.fmt(f),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Run { sequence: &'a str },
    Enable,
    Disable,
    Status,
    List,
    Tick { count: u32 },
    Wait(Duration),
    Help(HelpCommand<'a>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

/// Splits `line` into tokens, dropping blanks.
///
/// # Errors
///
/// Fails when the line holds more than [`MAX_TOKENS`] tokens.
pub fn lex(line: &str) -> Result<Tokens<'_>, LexError> {
    let mut cache: TokenCache<TokenKind, CACHE_SLOTS> = TokenCache::new();
    let leftover = cache
        .rebuild(TokenKind::lexer(), line)
        .map_err(|error| match error {
            IncrementalError::TokenOverflow => LexError::TooLong,
            _ => LexError::Engine,
        })?;

    let lexed = cache
        .tokens()
        .filter(|record| !record.skipped)
        .map(|record| Token {
            kind: record.token,
            text: &line[record.start..record.end],
            span: record.start..record.end,
        });
    let unlexed = leftover
        .filter(|rest| !rest.fragment.is_empty())
        .map(|rest| Token {
            kind: TokenKind::Unknown,
            text: rest.fragment,
            span: rest.start..rest.start + rest.fragment.len(),
        });

    let mut tokens = Tokens::new();
    for token in lexed.chain(unlexed) {
        tokens.push(token).map_err(|_| LexError::TooLong)?;
    }
    Ok(tokens)
}

/// Parses one console line.
///
/// # Errors
///
/// Returns the lexer or syntax error naming the offending token.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line)?;
    if let Some(bad) = tokens.iter().find(|token| token.kind == TokenKind::Unknown) {
        return Err(SyntaxError::Unsupported {
            text: bad.text,
            column: bad.column(),
        }
        .into());
    }

    let mut input = tokens.as_slice();
    let command = command().parse_next(&mut input)?;
    match input.iter().find(|token| token.kind != TokenKind::Newline) {
        Some(extra) => Err(SyntaxError::expected("end of command", Some(extra)).into()),
        None => Ok(command),
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

/// Argument value before it is matched against its command.
enum Value<'a> {
    Word(&'a str),
    Count(u32),
    Duration(Duration),
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, SyntaxError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let keyword = token(TokenKind::Word, "command keyword").parse_next(input)?;
        let spec = catalog::find(keyword.text)
            .ok_or_else(|| SyntaxError::expected("command keyword", Some(&keyword)))?;
        let value = if at_end(input) {
            None
        } else {
            Some(value(spec.argument).parse_next(input)?)
        };
        build(spec.tag, value).ok_or(SyntaxError::Missing {
            expected: spec.argument.label(),
        })
    }
}

fn at_end(input: &[Token<'_>]) -> bool {
    input.iter().all(|token| token.kind == TokenKind::Newline)
}

fn token<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, SyntaxError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((first, rest)) if first.kind == kind => {
            *input = rest;
            Ok(first.clone())
        }
        other => Err(SyntaxError::expected(label, other.map(|(first, _)| first))),
    }
}

fn value<'src, 'slice>(
    argument: Argument,
) -> impl Parser<Input<'src, 'slice>, Value<'src>, SyntaxError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let label = argument.label();
        match argument {
            Argument::Nothing => Err(SyntaxError::expected(label, input.first())),
            Argument::Sequence | Argument::Topic => token(TokenKind::Word, label)
                .map(|word| Value::Word(word.text))
                .parse_next(input),
            Argument::Count => {
                let number = token(TokenKind::Number, label).parse_next(input)?;
                count(&number).map(Value::Count)
            }
            Argument::Duration => {
                let literal = token(TokenKind::Duration, label).parse_next(input)?;
                duration(&literal).map(Value::Duration)
            }
        }
    }
}

/// Pairs a command with its argument; `None` when a required one is absent.
fn build(tag: CommandTag, value: Option<Value<'_>>) -> Option<Command<'_>> {
    let command = match (tag, value) {
        (CommandTag::Run, Some(Value::Word(sequence))) => Command::Run { sequence },
        (CommandTag::Enable, None) => Command::Enable,
        (CommandTag::Disable, None) => Command::Disable,
        (CommandTag::Status, None) => Command::Status,
        (CommandTag::List, None) => Command::List,
        (CommandTag::Tick, None) => Command::Tick { count: 1 },
        (CommandTag::Tick, Some(Value::Count(count))) => Command::Tick { count },
        (CommandTag::Wait, Some(Value::Duration(duration))) => Command::Wait(duration),
        (CommandTag::Help, None) => Command::Help(HelpCommand { topic: None }),
        (CommandTag::Help, Some(Value::Word(topic))) => Command::Help(HelpCommand {
            topic: Some(topic),
        }),
        _ => return None,
    };
    Some(command)
}

fn count<'a>(token: &Token<'a>) -> Result<u32, SyntaxError<'a>> {
    token
        .text
        .parse()
        .ok()
        .filter(|count| *count <= MAX_TICKS)
        .ok_or_else(|| token.out_of_range("count"))
}

fn duration<'a>(token: &Token<'a>) -> Result<Duration, SyntaxError<'a>> {
    let text = token.text;
    let (digits, unit): (&str, fn(u64) -> Duration) = if let Some(digits) = text.strip_suffix("us")
    {
        (digits, Duration::from_micros)
    } else if let Some(digits) = text.strip_suffix("ms") {
        (digits, Duration::from_millis)
    } else {
        (text.strip_suffix('s').unwrap_or(text), Duration::from_secs)
    };
    digits
        .parse()
        .ok()
        .map(unit)
        .filter(|duration| *duration <= MAX_WAIT)
        .ok_or_else(|| token.out_of_range("duration"))
}
