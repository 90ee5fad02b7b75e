use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use netpong_core::net::messages::Side;

use crate::intercept_log::{Direction, InterceptLog, read_tail};
use crate::policy::SharedPolicy;

pub const USAGE: &str = "\
commands:
  help                      show this text
  status                    print the current mutation policy
  mutate on|off             master switch for all mutation
  droprate <0..1>           probability of dropping a client message
  teleport <0..1>           probability of teleporting the ball in a snapshot
  flip a|b|both on|off      invert up/down for a paddle
  score a|b|both <n>        force the displayed score
  score off                 stop forcing scores
  replay [n]                show the last n server->client log entries (default 10)
  quit                      stop the relay";

pub const DEFAULT_REPLAY: usize = 10;

/// Which paddle(s) a console command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sides {
    One(Side),
    Both,
}

impl Sides {
    pub fn iter(self) -> impl Iterator<Item = Side> {
        let (a, b) = match self {
            Sides::One(Side::A) => (true, false),
            Sides::One(Side::B) => (false, true),
            Sides::Both => (true, true),
        };
        [(Side::A, a), (Side::B, b)]
            .into_iter()
            .filter_map(|(side, on)| on.then_some(side))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Status,
    Mutate(bool),
    DropRate(f64),
    Teleport(f64),
    Flip { sides: Sides, on: bool },
    Score { sides: Sides, value: u32 },
    ScoreOff,
    Replay(usize),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    Empty,
    UnknownCommand(String),
    BadArgument { command: &'static str, arg: String },
    MissingArgument(&'static str),
}

impl std::fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            Self::BadArgument { command, arg } => {
                write!(f, "invalid argument for {command}: {arg:?}")
            },
            Self::MissingArgument(command) => write!(f, "missing argument for {command}"),
        }
    }
}

impl std::error::Error for ConsoleError {}

fn parse_switch(command: &'static str, arg: Option<&str>) -> Result<bool, ConsoleError> {
    match arg {
        Some(a) if a.eq_ignore_ascii_case("on") => Ok(true),
        Some(a) if a.eq_ignore_ascii_case("off") => Ok(false),
        Some(a) => Err(ConsoleError::BadArgument {
            command,
            arg: a.to_string(),
        }),
        None => Err(ConsoleError::MissingArgument(command)),
    }
}

fn parse_rate(command: &'static str, arg: Option<&str>) -> Result<f64, ConsoleError> {
    let arg = arg.ok_or(ConsoleError::MissingArgument(command))?;
    match arg.parse::<f64>() {
        Ok(v) if (0.0..=1.0).contains(&v) => Ok(v),
        _ => Err(ConsoleError::BadArgument {
            command,
            arg: arg.to_string(),
        }),
    }
}

fn parse_sides(command: &'static str, arg: Option<&str>) -> Result<Sides, ConsoleError> {
    let arg = arg.ok_or(ConsoleError::MissingArgument(command))?;
    match arg.to_ascii_lowercase().as_str() {
        "a" => Ok(Sides::One(Side::A)),
        "b" => Ok(Sides::One(Side::B)),
        "both" => Ok(Sides::Both),
        _ => Err(ConsoleError::BadArgument {
            command,
            arg: arg.to_string(),
        }),
    }
}

/// Parse one console line. Parsing never touches the policy.
pub fn parse_command(line: &str) -> Result<Command, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err(ConsoleError::Empty);
    };
    let arg1 = words.next();
    let arg2 = words.next();

    match head.to_ascii_lowercase().as_str() {
        "help" | "?" => Ok(Command::Help),
        "status" => Ok(Command::Status),
        "quit" | "exit" => Ok(Command::Quit),
        "mutate" => parse_switch("mutate", arg1).map(Command::Mutate),
        "droprate" => parse_rate("droprate", arg1).map(Command::DropRate),
        "teleport" => parse_rate("teleport", arg1).map(Command::Teleport),
        "flip" => {
            let sides = parse_sides("flip", arg1)?;
            let on = parse_switch("flip", arg2)?;
            Ok(Command::Flip { sides, on })
        },
        "score" => {
            if arg1.is_some_and(|a| a.eq_ignore_ascii_case("off")) {
                return Ok(Command::ScoreOff);
            }
            let sides = parse_sides("score", arg1)?;
            let arg2 = arg2.ok_or(ConsoleError::MissingArgument("score"))?;
            let value = arg2.parse::<u32>().map_err(|_| ConsoleError::BadArgument {
                command: "score",
                arg: arg2.to_string(),
            })?;
            Ok(Command::Score { sides, value })
        },
        "replay" => match arg1 {
            None => Ok(Command::Replay(DEFAULT_REPLAY)),
            Some(n) => match n.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Command::Replay(n)),
                _ => Err(ConsoleError::BadArgument {
                    command: "replay",
                    arg: n.to_string(),
                }),
            },
        },
        other => Err(ConsoleError::UnknownCommand(other.to_string())),
    }
}

/// Run one parsed command and return the text to print.
pub async fn execute(cmd: &Command, policy: &SharedPolicy, log: &InterceptLog) -> String {
    match *cmd {
        Command::Help => USAGE.to_string(),
        Command::Status => policy.read().await.summary(),
        Command::Quit => "bye".to_string(),
        Command::Mutate(on) => {
            policy.write().await.enabled = on;
            format!("mutation {}", if on { "enabled" } else { "disabled" })
        },
        Command::DropRate(rate) => {
            policy.write().await.drop_rate = rate;
            format!("dropRate set to {rate}")
        },
        Command::Teleport(rate) => {
            policy.write().await.teleport_rate = rate;
            format!("teleportRate set to {rate}")
        },
        Command::Flip { sides, on } => {
            let mut p = policy.write().await;
            for side in sides.iter() {
                p.set_flip(side, on);
            }
            format!("flipA={} flipB={}", p.flip_a, p.flip_b)
        },
        Command::Score { sides, value } => {
            let mut p = policy.write().await;
            for side in sides.iter() {
                p.score_override.set(side, Some(value));
            }
            p.summary()
        },
        Command::ScoreOff => {
            policy.write().await.score_override = Default::default();
            "score override cleared".to_string()
        },
        Command::Replay(n) => replay(log, n).await,
    }
}

async fn replay(log: &InterceptLog, n: usize) -> String {
    log.sync().await;
    match read_tail(log.path(), n, Direction::ServerToClient).await {
        Ok(records) if records.is_empty() => "no server->client entries logged".to_string(),
        Ok(records) => {
            let mut out = format!("last {} server->client entries:", records.len());
            for (i, record) in records.iter().enumerate() {
                out.push_str(&format!("\n#{i} [{}] {}", record.ts, record.raw));
            }
            out
        },
        Err(e) => format!("replay failed: {e}"),
    }
}

/// Why the console loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    Quit,
    Eof,
}

/// Read commands line by line until `quit` or end of input. Bad input prints
/// the error and the usage text and leaves the policy unchanged.
pub async fn run_console<R, W>(
    input: R,
    mut output: W,
    policy: SharedPolicy,
    log: InterceptLog,
) -> ConsoleExit
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return ConsoleExit::Eof,
            Err(e) => {
                tracing::warn!(error = %e, "Console input error");
                return ConsoleExit::Eof;
            },
        };

        let text = match parse_command(&line) {
            Ok(cmd) => {
                let text = execute(&cmd, &policy, &log).await;
                if cmd == Command::Quit {
                    write_line(&mut output, &text).await;
                    return ConsoleExit::Quit;
                }
                tracing::info!(?cmd, "Console command applied");
                text
            },
            Err(ConsoleError::Empty) => continue,
            Err(e) => format!("{e}\n{USAGE}"),
        };
        write_line(&mut output, &text).await;
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) {
    let result = async {
        output.write_all(text.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await
    }
    .await;
    if let Err(e) = result {
        tracing::warn!(error = %e, "Console output error");
    }
}
