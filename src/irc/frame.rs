//! Line protocol frames
//!
//! Outbound commands are rendered as CRLF-terminated text. Inbound lines are
//! split on spaces: the first token identifies a keepalive probe, otherwise
//! the second token carries the frame kind.
//!
//! Parsing borrows from the input line and never allocates.

use std::fmt;

/// Registration reply codes
pub mod numeric {
    pub const RPL_WELCOME: &str = "001";
    pub const RPL_YOURHOST: &str = "002";
    pub const RPL_CREATED: &str = "003";
    pub const RPL_MYINFO: &str = "004";
    pub const RPL_BOUNCE: &str = "005";

    pub const RPL_NAMREPLY: &str = "353";
    pub const RPL_ENDOFNAMES: &str = "366";

    pub const RPL_MOTD: &str = "372";
    pub const RPL_MOTDSTART: &str = "375";
    pub const RPL_ENDOFMOTD: &str = "376";
}

pub const CMD_JOIN: &str = "JOIN";
pub const CMD_NICK: &str = "NICK";
pub const CMD_PASS: &str = "PASS";
pub const CMD_PING: &str = "PING";
pub const CMD_PONG: &str = "PONG";
pub const CMD_PRIVMSG: &str = "PRIVMSG";
pub const CMD_USER: &str = "USER";

/// Outbound command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Pass(&'a str),
    Nick(&'a str),
    User(&'a str),
    /// Channel name without the leading `#`
    Join(&'a str),
    /// Server argument echoed from the probe
    Pong(&'a str),
}

impl Command<'_> {
    /// Append the wire form (with CRLF) to `buf`
    pub fn write_to(&self, buf: &mut String) {
        use fmt::Write;
        // Writing into a String cannot fail
        let _ = write!(buf, "{self}\r\n");
    }
}

impl fmt::Display for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Pass(token) => write!(f, "{CMD_PASS} {token}"),
            Command::Nick(user) => write!(f, "{CMD_NICK} {user}"),
            Command::User(user) => write!(f, "{CMD_USER} {user}"),
            Command::Join(channel) => write!(f, "{CMD_JOIN} #{channel}"),
            Command::Pong(server) => write!(f, "{CMD_PONG} :{server}"),
        }
    }
}

/// Inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Keepalive probe, must be answered with PONG
    Ping { server: &'a str },
    /// Registration complete
    Welcome,
    /// Join confirmation
    Join { nick: &'a str, channel: &'a str },
    /// Chat message (logged only)
    Privmsg {
        nick: &'a str,
        channel: &'a str,
        text: &'a str,
    },
    /// Any other numeric reply
    Numeric(&'a str),
    /// Any other command
    Other(&'a str),
}

/// Parse one line (trailing CR/LF allowed)
///
/// Returns `None` for empty, short or malformed frames.
pub fn parse_frame(line: &str) -> Option<Frame<'_>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return None;
    }

    let mut tokens = line.split(' ');
    let first = tokens.next()?;

    if first == CMD_PING {
        let rest = line.get(CMD_PING.len()..).unwrap_or("").trim_start();
        return Some(Frame::Ping {
            server: rest.strip_prefix(':').unwrap_or(rest),
        });
    }

    let kind = tokens.next()?;
    let target = tokens.next()?;

    let frame = match kind {
        numeric::RPL_WELCOME => Frame::Welcome,
        CMD_JOIN => Frame::Join {
            nick: prefix_nick(first),
            channel: target.strip_prefix('#').filter(|c| !c.is_empty())?,
        },
        CMD_PRIVMSG => {
            let channel = target.strip_prefix('#')?;
            // Text is everything after the third separator
            let offset = first.len() + kind.len() + target.len() + 3;
            let text = line.get(offset..).unwrap_or("");
            Frame::Privmsg {
                nick: prefix_nick(first),
                channel,
                text: text.strip_prefix(':').unwrap_or(text),
            }
        }
        k if is_numeric(k) => Frame::Numeric(k),
        k => Frame::Other(k),
    };

    Some(frame)
}

/// `:nick!user@host` -> `nick`
#[inline]
fn prefix_nick(prefix: &str) -> &str {
    let prefix = prefix.strip_prefix(':').unwrap_or(prefix);
    prefix.split('!').next().unwrap_or(prefix)
}

#[inline]
fn is_numeric(kind: &str) -> bool {
    kind.len() == 3 && kind.bytes().all(|b| b.is_ascii_digit())
}
