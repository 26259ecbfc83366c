//! STOMP 1.2 text frames as carried in WebSocket text messages.
//!
//! One WebSocket message may carry several frames and any number of bare EOLs
//! (heart-beats). [`decode`] returns every frame it finds, reporting malformed
//! ones individually so a bad frame never hides the good ones around it.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    /// CONNECT and CONNECTED frames carry raw header values.
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "SEND" => Command::Send,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECT" => Command::Disconnect,
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("malformed header line {0:?}")]
    MalformedHeader(String),
    #[error("invalid escape sequence in {0:?}")]
    InvalidEscape(String),
    #[error("invalid content-length {0:?}")]
    InvalidContentLength(String),
    #[error("frame is not NUL terminated")]
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value for `name`; repeated headers keep the first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            push_header_part(&mut out, name, escape);
            out.push(':');
            push_header_part(&mut out, value, escape);
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str("content-length:");
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

fn push_header_part(out: &mut String, raw: &str, escape: bool) {
    if !escape {
        out.push_str(raw);
        return;
    }
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
}

fn unescape(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

/// The bare EOL a peer writes as a heart-beat.
pub const HEARTBEAT: &str = "\n";

/// Decodes every frame in one transport message. An empty result means the
/// message held only heart-beats.
pub fn decode(text: &str) -> Vec<Result<Frame, FrameError>> {
    let mut frames = Vec::new();
    let mut rest = text;
    loop {
        rest = rest.trim_start_matches(['\r', '\n']);
        if rest.is_empty() {
            break;
        }
        match decode_one(rest) {
            Ok((frame, remaining)) => {
                frames.push(Ok(frame));
                rest = remaining;
            }
            Err((err, remaining)) => {
                frames.push(Err(err));
                match remaining {
                    Some(remaining) => rest = remaining,
                    None => break,
                }
            }
        }
    }
    frames
}

type DecodeFailure<'a> = (FrameError, Option<&'a str>);

/// Parses one frame from the front of `input`. On failure returns the input
/// after the offending frame's NUL, when one can be found.
fn decode_one(input: &str) -> Result<(Frame, &str), DecodeFailure<'_>> {
    let skip_to_nul = |err: FrameError| (err, input.find('\0').map(|idx| &input[idx + 1..]));

    let (command_line, mut rest) = split_line(input).ok_or((FrameError::Truncated, None))?;
    let command = command_line.parse::<Command>().map_err(skip_to_nul)?;

    let mut headers = Vec::new();
    loop {
        let (line, remaining) = split_line(rest).ok_or((FrameError::Truncated, None))?;
        rest = remaining;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| skip_to_nul(FrameError::MalformedHeader(line.to_string())))?;
        let (name, value) = if command.escapes_headers() {
            (
                unescape(name).map_err(skip_to_nul)?,
                unescape(value).map_err(skip_to_nul)?,
            )
        } else {
            (name.to_string(), value.to_string())
        };
        headers.push((name, value));
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .map(|(_, value)| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| FrameError::InvalidContentLength(value.clone()))
        })
        .transpose()
        .map_err(skip_to_nul)?;

    let (body, remaining) = match content_length {
        Some(len) => {
            let body = rest
                .get(..len)
                .ok_or_else(|| skip_to_nul(FrameError::InvalidContentLength(len.to_string())))?;
            let after = &rest[len..];
            let remaining = after
                .strip_prefix('\0')
                .ok_or_else(|| skip_to_nul(FrameError::Truncated))?;
            (body, remaining)
        }
        None => {
            let nul = rest.find('\0').ok_or((FrameError::Truncated, None))?;
            (&rest[..nul], &rest[nul + 1..])
        }
    };

    Ok((
        Frame {
            command,
            headers,
            body: body.to_string(),
        },
        remaining,
    ))
}

fn split_line(input: &str) -> Option<(&str, &str)> {
    let idx = input.find('\n')?;
    let line = input[..idx].strip_suffix('\r').unwrap_or(&input[..idx]);
    Some((line, &input[idx + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_send_frame_with_content_length() {
        let frame = Frame::new(Command::Send)
            .header("destination", "/app/chat.send")
            .with_body("{\"a\":1}");
        assert_eq!(
            frame.encode(),
            "SEND\ndestination:/app/chat.send\ncontent-length:7\n\n{\"a\":1}\0"
        );
    }

    #[test]
    fn connect_headers_are_not_escaped() {
        let frame = Frame::new(Command::Connect).header("host", "chat.devmatch.dev:443");
        assert_eq!(frame.encode(), "CONNECT\nhost:chat.devmatch.dev:443\n\n\0");
    }

    #[test]
    fn escapes_and_unescapes_header_values() {
        let frame = Frame::new(Command::Message).header("note", "a:b\nc\\d");
        let encoded = frame.encode();
        assert!(encoded.contains("note:a\\cb\\nc\\\\d\n"));

        let decoded = decode(&encoded);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].as_ref().unwrap().get("note"), Some("a:b\nc\\d"));
    }

    #[test]
    fn heartbeat_only_message_has_no_frames() {
        assert!(decode("\n").is_empty());
        assert!(decode("\r\n\n").is_empty());
    }

    #[test]
    fn decodes_connected_with_crlf_lines() {
        let frames = decode("CONNECTED\r\nversion:1.2\r\nheart-beat:0,0\r\n\r\n\0\n");
        assert_eq!(frames.len(), 1);
        let frame = frames[0].as_ref().unwrap();
        assert_eq!(frame.command, Command::Connected);
        assert_eq!(frame.get("version"), Some("1.2"));
        assert_eq!(frame.get("heart-beat"), Some("0,0"));
    }

    #[test]
    fn repeated_headers_keep_first_value() {
        let frames = decode("MESSAGE\nfoo:first\nfoo:second\n\n\0");
        assert_eq!(frames[0].as_ref().unwrap().get("foo"), Some("first"));
    }

    #[test]
    fn content_length_allows_nul_in_body() {
        let frames = decode("MESSAGE\ncontent-length:3\n\na\0b\0");
        assert_eq!(frames[0].as_ref().unwrap().body, "a\0b");
    }

    #[test]
    fn malformed_frame_does_not_hide_the_next_one() {
        let text = "BOGUS\n\n\0MESSAGE\ndestination:/topic/chat/m1\n\nhello\0";
        let frames = decode(text);
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], Err(FrameError::UnknownCommand(_))));
        assert_eq!(frames[1].as_ref().unwrap().body, "hello");
    }

    #[test]
    fn missing_terminator_is_truncated() {
        let frames = decode("MESSAGE\n\nno terminator");
        assert_eq!(frames, vec![Err(FrameError::Truncated)]);
    }

    #[test]
    fn header_without_colon_is_malformed() {
        let frames = decode("MESSAGE\nnot-a-header\n\n\0");
        assert!(matches!(frames[0], Err(FrameError::MalformedHeader(_))));
    }
}
