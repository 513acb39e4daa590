//! Parser for the value of the HTTP `Host` header. The header has the form
//! `hostname[:port]` where hostname can also be an IPv6 literal enclosed in
//! square brackets, like `[::1]:8080`. IPv6 literals contain colons, so we
//! can't just split on the first `:`, the bracketed literal has to be consumed
//! as a single token before looking for the port delimiter.

use std::{fmt, net::Ipv6Addr};

use http::HeaderValue;

use crate::ForwardingError;

/// Borrowed view of a parsed `Host` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Host<'a> {
    /// Hostname including brackets if it's an IPv6 literal.
    name: &'a str,

    /// Digits of the port, exactly as received.
    port: Option<&'a str>,
}

/// Parser states.
#[derive(Clone, Copy)]
enum State {
    /// Nothing consumed yet.
    Start,

    /// Inside `[...]`, waiting for the closing bracket.
    Literal,

    /// Consuming a registered name or IPv4 address.
    Name,

    /// Right after the closing bracket of an IPv6 literal.
    Closed,

    /// Found the `:` delimiter, the rest must be the port digits starting at
    /// this byte offset.
    Port(usize),
}

impl<'a> Host<'a> {
    pub fn parse(input: &'a str) -> Result<Self, ForwardingError> {
        let invalid = || ForwardingError::InvalidHostFormat(input.to_owned());

        let mut state = State::Start;
        let mut name_end = input.len();

        for (i, c) in input.char_indices() {
            state = match (state, c) {
                (State::Start, '[') => State::Literal,
                (State::Name, ':') => {
                    name_end = i;
                    State::Port(i + 1)
                }
                (State::Start | State::Name, c) if is_reg_name_char(c) => State::Name,
                (State::Start | State::Name, _) => return Err(invalid()),

                (State::Literal, ']') => {
                    if input[1..i].parse::<Ipv6Addr>().is_err() {
                        return Err(invalid());
                    }
                    name_end = i + 1;
                    State::Closed
                }
                (State::Literal, _) => State::Literal,

                (State::Closed, ':') => State::Port(i + 1),
                (State::Closed, _) => return Err(invalid()),

                (State::Port(start), '0'..='9') => State::Port(start),
                (State::Port(_), _) => return Err(invalid()),
            };
        }

        match state {
            State::Start | State::Literal => Err(invalid()),
            State::Name | State::Closed => Self::new(input, name_end, None),
            State::Port(start) => Self::new(input, name_end, Some(&input[start..])),
        }
    }

    /// Validates the port (if any) and builds the [`Host`]. An empty port such
    /// as `example.com:` is allowed and treated as no port at all.
    fn new(
        input: &'a str,
        name_end: usize,
        port: Option<&'a str>,
    ) -> Result<Self, ForwardingError> {
        let port = port.filter(|digits| !digits.is_empty());

        if let Some(digits) = port {
            if digits.parse::<u16>().is_err() {
                return Err(ForwardingError::InvalidHostFormat(input.to_owned()));
            }
        }

        Ok(Self {
            name: &input[..name_end],
            port,
        })
    }

    /// Hostname without the port. IPv6 literals keep their brackets.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Port digits if the header contained a port.
    pub fn port(&self) -> Option<&'a str> {
        self.port
    }
}

/// Characters allowed in a registered name or IPv4 address: unreserved,
/// percent-encoded octets and sub-delimiters. Commas are excluded because a
/// comma in `Host` means the client folded multiple values into one.
fn is_reg_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '-' | '.' | '_' | '~' | '%' | '!' | '$' | '&' | '\'' | '(' | ')' | '*' | '+' | ';' | '='
        )
}

impl<'a> TryFrom<&'a HeaderValue> for Host<'a> {
    type Error = ForwardingError;

    fn try_from(value: &'a HeaderValue) -> Result<Self, Self::Error> {
        let host = value.to_str().map_err(|_| {
            ForwardingError::InvalidHostFormat(String::from_utf8_lossy(value.as_bytes()).into())
        })?;

        Self::parse(host)
    }
}

impl fmt::Display for Host<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{port}", self.name),
            None => f.write_str(self.name),
        }
    }
}
