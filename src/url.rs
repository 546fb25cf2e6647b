use crate::error::{Error, Result};
use std::fmt;
use std::str;

const SCHEME_PREFIX: &str = "http://";

pub const DEFAULT_PORT: u16 = 80;

/// The parts of an absolute `http://` url needed to issue a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    host: String,
    port: u16,
    path: String,
}

impl ParsedUrl {
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(SCHEME_PREFIX)
            .ok_or_else(|| Error::InvalidUrl(s.into()))?;

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, format!("/{}", path)),
            None => (rest, "/".to_owned()),
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .map_err(|_| Error::InvalidPort(port.into()))?,
            ),
            None => (authority, DEFAULT_PORT),
        };

        Ok(ParsedUrl {
            host: host.into(),
            port,
            path,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `host:port`, suitable for dialing.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl str::FromStr for ParsedUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ParsedUrl::parse(s)
    }
}

impl fmt::Display for ParsedUrl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}:{}{}", SCHEME_PREFIX, self.host, self.port, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_test(input: &str, host: &str, port: u16, path: &str) {
        let url = ParsedUrl::parse(input).unwrap();
        assert_eq!(url.host(), host);
        assert_eq!(url.port(), port);
        assert_eq!(url.path(), path);
    }

    #[test]
    fn parse_simple() {
        parse_test("http://localhost", "localhost", 80, "/");
        parse_test("http://localhost/", "localhost", 80, "/");
        parse_test("http://localhost:8080", "localhost", 8080, "/");
        parse_test("http://localhost:8080/foo", "localhost", 8080, "/foo");
        parse_test("http://example.com/a/b/c/", "example.com", 80, "/a/b/c/");
    }

    #[test]
    fn parse_keeps_query_in_path() {
        parse_test("http://example.com/a?b=c", "example.com", 80, "/a?b=c");
    }

    #[test]
    fn parse_splits_on_first_colon() {
        assert!(matches!(
            ParsedUrl::parse("http://h:1:2/x"),
            Err(Error::InvalidPort(p)) if p == "1:2"
        ));
    }

    #[test]
    fn parse_missing_scheme() {
        assert!(matches!(
            ParsedUrl::parse("localhost:8080/foo"),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            ParsedUrl::parse("https://localhost/"),
            Err(Error::InvalidUrl(_))
        ));
        assert!(matches!(
            ParsedUrl::parse("HTTP://localhost/"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn parse_bad_port() {
        assert!(matches!(
            ParsedUrl::parse("http://localhost:http/"),
            Err(Error::InvalidPort(p)) if p == "http"
        ));
        assert!(matches!(
            ParsedUrl::parse("http://localhost:70000/"),
            Err(Error::InvalidPort(_))
        ));
        assert!(matches!(
            ParsedUrl::parse("http://localhost:/"),
            Err(Error::InvalidPort(_))
        ));
    }

    #[test]
    fn display() {
        let url: ParsedUrl = "http://localhost/foo".parse().unwrap();
        assert_eq!(&url.to_string(), "http://localhost:80/foo");
        assert_eq!(&url.authority(), "localhost:80");
    }
}
