//! Connection parameters.

use std::{borrow::Cow, collections::BTreeMap, fmt, iter::Peekable, str::Chars};

use percent_encoding::percent_decode_str;
use url::{Host, Url};

/// Comma-separated list of hostnames, literal addresses, or a socket directory.
pub const HOST: &str = "host";
/// Comma-separated list of numeric addresses, one per `host` entry.
pub const HOSTADDR: &str = "hostaddr";
/// Comma-separated list of ports: either one for all hosts or one per host.
pub const PORT: &str = "port";

/// Environment variables consulted for parameters missing from a conninfo string.
const ENV_DEFAULTS: &[(&str, &str)] = &[
    (HOST, "PGHOST"),
    (HOSTADDR, "PGHOSTADDR"),
    (PORT, "PGPORT"),
];

/// Prefixes marking a connection URI rather than a `key=value` string.
const URI_SCHEMES: [&str; 2] = ["postgresql://", "postgres://"];

/// Errors encountered while parsing a connection string or setting a parameter.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A keyword was not followed by `=`.
    #[error("missing \"=\" after \"{keyword}\" in connection info string")]
    MissingEquals {
        /// Keyword preceding the missing `=`.
        keyword: String,
    },
    /// An `=` was found with no keyword before it.
    #[error("empty keyword in connection info string")]
    EmptyKeyword,
    /// A single-quoted value was never closed.
    #[error("unterminated quoted string in connection info string (keyword \"{keyword}\")")]
    UnterminatedQuote {
        /// Keyword whose value is unterminated.
        keyword: String,
    },
    /// A keyword contains whitespace or `=`, so it cannot be written back.
    #[error("invalid keyword \"{keyword}\" in connection info string")]
    InvalidKeyword {
        /// The offending keyword.
        keyword: String,
    },
    /// A host and port in a connection URI could not be parsed.
    #[error("invalid host \"{host}\" in connection URI: {source}")]
    InvalidUriHost {
        /// Host specification as written in the URI.
        host: String,
        /// Underlying parse error.
        source: url::ParseError,
    },
    /// A percent-encoded URI component does not decode to UTF-8.
    #[error("invalid percent-encoding in connection URI: \"{0}\"")]
    InvalidPercentEncoding(String),
}

/// Parsed connection parameters, keyed by parameter name.
///
/// Only `host`, `hostaddr` and `port` carry meaning for address resolution;
/// every other parameter is carried along untouched.
///
/// ```
/// use hostaddr_rs::ConnParams;
/// let params = ConnParams::parse("host=foo.com,qux.com port=5432 user='my user'").unwrap();
/// assert_eq!(params.get("host"), Some("foo.com,qux.com"));
/// assert_eq!(params.get("user"), Some("my user"));
/// assert_eq!(params.to_string(), "host=foo.com,qux.com port=5432 user='my user'");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnParams(BTreeMap<String, String>);

impl ConnParams {
    /// Creates an empty set of parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a libpq-style connection string, either `key=value` pairs or a
    /// `postgresql://` URI.
    ///
    /// In the `key=value` form, values may be single-quoted to contain
    /// whitespace; inside or outside quotes, a backslash escapes the character
    /// that follows it.
    ///
    /// ```
    /// use hostaddr_rs::ConnParams;
    /// let params = ConnParams::parse("postgresql://me@db1:5432,db2:5433/app?sslmode=require").unwrap();
    /// assert_eq!(
    ///     params.to_string(),
    ///     "dbname=app host=db1,db2 port=5432,5433 sslmode=require user=me"
    /// );
    /// ```
    pub fn parse(conninfo: &str) -> Result<Self, ParseError> {
        if let Some(uri) = URI_SCHEMES
            .iter()
            .find_map(|scheme| conninfo.strip_prefix(scheme))
        {
            return Self::parse_uri(uri);
        }

        let mut params = Self::new();
        let mut chars = conninfo.chars().peekable();
        loop {
            skip_whitespace(&mut chars);
            if chars.peek().is_none() {
                break;
            }

            let mut keyword = String::new();
            while let Some(&c) = chars.peek() {
                if c == '=' || c.is_whitespace() {
                    break;
                }
                keyword.push(c);
                chars.next();
            }

            skip_whitespace(&mut chars);
            if chars.next() != Some('=') {
                return Err(ParseError::MissingEquals { keyword });
            }
            if keyword.is_empty() {
                return Err(ParseError::EmptyKeyword);
            }
            skip_whitespace(&mut chars);

            let value = if chars.peek() == Some(&'\'') {
                chars.next();
                match parse_quoted(&mut chars) {
                    Some(value) => value,
                    None => return Err(ParseError::UnterminatedQuote { keyword }),
                }
            } else {
                parse_unquoted(&mut chars)
            };
            params.0.insert(keyword, value);
        }
        Ok(params)
    }

    /// Parses the part of a connection URI following its scheme:
    /// `[user[:password]@][host[:port]][,...][/dbname][?key=value[&...]]`.
    fn parse_uri(uri: &str) -> Result<Self, ParseError> {
        let mut params = Self::new();
        let (authority, rest) = uri.split_at(uri.find(['/', '?']).unwrap_or(uri.len()));
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let hostlist = match authority.rsplit_once('@') {
            Some((userinfo, hostlist)) => {
                let (user, password) = match userinfo.split_once(':') {
                    Some((user, password)) => (user, Some(password)),
                    None => (userinfo, None),
                };
                if !user.is_empty() {
                    params.0.insert(String::from("user"), decode(user)?.into_owned());
                }
                if let Some(password) = password {
                    params.0.insert(String::from("password"), decode(password)?.into_owned());
                }
                hostlist
            }
            None => authority,
        };

        if !hostlist.is_empty() {
            let specs = hostlist
                .split(',')
                .map(parse_host_spec)
                .collect::<Result<Vec<_>, _>>()?;
            let hosts: Vec<&str> = specs.iter().map(|(host, _)| host.as_str()).collect();
            params.set(HOST, hosts.join(","));
            if specs.iter().any(|(_, port)| port.is_some()) {
                let ports: Vec<String> = specs
                    .iter()
                    .map(|(_, port)| port.map(|port| port.to_string()).unwrap_or_default())
                    .collect();
                params.set(PORT, ports.join(","));
            }
        }

        let dbname = path.trim_start_matches('/');
        if !dbname.is_empty() {
            params.0.insert(String::from("dbname"), decode(dbname)?.into_owned());
        }

        for pair in query.into_iter().flat_map(|query| query.split('&')) {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').ok_or_else(|| ParseError::MissingEquals {
                keyword: pair.to_string(),
            })?;
            params.insert(decode(key)?, decode(value)?)?;
        }
        Ok(params)
    }

    /// Serializes the parameters back into a `key=value` connection string.
    pub fn to_conninfo(&self) -> String {
        self.to_string()
    }

    /// Gets the value of a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Gets the value of a parameter, treating an empty value as absent.
    pub fn get_nonempty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    /// Sets a parameter, returning its previous value.
    ///
    /// Keywords must be non-empty and free of whitespace and `=`, so that the
    /// parameters can always be written back as a connection string.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, ParseError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ParseError::EmptyKeyword);
        }
        if key.contains(|c: char| c == '=' || c.is_whitespace()) {
            return Err(ParseError::InvalidKeyword { keyword: key });
        }
        Ok(self.0.insert(key, value.into()))
    }

    /// Sets one of the well-known parameters.
    pub(crate) fn set(&mut self, key: &'static str, value: String) {
        self.0.insert(String::from(key), value);
    }

    /// Collects parameters from `(key, value)` pairs, validating each keyword
    /// as [`insert`](Self::insert) does.
    pub fn try_from_pairs<K, V>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, ParseError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.insert(key, value)?;
        }
        Ok(params)
    }

    /// Removes a parameter, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Determines if a parameter is present, even if empty.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Determines if there are no parameters at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over parameters in keyword order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fills in `host`, `hostaddr` and `port` from `PGHOST`, `PGHOSTADDR` and
    /// `PGPORT` when they are missing, reading variables through `env`.
    pub fn with_env_defaults(mut self, env: impl Fn(&str) -> Option<String>) -> Self {
        for &(key, var) in ENV_DEFAULTS {
            if self.contains_key(key) {
                continue;
            }
            if let Some(value) = env(var) {
                self.set(key, value);
            }
        }
        self
    }

    /// [`with_env_defaults`](Self::with_env_defaults) using the process environment.
    pub fn with_process_env(self) -> Self {
        self.with_env_defaults(|var| std::env::var(var).ok())
    }
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

/// Reads up to the closing quote, which is consumed. `None` if there is none.
fn parse_quoted(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut value = String::new();
    loop {
        match chars.next()? {
            '\'' => return Some(value),
            '\\' => value.push(chars.next()?),
            c => value.push(c),
        }
    }
}

fn parse_unquoted(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut value = String::new();
    while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
        if c == '\\' {
            // A trailing backslash escapes nothing and is dropped
            if let Some(escaped) = chars.next() {
                value.push(escaped);
            }
        } else {
            value.push(c);
        }
    }
    value
}

fn decode(component: &str) -> Result<Cow<'_, str>, ParseError> {
    percent_decode_str(component)
        .decode_utf8()
        .map_err(|_| ParseError::InvalidPercentEncoding(component.to_string()))
}

/// Splits `host[:port]` (with `[...]` around IPv6 literals) into a decoded
/// host and its port.
fn parse_host_spec(spec: &str) -> Result<(String, Option<u16>), ParseError> {
    if spec.is_empty() {
        return Ok((String::new(), None));
    }
    let invalid = |source| ParseError::InvalidUriHost {
        host: spec.to_string(),
        source,
    };
    let url = Url::parse(&format!("postgresql://{spec}")).map_err(invalid)?;
    let host = match url.host() {
        Some(Host::Domain(domain)) => decode(domain)?.into_owned(),
        Some(Host::Ipv4(addr)) => addr.to_string(),
        Some(Host::Ipv6(addr)) => addr.to_string(),
        None => String::new(),
    };
    Ok((host, url.port()))
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\')
}

impl fmt::Display for ConnParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (key, value)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            if needs_quoting(value) {
                let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
                write!(f, "{key}='{escaped}'")?;
            } else {
                write!(f, "{key}={value}")?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for ConnParams {
    type Err = ParseError;

    fn from_str(conninfo: &str) -> Result<Self, Self::Err> {
        Self::parse(conninfo)
    }
}
