use crate::{Error, Result};

/// SASL/PLAIN username and password. Both halves are always present.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &mask_password(&self.password))
            .finish()
    }
}

/// Where a consumer session reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerTarget {
    /// A single explicit partition, no group membership or offset commits.
    Partition(i32),
    /// Group-managed assignment with periodic offset commits.
    Group(String),
}

/// Everything needed to open producer or consumer sessions for one
/// invocation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    brokers: Vec<String>,
    topic: String,
    credentials: Option<Credentials>,
    target: Option<ConsumerTarget>,
}

impl SessionConfig {
    /// Validates the broker list and topic.
    ///
    /// Each broker entry may itself be a comma separated list, so
    /// `["a:9092,b:9092"]` and `["a:9092", "b:9092"]` are equivalent.
    pub fn new<S: AsRef<str>>(brokers: &[S], topic: impl Into<String>) -> Result<Self> {
        let brokers = parse_brokers(brokers)?;

        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(Error::InvalidConfiguration(
                "topic must not be empty".to_string(),
            ));
        }

        Ok(Self {
            brokers,
            topic,
            credentials: None,
            target: None,
        })
    }

    /// Attaches SASL credentials. Username and password must be given
    /// together or not at all.
    pub fn with_credentials(
        mut self,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let username = username.filter(|u| !u.is_empty());
        let password = password.filter(|p| !p.is_empty());

        self.credentials = match (username, password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            (None, None) => None,
            _ => {
                return Err(Error::InvalidConfiguration(
                    "username and password must be provided together".to_string(),
                ))
            }
        };
        Ok(self)
    }

    /// Chooses partition mode or group mode for consumption.
    ///
    /// An explicit partition wins over a group id when both are given.
    pub fn with_consumer_target(
        mut self,
        partition: Option<i32>,
        group_id: Option<String>,
    ) -> Result<Self> {
        let group_id = group_id.map(|g| g.trim().to_string()).filter(|g| !g.is_empty());

        self.target = match (partition, group_id) {
            (Some(p), _) if p < 0 => {
                return Err(Error::InvalidConfiguration(format!(
                    "partition must be >= 0, got {}",
                    p
                )))
            }
            (Some(p), _) => Some(ConsumerTarget::Partition(p)),
            (None, Some(group)) => Some(ConsumerTarget::Group(group)),
            (None, None) => None,
        };
        Ok(self)
    }

    pub fn brokers(&self) -> &[String] {
        &self.brokers
    }

    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// The consumer target, or `InvalidConfiguration` when none was chosen.
    pub fn consumer_target(&self) -> Result<&ConsumerTarget> {
        self.target.as_ref().ok_or_else(|| {
            Error::InvalidConfiguration(
                "consuming requires either a partition or a group id".to_string(),
            )
        })
    }
}

fn parse_brokers<S: AsRef<str>>(raw: &[S]) -> Result<Vec<String>> {
    let brokers: Vec<String> = raw
        .iter()
        .flat_map(|entry| entry.as_ref().split(','))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if brokers.is_empty() {
        return Err(Error::InvalidConfiguration(
            "bootstrap servers must not be empty".to_string(),
        ));
    }

    for broker in &brokers {
        validate_address(broker)?;
    }

    Ok(brokers)
}

fn validate_address(address: &str) -> Result<()> {
    let invalid = || {
        Error::InvalidConfiguration(format!(
            "invalid broker address '{}', expected host:port",
            address
        ))
    };

    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}

/// Hides the middle of a password for display, keeping two characters on
/// each side. Passwords of four characters or fewer are returned unchanged.
pub fn mask_password(password: &str) -> String {
    let chars: Vec<char> = password.chars().collect();
    if chars.len() <= 4 {
        return password.to_string();
    }

    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 4), tail)
}
