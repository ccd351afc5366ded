use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hyper::header::{HeaderName, HeaderValue, AUTHORIZATION, USER_AGENT};
use hyper::Uri;
use url::Url;

use crate::checks::{default_checks, CheckSpec};
use crate::error::{ConfigError, Result};

pub const DEFAULT_VIRTUAL_USERS: u64 = 10;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(30);
pub const DEFAULT_SLEEP: Duration = Duration::from_secs(1);
/// Request timeout when the sleep interval is zero.
pub const FALLBACK_TIMEOUT: Duration = Duration::from_millis(5000);

const USER_AGENT_VALUE: &str = concat!("loadforge/", env!("CARGO_PKG_VERSION"));

/// Load test description as written by the user, before validation.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DslConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub target: Option<String>,

    #[serde(default = "default_virtual_users", alias = "vus")]
    pub virtual_users: u64,

    #[serde(default = "default_duration", with = "humantime_serde")]
    pub duration: Duration,

    #[serde(default = "default_sleep", with = "humantime_serde")]
    pub sleep: Duration,

    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    #[serde(default)]
    pub auth: Option<Auth>,

    #[serde(default)]
    pub query_params: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(default = "default_checks")]
    pub checks: Vec<CheckSpec>,

    /// Minimum fraction of passing check evaluations for a successful exit.
    #[serde(default)]
    pub check_threshold: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", content = "credentials")]
pub enum Auth {
    None,
    Basic { username: String, password: String },
    Bearer { token: String },
    ApiKey { key_name: String, key_value: String, add_to: ApiKeyLocation },
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
}

/// Values that take precedence over the config file (environment, then flags).
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub target: Option<String>,
    pub virtual_users: Option<u64>,
    pub duration: Option<Duration>,
    pub sleep: Option<Duration>,
    pub timeout: Option<Duration>,
    pub check_threshold: Option<f64>,
}

fn default_name() -> String {
    "default".to_string()
}

fn default_virtual_users() -> u64 {
    DEFAULT_VIRTUAL_USERS
}

fn default_duration() -> Duration {
    DEFAULT_DURATION
}

fn default_sleep() -> Duration {
    DEFAULT_SLEEP
}

impl Default for DslConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            target: None,
            virtual_users: DEFAULT_VIRTUAL_USERS,
            duration: DEFAULT_DURATION,
            sleep: DEFAULT_SLEEP,
            timeout: None,
            auth: None,
            query_params: None,
            headers: None,
            checks: default_checks(),
            check_threshold: None,
        }
    }
}

/// Validated, immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub name: String,
    pub target: Url,
    pub uri: Uri,
    pub virtual_users: usize,
    pub duration: Duration,
    pub sleep: Duration,
    pub timeout: Duration,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub checks: Vec<CheckSpec>,
    pub check_threshold: Option<f64>,
}

impl DslConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(target) = overrides.target {
            self.target = Some(target);
        }
        if let Some(vus) = overrides.virtual_users {
            self.virtual_users = vus;
        }
        if let Some(duration) = overrides.duration {
            self.duration = duration;
        }
        if let Some(sleep) = overrides.sleep {
            self.sleep = sleep;
        }
        if let Some(timeout) = overrides.timeout {
            self.timeout = Some(timeout);
        }
        if let Some(threshold) = overrides.check_threshold {
            self.check_threshold = Some(threshold);
        }
    }

    /// Timeout used when none is configured: the sleep interval, or
    /// [`FALLBACK_TIMEOUT`] when sleeping is disabled.
    pub fn effective_timeout(&self) -> Duration {
        match self.timeout {
            Some(timeout) => timeout,
            None if self.sleep.is_zero() => FALLBACK_TIMEOUT,
            None => self.sleep,
        }
    }

    pub fn validate(self) -> std::result::Result<RunConfig, ConfigError> {
        if self.virtual_users == 0 {
            return Err(ConfigError::NoVirtualUsers);
        }
        let virtual_users =
            usize::try_from(self.virtual_users).map_err(|e| ConfigError::InvalidValue {
                field: "virtual_users",
                reason: e.to_string(),
            })?;
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        ensure_schedulable("duration", self.duration)?;
        ensure_schedulable("sleep", self.sleep)?;
        let timeout = self.effective_timeout();
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        ensure_schedulable("timeout", timeout)?;
        if let Some(threshold) = self.check_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::InvalidThreshold(threshold));
            }
        }

        let raw = self
            .target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingTarget)?;
        let mut target = parse_target(raw)?;

        if let Some(params) = self.query_params.as_ref().filter(|p| !p.is_empty()) {
            let mut pairs = target.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }

        validate_checks(&self.checks)?;

        let mut headers = vec![(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))];
        if let Some(custom) = &self.headers {
            for (name, value) in custom {
                headers.push(header_pair(name, value)?);
            }
        }

        match &self.auth {
            Some(Auth::Basic { username, password }) => {
                let encoded = BASE64.encode(format!("{}:{}", username, password));
                headers.push((AUTHORIZATION, header_value(&format!("Basic {}", encoded))?));
            }
            Some(Auth::Bearer { token }) => {
                headers.push((AUTHORIZATION, header_value(&format!("Bearer {}", token))?));
            }
            Some(Auth::ApiKey { key_name, key_value, add_to: ApiKeyLocation::Header }) => {
                headers.push(header_pair(key_name, key_value)?);
            }
            Some(Auth::ApiKey { key_name, key_value, add_to: ApiKeyLocation::Query }) => {
                target.query_pairs_mut().append_pair(key_name, key_value);
            }
            Some(Auth::None) | None => {}
        }

        let uri = target
            .as_str()
            .parse::<Uri>()
            .map_err(|e| ConfigError::MalformedTarget {
                url: raw.to_string(),
                reason: e.to_string(),
            })?;

        Ok(RunConfig {
            name: self.name,
            target,
            uri,
            virtual_users,
            duration: self.duration,
            sleep: self.sleep,
            timeout,
            headers,
            checks: self.checks,
            check_threshold: self.check_threshold,
        })
    }
}

fn parse_target(raw: &str) -> std::result::Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::MalformedTarget {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" => {}
        #[cfg(feature = "tls")]
        "https" => {}
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::MalformedTarget {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

/// Spans are added to the run's start instant, so they must not overflow it.
fn ensure_schedulable(field: &'static str, span: Duration) -> std::result::Result<(), ConfigError> {
    match Instant::now().checked_add(span) {
        Some(_) => Ok(()),
        None => Err(ConfigError::InvalidValue {
            field,
            reason: format!("{} is too large", humantime::format_duration(span)),
        }),
    }
}

fn validate_checks(checks: &[CheckSpec]) -> std::result::Result<(), ConfigError> {
    if checks.is_empty() {
        return Err(ConfigError::NoChecks);
    }
    let mut seen = HashSet::new();
    for check in checks {
        if check.name.trim().is_empty() {
            return Err(ConfigError::EmptyCheckName);
        }
        if !seen.insert(check.name.as_str()) {
            return Err(ConfigError::DuplicateCheck(check.name.clone()));
        }
    }
    Ok(())
}

fn header_pair(name: &str, value: &str) -> std::result::Result<(HeaderName, HeaderValue), ConfigError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ConfigError::InvalidHeader(name.to_string()))?;
    Ok((name, header_value(value)?))
}

fn header_value(value: &str) -> std::result::Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::Predicate;

    fn with_target(target: &str) -> DslConfig {
        DslConfig {
            target: Some(target.to_string()),
            ..DslConfig::default()
        }
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = DslConfig::default();
        assert_eq!(config.virtual_users, 10);
        assert_eq!(config.duration, Duration::from_secs(30));
        assert_eq!(config.sleep, Duration::from_secs(1));
        assert_eq!(config.checks.len(), 2);
        assert_eq!(config.effective_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn parses_json_with_humantime_spans() {
        let config = DslConfig::from_json(
            r#"{
                "name": "smoke",
                "target": "http://localhost:8080/health",
                "vus": 3,
                "duration": "1m 30s",
                "sleep": "250ms",
                "checks": [
                    {"name": "ok", "status": 200},
                    {"name": "fast", "latency_below": "300ms"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.name, "smoke");
        assert_eq!(config.virtual_users, 3);
        assert_eq!(config.duration, Duration::from_secs(90));
        assert_eq!(config.sleep, Duration::from_millis(250));
        assert_eq!(config.checks[0].predicate, Predicate::Status(200));
        assert_eq!(
            config.checks[1].predicate,
            Predicate::LatencyBelow(Duration::from_millis(300))
        );
    }

    #[test]
    fn missing_checks_fall_back_to_defaults() {
        let config = DslConfig::from_json(r#"{"target": "http://localhost"}"#).unwrap();
        let names: Vec<_> = config.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["status was 200", "response time < 500ms"]);
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = with_target("http://a.example");
        config.apply_overrides(Overrides {
            target: Some("http://b.example".into()),
            virtual_users: Some(2),
            duration: Some(Duration::from_secs(5)),
            ..Overrides::default()
        });
        assert_eq!(config.target.as_deref(), Some("http://b.example"));
        assert_eq!(config.virtual_users, 2);
        assert_eq!(config.duration, Duration::from_secs(5));
        assert_eq!(config.sleep, DEFAULT_SLEEP);
    }

    #[test]
    fn rejects_zero_virtual_users() {
        let config = DslConfig {
            virtual_users: 0,
            ..with_target("http://localhost")
        };
        assert_eq!(config.validate().unwrap_err(), ConfigError::NoVirtualUsers);
    }

    #[test]
    fn rejects_zero_duration() {
        let config = DslConfig {
            duration: Duration::ZERO,
            ..with_target("http://localhost")
        };
        assert_eq!(config.validate().unwrap_err(), ConfigError::ZeroDuration);
    }

    #[test]
    fn rejects_spans_that_overflow_the_clock() {
        let huge = humantime::parse_duration("500000000000years").unwrap();

        let config = DslConfig {
            duration: huge,
            ..with_target("http://localhost")
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidValue { field: "duration", .. }
        ));

        let config = DslConfig {
            timeout: Some(huge),
            ..with_target("http://localhost")
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidValue { field: "timeout", .. }
        ));
    }

    #[test]
    fn empty_query_params_leave_uri_untouched() {
        let config = DslConfig {
            query_params: Some(BTreeMap::new()),
            ..with_target("http://localhost/items")
        };
        assert_eq!(config.validate().unwrap().uri.to_string(), "http://localhost/items");
    }

    #[test]
    fn rejects_missing_and_malformed_targets() {
        assert_eq!(
            DslConfig::default().validate().unwrap_err(),
            ConfigError::MissingTarget
        );
        assert!(matches!(
            with_target("not a url").validate().unwrap_err(),
            ConfigError::MalformedTarget { .. }
        ));
        assert_eq!(
            with_target("ftp://localhost/file").validate().unwrap_err(),
            ConfigError::UnsupportedScheme("ftp".into())
        );
    }

    #[test]
    fn rejects_duplicate_check_names() {
        let mut config = with_target("http://localhost");
        config.checks.push(config.checks[0].clone());
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::DuplicateCheck("status was 200".into())
        );
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let config = DslConfig {
            check_threshold: Some(1.5),
            ..with_target("http://localhost")
        };
        assert_eq!(config.validate().unwrap_err(), ConfigError::InvalidThreshold(1.5));
    }

    #[test]
    fn zero_sleep_uses_fallback_timeout() {
        let config = DslConfig {
            sleep: Duration::ZERO,
            ..with_target("http://localhost")
        };
        assert_eq!(config.validate().unwrap().timeout, FALLBACK_TIMEOUT);
    }

    #[test]
    fn query_params_and_api_key_land_in_uri() {
        let mut params = BTreeMap::new();
        params.insert("page".to_string(), "2".to_string());
        let config = DslConfig {
            query_params: Some(params),
            auth: Some(Auth::ApiKey {
                key_name: "api_key".into(),
                key_value: "secret".into(),
                add_to: ApiKeyLocation::Query,
            }),
            ..with_target("http://localhost/items")
        };
        let run = config.validate().unwrap();
        assert_eq!(run.uri.to_string(), "http://localhost/items?page=2&api_key=secret");
    }

    #[test]
    fn basic_auth_becomes_authorization_header() {
        let config = DslConfig {
            auth: Some(Auth::Basic {
                username: "user".into(),
                password: "pass".into(),
            }),
            ..with_target("http://localhost")
        };
        let run = config.validate().unwrap();
        let auth = run
            .headers
            .iter()
            .find(|(name, _)| name == AUTHORIZATION)
            .map(|(_, value)| value.to_str().unwrap().to_string());
        assert_eq!(auth.as_deref(), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());
        let config = DslConfig {
            headers: Some(headers),
            ..with_target("http://localhost")
        };
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigError::InvalidHeader("bad header".into())
        );
    }
}
