//! Configuration management.
//!
//! Configuration is read from `config.toml` in the platform config directory
//! (`~/.config/haven/` on Linux) or from an explicit path. String values may
//! reference environment variables as `${NAME}`; credentials are held as
//! [`SecretString`] once loaded.

use regex::Regex;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Main configuration for haven.
#[derive(Debug, Clone, Default)]
pub struct HavenConfig {
    /// Remote row store.
    pub store: StoreConfig,
    /// SMS provider.
    pub messaging: MessagingConfig,
    /// SOS session behaviour.
    pub emergency: EmergencyConfig,
    /// Recording service and archiving.
    pub recording: RecordingConfig,
    /// Location timeouts.
    pub location: LocationConfig,
    /// Logging output.
    pub logging: LoggingSettings,
}

/// Row store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// In-process tables (development and tests).
    #[default]
    Memory,
    /// Hosted Supabase project.
    Supabase,
}

impl StoreBackend {
    /// Parses a backend name. Unknown names fall back to memory.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "supabase" | "remote" => Self::Supabase,
            _ => Self::Memory,
        }
    }
}

/// Row store configuration.
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Which backend to use.
    pub backend: StoreBackend,
    /// Supabase project URL.
    pub url: Option<String>,
    /// Supabase anon key.
    pub anon_key: Option<SecretString>,
    /// Signed-in user's access token.
    pub access_token: Option<SecretString>,
}

/// SMS provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmsBackend {
    /// Log messages without sending them.
    #[default]
    Mock,
    /// Twilio REST API.
    Twilio,
}

impl SmsBackend {
    /// Parses a provider name. Unknown names fall back to mock.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "twilio" => Self::Twilio,
            _ => Self::Mock,
        }
    }
}

/// SMS provider configuration.
#[derive(Debug, Clone)]
pub struct MessagingConfig {
    /// Which provider to use.
    pub provider: SmsBackend,
    /// Twilio account SID.
    pub account_sid: Option<String>,
    /// Twilio auth token.
    pub auth_token: Option<SecretString>,
    /// Sender number in E.164 form.
    pub from_number: Option<String>,
    /// Twilio API base URL.
    pub api_base: String,
    /// Country code prepended to 10-digit numbers.
    pub default_country_code: String,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            provider: SmsBackend::Mock,
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_base: crate::messaging::TwilioSms::DEFAULT_API_BASE.to_string(),
            default_country_code: "91".to_string(),
        }
    }
}

/// SOS session configuration.
#[derive(Debug, Clone)]
pub struct EmergencyConfig {
    /// Number dialled after activation; `None` disables the call.
    pub call_number: Option<String>,
    /// Delay between activation and the call.
    pub call_delay: Duration,
    /// Alert text; the map link is appended.
    pub alert_message: String,
    /// Text of the "feeling unsafe" check-in alert.
    pub check_in_message: String,
    /// Minimum spacing between alert resends; zero disables resends.
    pub resend_interval: Duration,
    /// Number used by the "call emergency services" quick action.
    pub services_number: String,
    /// Base URL of the map link.
    pub maps_base_url: String,
}

impl Default for EmergencyConfig {
    fn default() -> Self {
        Self {
            call_number: None,
            call_delay: Duration::from_millis(1500),
            alert_message: "EMERGENCY ALERT: I need help! This is my current location:"
                .to_string(),
            check_in_message:
                "I'm feeling unsafe and might need help. This is my current location:"
                    .to_string(),
            resend_interval: Duration::from_secs(30),
            services_number: "112".to_string(),
            maps_base_url: crate::models::DEFAULT_MAPS_BASE_URL.to_string(),
        }
    }
}

/// Recording configuration.
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Recordings stop on their own after this long.
    pub max_duration: Duration,
    /// Chunk delivery interval.
    pub timeslice: Duration,
    /// Video bitrate in bits per second.
    pub video_bits_per_second: u32,
    /// Audio bitrate in bits per second.
    pub audio_bits_per_second: u32,
    /// Whether the SOS session records video (audio is always on).
    pub video: bool,
    /// Where finished recordings are saved.
    pub download_dir: PathBuf,
    /// Whether finished recordings are backed up to the store.
    pub upload: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(300),
            timeslice: Duration::from_millis(500),
            video_bits_per_second: 2_500_000,
            audio_bits_per_second: 128_000,
            video: true,
            download_dir: default_download_dir(),
            upload: true,
        }
    }
}

/// Location timeouts.
#[derive(Debug, Clone)]
pub struct LocationConfig {
    /// Timeout of each platform watch request.
    pub watch_timeout: Duration,
    /// Timeout of the fix taken at activation.
    pub activation_fix_timeout: Duration,
    /// Timeout of the fix taken by quick actions.
    pub quick_fix_timeout: Duration,
    /// Cache window for non-emergency subscribers.
    pub standard_max_staleness: Duration,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            watch_timeout: Duration::from_secs(10),
            activation_fix_timeout: Duration::from_secs(15),
            quick_fix_timeout: Duration::from_secs(5),
            standard_max_staleness: Duration::from_secs(5),
        }
    }
}

/// Logging section, resolved into
/// [`LoggingConfig`](crate::observability::LoggingConfig) at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `haven=debug`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<String>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Store section.
    pub store: Option<ConfigFileStore>,
    /// Messaging section.
    pub messaging: Option<ConfigFileMessaging>,
    /// Emergency section.
    pub emergency: Option<ConfigFileEmergency>,
    /// Recording section.
    pub recording: Option<ConfigFileRecording>,
    /// Location section.
    pub location: Option<ConfigFileLocation>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

/// Store section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStore {
    /// `memory` or `supabase`.
    pub backend: Option<String>,
    /// Project URL.
    pub url: Option<String>,
    /// Anon key.
    pub anon_key: Option<String>,
    /// Access token.
    pub access_token: Option<String>,
}

/// Messaging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMessaging {
    /// `mock` or `twilio`.
    pub provider: Option<String>,
    /// Account SID.
    pub account_sid: Option<String>,
    /// Auth token.
    pub auth_token: Option<String>,
    /// Sender number.
    pub from_number: Option<String>,
    /// API base URL.
    pub api_base: Option<String>,
    /// Default country code.
    pub default_country_code: Option<String>,
}

/// Emergency section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileEmergency {
    /// Number to call on activation.
    pub call_number: Option<String>,
    /// Call delay in milliseconds.
    pub call_delay_ms: Option<u64>,
    /// Alert text.
    pub alert_message: Option<String>,
    /// Check-in text.
    pub check_in_message: Option<String>,
    /// Resend spacing in seconds.
    pub resend_interval_secs: Option<u64>,
    /// Emergency services number.
    pub services_number: Option<String>,
    /// Map link base URL.
    pub maps_base_url: Option<String>,
}

/// Recording section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRecording {
    /// Ceiling in seconds.
    pub max_duration_secs: Option<u64>,
    /// Chunk interval in milliseconds.
    pub timeslice_ms: Option<u64>,
    /// Video bitrate.
    pub video_bits_per_second: Option<u32>,
    /// Audio bitrate.
    pub audio_bits_per_second: Option<u32>,
    /// Record video during SOS.
    pub video: Option<bool>,
    /// Download directory.
    pub download_dir: Option<String>,
    /// Upload backups.
    pub upload: Option<bool>,
}

/// Location section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLocation {
    /// Watch timeout in seconds.
    pub watch_timeout_secs: Option<u64>,
    /// Activation fix timeout in seconds.
    pub activation_fix_timeout_secs: Option<u64>,
    /// Quick-action fix timeout in seconds.
    pub quick_fix_timeout_secs: Option<u64>,
    /// Standard cache window in seconds.
    pub standard_max_staleness_secs: Option<u64>,
}

impl HavenConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::operation("read_config_file", format!("{}: {e}", path.display()))
        })?;
        Self::parse(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for [`ConfigFile`].
    pub fn parse(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| crate::Error::operation("parse_config_file", e))?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `$HAVEN_CONFIG`, then the platform config dir, then
    /// `~/.config/haven/config.toml`. Returns defaults if none is found.
    #[must_use]
    pub fn load_default() -> Self {
        for path in Self::candidate_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                },
            }
        }
        Self::default()
    }

    /// Config file locations searched by [`load_default`](Self::load_default).
    #[must_use]
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(explicit) = std::env::var("HAVEN_CONFIG") {
            paths.push(PathBuf::from(explicit));
        }
        if let Some(base_dirs) = directories::BaseDirs::new() {
            paths.push(base_dirs.config_dir().join("haven").join("config.toml"));
            paths.push(
                base_dirs
                    .home_dir()
                    .join(".config")
                    .join("haven")
                    .join("config.toml"),
            );
        }
        paths
    }

    /// Converts a `ConfigFile` to `HavenConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(store) = file.store {
            if let Some(backend) = store.backend {
                config.store.backend = StoreBackend::parse(&backend);
            }
            config.store.url = expand_opt(store.url);
            config.store.anon_key = expand_opt(store.anon_key).map(SecretString::from);
            config.store.access_token = expand_opt(store.access_token).map(SecretString::from);
        }

        if let Some(messaging) = file.messaging {
            if let Some(provider) = messaging.provider {
                config.messaging.provider = SmsBackend::parse(&provider);
            }
            config.messaging.account_sid = expand_opt(messaging.account_sid);
            config.messaging.auth_token = expand_opt(messaging.auth_token).map(SecretString::from);
            config.messaging.from_number = expand_opt(messaging.from_number);
            if let Some(base) = expand_opt(messaging.api_base) {
                config.messaging.api_base = base;
            }
            if let Some(cc) = messaging.default_country_code {
                config.messaging.default_country_code = cc.trim_start_matches('+').to_string();
            }
        }

        if let Some(emergency) = file.emergency {
            Self::apply_emergency(&mut config.emergency, emergency);
        }
        if let Some(recording) = file.recording {
            Self::apply_recording(&mut config.recording, recording);
        }
        if let Some(location) = file.location {
            let l = &mut config.location;
            if let Some(v) = location.watch_timeout_secs {
                l.watch_timeout = Duration::from_secs(v);
            }
            if let Some(v) = location.activation_fix_timeout_secs {
                l.activation_fix_timeout = Duration::from_secs(v);
            }
            if let Some(v) = location.quick_fix_timeout_secs {
                l.quick_fix_timeout = Duration::from_secs(v);
            }
            if let Some(v) = location.standard_max_staleness_secs {
                l.standard_max_staleness = Duration::from_secs(v);
            }
        }
        if let Some(logging) = file.logging {
            config.logging = LoggingSettings {
                level: logging.level,
                format: logging.format,
                file: expand_opt(logging.file),
            };
        }

        config
    }

    fn apply_emergency(target: &mut EmergencyConfig, file: ConfigFileEmergency) {
        target.call_number = expand_opt(file.call_number).filter(|n| !n.trim().is_empty());
        if let Some(ms) = file.call_delay_ms {
            target.call_delay = Duration::from_millis(ms);
        }
        if let Some(message) = file.alert_message {
            target.alert_message = message;
        }
        if let Some(message) = file.check_in_message {
            target.check_in_message = message;
        }
        if let Some(secs) = file.resend_interval_secs {
            target.resend_interval = Duration::from_secs(secs);
        }
        if let Some(number) = file.services_number {
            target.services_number = number;
        }
        if let Some(url) = file.maps_base_url {
            target.maps_base_url = url;
        }
    }

    fn apply_recording(target: &mut RecordingConfig, file: ConfigFileRecording) {
        if let Some(secs) = file.max_duration_secs {
            target.max_duration = Duration::from_secs(secs);
        }
        if let Some(ms) = file.timeslice_ms {
            target.timeslice = Duration::from_millis(ms);
        }
        if let Some(bps) = file.video_bits_per_second {
            target.video_bits_per_second = bps;
        }
        if let Some(bps) = file.audio_bits_per_second {
            target.audio_bits_per_second = bps;
        }
        if let Some(video) = file.video {
            target.video = video;
        }
        if let Some(dir) = expand_opt(file.download_dir) {
            target.download_dir = PathBuf::from(dir);
        }
        if let Some(upload) = file.upload {
            target.upload = upload;
        }
    }

    /// Sets the store backend.
    #[must_use]
    pub const fn with_store_backend(mut self, backend: StoreBackend) -> Self {
        self.store.backend = backend;
        self
    }

    /// Sets the download directory for recordings.
    #[must_use]
    pub fn with_download_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.recording.download_dir = path.into();
        self
    }
}

static ENV_REF: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").ok());

/// Replaces `${NAME}` references with environment values.
///
/// Unset variables expand to an empty string.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let Some(pattern) = ENV_REF.as_ref() else {
        return value.to_string();
    };
    pattern
        .replace_all(value, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

/// Expands a value and drops it when it ends up empty.
fn expand_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| expand_env_vars(&v))
        .filter(|v| !v.trim().is_empty())
}

fn default_download_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let config = HavenConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.messaging.provider, SmsBackend::Mock);
        assert_eq!(config.messaging.default_country_code, "91");
        assert_eq!(config.emergency.call_delay, Duration::from_millis(1500));
        assert_eq!(config.emergency.resend_interval, Duration::from_secs(30));
        assert_eq!(config.emergency.services_number, "112");
        assert_eq!(config.recording.max_duration, Duration::from_secs(300));
        assert_eq!(config.recording.timeslice, Duration::from_millis(500));
        assert_eq!(config.location.activation_fix_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_parse_sections() {
        let config = HavenConfig::parse(
            r#"
            [store]
            backend = "supabase"
            url = "https://abc.supabase.co"
            anon_key = "anon"

            [messaging]
            provider = "twilio"
            account_sid = "AC123"
            default_country_code = "+1"

            [emergency]
            call_number = "+15550100"
            resend_interval_secs = 0

            [recording]
            max_duration_secs = 60
            video = false
            "#,
        )
        .expect("parse");

        assert_eq!(config.store.backend, StoreBackend::Supabase);
        assert_eq!(
            config.store.anon_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("anon".to_string())
        );
        assert_eq!(config.messaging.provider, SmsBackend::Twilio);
        assert_eq!(config.messaging.default_country_code, "1");
        assert_eq!(config.emergency.call_number.as_deref(), Some("+15550100"));
        assert_eq!(config.emergency.resend_interval, Duration::ZERO);
        assert_eq!(config.recording.max_duration, Duration::from_secs(60));
        assert!(!config.recording.video);
    }

    #[test]
    fn test_expand_env_vars() {
        let path = std::env::var("PATH").unwrap_or_default();
        assert_eq!(expand_env_vars("${PATH}"), path);
        assert_eq!(expand_env_vars("plain"), "plain");
        assert_eq!(expand_env_vars("${HAVEN_TEST_SURELY_UNSET_VAR}"), "");
    }

    #[test]
    fn test_unset_secret_is_dropped() {
        let config = HavenConfig::parse(
            r#"
            [messaging]
            auth_token = "${HAVEN_TEST_SURELY_UNSET_TOKEN}"
            "#,
        )
        .expect("parse");
        assert!(config.messaging.auth_token.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[emergency]\nservices_number = \"911\"\n").expect("write");
        let config = HavenConfig::load_from_file(&path).expect("load");
        assert_eq!(config.emergency.services_number, "911");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(HavenConfig::parse("[store").is_err());
    }
}
