//! Config CLI command.

use crate::config::{HavenConfig, SmsBackend, StoreBackend};
use secrecy::SecretString;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Shows the effective configuration with secrets masked.
#[derive(Debug, Clone, Default)]
pub struct ConfigCommand {
    source: Option<PathBuf>,
}

impl ConfigCommand {
    /// Creates the command. `source` is the file the config was read from.
    #[must_use]
    pub const fn new(source: Option<PathBuf>) -> Self {
        Self { source }
    }

    /// Renders `config`.
    #[must_use]
    pub fn run(&self, config: &HavenConfig) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Current Configuration");
        let _ = writeln!(out, "=====================");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Config File: {}",
            self.source
                .as_ref()
                .map_or_else(|| "(none - using defaults)".to_string(), |p| p.display().to_string())
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "Store:");
        let backend = match config.store.backend {
            StoreBackend::Memory => "memory",
            StoreBackend::Supabase => "supabase",
        };
        let _ = writeln!(out, "  Backend: {backend}");
        let _ = writeln!(out, "  URL: {}", config.store.url.as_deref().unwrap_or("(unset)"));
        let _ = writeln!(out, "  Anon Key: {}", mask(config.store.anon_key.as_ref()));
        let _ = writeln!(out, "  Access Token: {}", mask(config.store.access_token.as_ref()));
        let _ = writeln!(out);

        let _ = writeln!(out, "Messaging:");
        let provider = match config.messaging.provider {
            SmsBackend::Mock => "mock",
            SmsBackend::Twilio => "twilio",
        };
        let _ = writeln!(out, "  Provider: {provider}");
        let _ = writeln!(
            out,
            "  Account SID: {}",
            config.messaging.account_sid.as_deref().unwrap_or("(unset)")
        );
        let _ = writeln!(out, "  Auth Token: {}", mask(config.messaging.auth_token.as_ref()));
        let _ = writeln!(
            out,
            "  From: {}",
            config.messaging.from_number.as_deref().unwrap_or("(unset)")
        );
        let _ = writeln!(out, "  Country Code: +{}", config.messaging.default_country_code);
        let _ = writeln!(out);

        let emergency = &config.emergency;
        let _ = writeln!(out, "Emergency:");
        let _ = writeln!(
            out,
            "  Call Number: {}",
            emergency.call_number.as_deref().unwrap_or("(disabled)")
        );
        let _ = writeln!(out, "  Call Delay: {}ms", emergency.call_delay.as_millis());
        let _ = writeln!(out, "  Alert Resend Interval: {}s", emergency.resend_interval.as_secs());
        let _ = writeln!(out, "  Services Number: {}", emergency.services_number);
        let _ = writeln!(out, "  Maps URL: {}", emergency.maps_base_url);
        let _ = writeln!(out);

        let recording = &config.recording;
        let _ = writeln!(out, "Recording:");
        let _ = writeln!(out, "  Max Duration: {}s", recording.max_duration.as_secs());
        let _ = writeln!(out, "  Timeslice: {}ms", recording.timeslice.as_millis());
        let _ = writeln!(out, "  Video: {}", recording.video);
        let _ = writeln!(out, "  Download Dir: {}", recording.download_dir.display());
        let _ = writeln!(out, "  Upload: {}", recording.upload);
        let _ = writeln!(out);

        let location = &config.location;
        let _ = writeln!(out, "Location:");
        let _ = writeln!(out, "  Watch Timeout: {}s", location.watch_timeout.as_secs());
        let _ = writeln!(
            out,
            "  Activation Fix Timeout: {}s",
            location.activation_fix_timeout.as_secs()
        );
        let _ = writeln!(out, "  Quick Fix Timeout: {}s", location.quick_fix_timeout.as_secs());
        let _ = writeln!(out);

        let _ = writeln!(out, "Logging:");
        let _ = writeln!(
            out,
            "  Level: {}",
            config.logging.level.as_deref().unwrap_or("info")
        );
        let _ = writeln!(
            out,
            "  Format: {}",
            config.logging.format.as_deref().unwrap_or("pretty")
        );
        let _ = writeln!(
            out,
            "  File: {}",
            config.logging.file.as_deref().unwrap_or("(stderr)")
        );
        out
    }
}

const fn mask(secret: Option<&SecretString>) -> &'static str {
    match secret {
        Some(_) => "********",
        None => "(unset)",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_are_masked() {
        let mut config = HavenConfig::default();
        config.messaging.auth_token = Some(SecretString::from("tok-123".to_string()));
        let output = ConfigCommand::new(None).run(&config);
        assert!(output.contains("Auth Token: ********"));
        assert!(!output.contains("tok-123"));
        assert!(output.contains("(none - using defaults)"));
    }

    #[test]
    fn test_shows_defaults() {
        let output = ConfigCommand::default().run(&HavenConfig::default());
        assert!(output.contains("Backend: memory"));
        assert!(output.contains("Provider: mock"));
        assert!(output.contains("Services Number: 112"));
        assert!(output.contains("Alert Resend Interval: 30s"));
    }
}
