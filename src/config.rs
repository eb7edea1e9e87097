//! Configuration for the conversion service.
//!
//! All behaviour is controlled through [`BotConfig`], built via its
//! [`BotConfigBuilder`]. The config is constructed once at startup and passed
//! explicitly to each component — there is no ambient global state, so two
//! services with different settings can coexist in one process (and tests can
//! use aggressive expiry windows without touching the environment).

use crate::error::Img2AnyError;
use std::time::Duration;

/// Configuration for a [`crate::service::BotService`].
///
/// Built via [`BotConfig::builder()`] or [`BotConfig::default()`].
///
/// # Example
/// ```rust
/// use img2any::BotConfig;
/// use std::time::Duration;
///
/// let config = BotConfig::builder()
///     .expiry(Duration::from_secs(300))
///     .jpeg_quality(85)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// How long an unattended job waits for a format selection before the
    /// sweep expires it. Default: 10 minutes.
    ///
    /// Chat users routinely upload and walk away. Without expiry every
    /// abandoned upload would hold scratch storage forever. Ten minutes
    /// comfortably covers "got distracted" without accumulating junk.
    pub expiry: Duration,

    /// Interval between expiry sweeps. Default: 30 seconds.
    ///
    /// The sweep only walks an in-memory map, so frequent runs are cheap;
    /// the interval bounds how long past `expiry` a stale job can linger.
    pub sweep_interval: Duration,

    /// Maximum accepted upload size in bytes. Default: 20 MiB.
    ///
    /// Matches the upload cap of common chat transports. Anything larger is
    /// rejected at intake before touching scratch storage.
    pub max_upload_bytes: usize,

    /// Timeout for downloading a remote artifact at intake, in seconds.
    /// Default: 60.
    pub download_timeout_secs: u64,

    /// JPEG encoder quality, 1–100. Default: 90.
    ///
    /// 90 is visually lossless for photos while still cutting file size
    /// roughly in half versus quality 100.
    pub jpeg_quality: u8,

    /// Notify the chat when its pending job is expired by the sweep.
    /// Default: true.
    ///
    /// A keyboard that silently stops working is confusing; the notice tells
    /// the user to re-upload.
    pub notify_on_expiry: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(30),
            max_upload_bytes: 20 * 1024 * 1024,
            download_timeout_secs: 60,
            jpeg_quality: 90,
            notify_on_expiry: true,
        }
    }
}

impl BotConfig {
    /// Create a new builder for `BotConfig`.
    pub fn builder() -> BotConfigBuilder {
        BotConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`BotConfig`].
#[derive(Debug)]
pub struct BotConfigBuilder {
    config: BotConfig,
}

impl BotConfigBuilder {
    pub fn expiry(mut self, d: Duration) -> Self {
        self.config.expiry = d;
        self
    }

    pub fn sweep_interval(mut self, d: Duration) -> Self {
        self.config.sweep_interval = d;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q;
        self
    }

    pub fn notify_on_expiry(mut self, v: bool) -> Self {
        self.config.notify_on_expiry = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BotConfig, Img2AnyError> {
        let c = &self.config;
        if c.expiry.is_zero() {
            return Err(Img2AnyError::InvalidConfig(
                "expiry must be non-zero".into(),
            ));
        }
        if c.sweep_interval.is_zero() {
            return Err(Img2AnyError::InvalidConfig(
                "sweep_interval must be non-zero".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(Img2AnyError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        if c.jpeg_quality == 0 || c.jpeg_quality > 100 {
            return Err(Img2AnyError::InvalidConfig(format!(
                "jpeg_quality must be 1–100, got {}",
                c.jpeg_quality
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = BotConfig::builder().build().unwrap();
        assert_eq!(config.expiry, Duration::from_secs(600));
        assert_eq!(config.jpeg_quality, 90);
        assert!(config.notify_on_expiry);
    }

    #[test]
    fn zero_expiry_rejected() {
        let err = BotConfig::builder()
            .expiry(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("expiry"));
    }

    #[test]
    fn jpeg_quality_bounds() {
        assert!(BotConfig::builder().jpeg_quality(0).build().is_err());
        assert!(BotConfig::builder().jpeg_quality(101).build().is_err());
        assert!(BotConfig::builder().jpeg_quality(1).build().is_ok());
        assert!(BotConfig::builder().jpeg_quality(100).build().is_ok());
    }
}
