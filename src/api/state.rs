use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    BcryptPasswordHasher, FileStorage, Geocoder, HttpRelayMailer, LocalFileStorage, LogMailer, Mailer,
    MapQuestGeocoder, PasswordHasher, StaticGeocoder,
};

pub type AppState<S> = Arc<AppContext<S>>;

/// Request-independent settings the handlers read.
#[derive(Debug, Clone)]
pub struct Settings {
    pub session_days: i64,
    pub secure_cookie: bool,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub public_url: Option<String>,
}

impl Settings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            session_days: config.auth.session_days.max(1),
            secure_cookie: config.auth.secure_cookie,
            upload_dir: PathBuf::from(&config.upload.path),
            max_upload_bytes: config.upload.max_bytes,
            public_url: config
                .server
                .public_url
                .as_deref()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
        }
    }
}

/// Everything a handler may call out to.
pub struct AppContext<S> {
    pub store: Arc<S>,
    pub geocoder: Arc<dyn Geocoder>,
    pub mailer: Arc<dyn Mailer>,
    pub files: Arc<dyn FileStorage>,
    pub hasher: Arc<dyn PasswordHasher>,
    pub settings: Settings,
}

impl<S> AppContext<S> {
    /// Wire the configured service implementations around `store`.
    pub fn from_config(store: Arc<S>, config: &AppConfig) -> Result<Self> {
        let settings = Settings::from_config(config);

        let geocoder: Arc<dyn Geocoder> = match &config.geocoder.api_key {
            Some(api_key) => Arc::new(MapQuestGeocoder::new(&config.geocoder.base_url, api_key)?),
            None => {
                log::warn!("No geocoder API key configured; address lookups will fail");
                Arc::new(StaticGeocoder::new())
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.mail.relay_url {
            Some(relay_url) => Arc::new(HttpRelayMailer::new(
                relay_url,
                config.mail.api_key.clone(),
                &config.mail.from_name,
                &config.mail.from_email,
            )?),
            None => {
                log::warn!("No mail relay configured; outgoing mail is only logged");
                Arc::new(LogMailer)
            }
        };

        Ok(Self {
            store,
            geocoder,
            mailer,
            files: Arc::new(LocalFileStorage::new(settings.upload_dir.clone())),
            hasher: Arc::new(BcryptPasswordHasher::default()),
            settings,
        })
    }
}
