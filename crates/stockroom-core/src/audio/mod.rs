//! Audio previews stored as `{id}.mp3` objects in a private bucket.
//!
//! Playback signs a short-lived GET URL and hands it to a player. Failures
//! never touch the collection; the store reports them as transient messages.

mod identity_pool;

use std::time::Duration;

use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use thiserror::Error;

use crate::auth::IdentitySession;
use crate::config::{AudioCredentials, AudioStorageConfig};
use crate::models::RecordId;
use crate::util::compact_text;

pub use identity_pool::identity_pool_credentials;

/// Lifetime of a signed audio URL.
pub const AUDIO_URL_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("Failed to sign audio URL: {0}")]
    Signing(String),

    #[error("Playback failed: {0}")]
    Playback(String),
}

/// Object key holding the preview for a record.
pub fn audio_object_key(id: &RecordId) -> String {
    format!("{id}.mp3")
}

/// Produces time-limited read URLs for bucket objects.
#[allow(async_fn_in_trait)]
pub trait AudioSigner {
    async fn signed_url(&self, object_key: &str, ttl: Duration) -> Result<String, AudioError>;
}

/// Plays audio from a URL until it finishes or fails.
#[allow(async_fn_in_trait)]
pub trait AudioPlayer {
    async fn play(&self, url: &str) -> Result<(), AudioError>;
}

/// Presigns S3 `GetObject` requests.
#[derive(Debug, Clone)]
pub struct S3AudioSigner {
    bucket: String,
    client: Client,
}

impl S3AudioSigner {
    /// Signer for `config`. Identity-pool configs exchange the current ID
    /// token for keys, so call again whenever the session changes.
    pub async fn connect(
        config: &AudioStorageConfig,
        identity: &impl IdentitySession,
    ) -> Result<Self, AudioError> {
        let credentials = match &config.credentials {
            AudioCredentials::Static {
                access_key_id,
                secret_access_key,
                session_token,
            } => Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                session_token.clone(),
                None,
                "stockroom-audio",
            ),
            AudioCredentials::IdentityPool { pool_id } => {
                let credential = identity
                    .credential()
                    .ok_or_else(|| AudioError::Signing("Not signed in".to_string()))?;
                identity_pool_credentials(&config.region, pool_id, &credential.token).await?
            }
        };
        Ok(Self::with_credentials(config, credentials))
    }

    pub fn with_credentials(config: &AudioStorageConfig, credentials: Credentials) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::new()
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint_url) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }

        Self {
            bucket: config.bucket.clone(),
            client: Client::from_conf(builder.build()),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

impl AudioSigner for S3AudioSigner {
    async fn signed_url(&self, object_key: &str, ttl: Duration) -> Result<String, AudioError> {
        let object_key = object_key.trim().trim_matches('/');
        if object_key.is_empty() {
            return Err(AudioError::Signing("object key cannot be empty".to_string()));
        }

        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|error| AudioError::Signing(compact_text(&error.to_string())))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(object_key)
            .presigned(presigning)
            .await
            .map_err(|error| {
                AudioError::Signing(format!(
                    "{}/{object_key}: {}",
                    self.bucket,
                    compact_text(&error.to_string())
                ))
            })?;

        tracing::debug!(bucket = %self.bucket, key = object_key, "Signed audio URL");
        Ok(request.uri().to_string())
    }
}

/// Signer plus player for record previews.
#[derive(Debug, Clone)]
pub struct AudioPlayback<G, P> {
    signer: G,
    player: P,
    ttl: Duration,
}

impl<G: AudioSigner, P: AudioPlayer> AudioPlayback<G, P> {
    pub const fn new(signer: G, player: P) -> Self {
        Self {
            signer,
            player,
            ttl: AUDIO_URL_TTL,
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Swap the signer after the signed-in identity changes.
    pub fn replace_signer(&mut self, signer: G) {
        self.signer = signer;
    }

    pub const fn signer(&self) -> &G {
        &self.signer
    }

    /// Signed URL for a record's preview, without playing it.
    pub async fn resolve(&self, id: &RecordId) -> Result<String, AudioError> {
        self.signer.signed_url(&audio_object_key(id), self.ttl).await
    }

    /// Sign and play; returns the URL that was played.
    pub async fn play(&self, id: &RecordId) -> Result<String, AudioError> {
        let url = self.resolve(id).await?;
        self.player.play(&url).await?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::auth::SessionHandle;

    #[derive(Clone, Default)]
    struct RecordingSigner {
        prefix: &'static str,
        keys: Arc<Mutex<Vec<(String, Duration)>>>,
    }

    impl AudioSigner for RecordingSigner {
        async fn signed_url(&self, object_key: &str, ttl: Duration) -> Result<String, AudioError> {
            self.keys
                .lock()
                .unwrap()
                .push((object_key.to_string(), ttl));
            Ok(format!("https://{}/{object_key}", self.prefix))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingPlayer {
        fail: bool,
        played: Arc<Mutex<Vec<String>>>,
    }

    impl AudioPlayer for RecordingPlayer {
        async fn play(&self, url: &str) -> Result<(), AudioError> {
            if self.fail {
                return Err(AudioError::Playback("device busy".to_string()));
            }
            self.played.lock().unwrap().push(url.to_string());
            Ok(())
        }
    }

    fn audio_config() -> AudioStorageConfig {
        AudioStorageConfig {
            region: "us-east-1".to_string(),
            bucket: "product-audio".to_string(),
            endpoint_url: None,
            credentials: AudioCredentials::Static {
                access_key_id: "AKIDEXAMPLE".to_string(),
                secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
                session_token: None,
            },
        }
    }

    async fn static_signer(config: &AudioStorageConfig) -> S3AudioSigner {
        S3AudioSigner::connect(config, &SessionHandle::new())
            .await
            .unwrap()
    }

    #[test]
    fn object_key_appends_mp3_extension() {
        let id: RecordId = "42".parse().unwrap();
        assert_eq!(audio_object_key(&id), "42.mp3");
    }

    #[tokio::test]
    async fn play_signs_record_key_with_default_ttl() {
        let signer = RecordingSigner {
            prefix: "bucket",
            ..RecordingSigner::default()
        };
        let player = RecordingPlayer::default();
        let playback = AudioPlayback::new(signer.clone(), player.clone());

        let url = playback.play(&"7".parse().unwrap()).await.unwrap();

        assert_eq!(url, "https://bucket/7.mp3");
        assert_eq!(
            signer.keys.lock().unwrap().as_slice(),
            &[("7.mp3".to_string(), AUDIO_URL_TTL)]
        );
        assert_eq!(player.played.lock().unwrap().as_slice(), &[url]);
    }

    #[tokio::test]
    async fn player_failure_is_reported() {
        let playback = AudioPlayback::new(
            RecordingSigner::default(),
            RecordingPlayer {
                fail: true,
                ..RecordingPlayer::default()
            },
        );
        let error = playback.play(&"7".parse().unwrap()).await.unwrap_err();
        assert_eq!(error, AudioError::Playback("device busy".to_string()));
    }

    #[tokio::test]
    async fn replace_signer_takes_effect_for_next_request() {
        let mut playback = AudioPlayback::new(
            RecordingSigner {
                prefix: "old",
                ..RecordingSigner::default()
            },
            RecordingPlayer::default(),
        );
        playback.replace_signer(RecordingSigner {
            prefix: "new",
            ..RecordingSigner::default()
        });
        let url = playback.resolve(&"1".parse().unwrap()).await.unwrap();
        assert_eq!(url, "https://new/1.mp3");
    }

    #[tokio::test]
    async fn s3_signer_presigns_without_network() {
        let signer = static_signer(&audio_config()).await;
        let url = signer.signed_url("42.mp3", AUDIO_URL_TTL).await.unwrap();

        assert!(url.contains("product-audio"));
        assert!(url.contains("42.mp3"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn s3_signer_uses_custom_endpoint_path_style() {
        let mut config = audio_config();
        config.endpoint_url = Some("https://storage.example.com".to_string());
        let signer = static_signer(&config).await;
        let url = signer.signed_url("/9.mp3", AUDIO_URL_TTL).await.unwrap();
        assert!(url.starts_with("https://storage.example.com/product-audio/9.mp3?"));
    }

    #[tokio::test]
    async fn s3_signer_rejects_empty_key() {
        let signer = static_signer(&audio_config()).await;
        let error = signer.signed_url(" / ", AUDIO_URL_TTL).await.unwrap_err();
        assert!(matches!(error, AudioError::Signing(_)));
    }

    #[tokio::test]
    async fn identity_pool_signer_requires_signed_in_user() {
        let config = AudioStorageConfig {
            credentials: AudioCredentials::IdentityPool {
                pool_id: "us-east-1:pool-1".to_string(),
            },
            ..audio_config()
        };

        let error = S3AudioSigner::connect(&config, &SessionHandle::new())
            .await
            .unwrap_err();

        assert_eq!(error, AudioError::Signing("Not signed in".to_string()));
    }

    #[tokio::test]
    async fn identity_pool_rejects_token_without_issuer() {
        let error = identity_pool_credentials("us-east-1", "us-east-1:pool-1", "a.e30.c")
            .await
            .unwrap_err();
        assert!(matches!(error, AudioError::Signing(message) if message.contains("iss")));
    }

    #[tokio::test]
    #[ignore = "requires STOCKROOM_AUDIO_* and static AWS credentials"]
    async fn signed_url_fetches_real_object() {
        dotenvy::dotenv().ok();
        let config = crate::config::AppConfig::from_env().unwrap();
        let Some(audio) = config.audio else {
            return;
        };
        let signer = static_signer(&audio).await;
        let key = std::env::var("STOCKROOM_TEST_AUDIO_KEY").unwrap_or_else(|_| "1.mp3".to_string());
        let url = signer.signed_url(&key, Duration::from_secs(60)).await.unwrap();
        let response = reqwest::get(url).await.unwrap();
        assert!(response.status().is_success());
    }
}
