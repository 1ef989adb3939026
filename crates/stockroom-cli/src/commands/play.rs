use stockroom_core::audio::{AudioPlayback, S3AudioSigner};
use stockroom_core::auth::SessionHandle;

use crate::commands::common::{parse_record_id, CliContext};
use crate::error::CliError;
use crate::player::CommandAudioPlayer;

pub type CliPlayback = AudioPlayback<S3AudioSigner, CommandAudioPlayer>;

/// Playback wired from the audio section of the configuration, signing with
/// keys for `identity` when the bucket is behind an identity pool.
pub async fn playback_for(
    context: &CliContext,
    identity: &SessionHandle,
) -> Result<CliPlayback, CliError> {
    let signer = S3AudioSigner::connect(context.audio()?, identity).await?;
    Ok(AudioPlayback::new(signer, CommandAudioPlayer::from_env()))
}

/// Rebuild the signer after `identity` changed.
pub async fn reconnect_signer(
    playback: &mut CliPlayback,
    context: &CliContext,
    identity: &SessionHandle,
) -> Result<(), CliError> {
    let signer = S3AudioSigner::connect(context.audio()?, identity).await?;
    playback.replace_signer(signer);
    tracing::debug!("Audio signer rebuilt for the current session");
    Ok(())
}

pub async fn run_play(id: &str, print_url: bool, context: &CliContext) -> Result<(), CliError> {
    let id = parse_record_id(id)?;
    let audio = context.audio()?;

    if print_url {
        let identity = if audio.credentials.uses_identity() {
            context.identity().await?
        } else {
            SessionHandle::new()
        };
        let playback = playback_for(context, &identity).await?;
        println!("{}", playback.resolve(&id).await?);
        return Ok(());
    }

    let identity = context.identity().await?;
    let playback = playback_for(context, &identity).await?;
    let store = context.store_for(identity)?;
    store.play_audio_for(&id, &playback).await?;
    Ok(())
}
