use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    sync::Arc,
};

use teloxide::{net::Download, prelude::*};

use lexbot_core::domain::ChatId;

use crate::router::AppState;

static VOICE_COUNTER: AtomicUsize = AtomicUsize::new(1);

const TRANSCRIPT_PREVIEW_CHARS: usize = 300;

fn voice_path(temp_dir: &Path, ts: u128, n: usize) -> PathBuf {
    temp_dir.join(format!("voice_{ts}_{n}.ogg"))
}

fn transcript_preview(transcript: &str) -> String {
    if transcript.chars().count() > TRANSCRIPT_PREVIEW_CHARS {
        format!(
            "{}...",
            transcript
                .chars()
                .take(TRANSCRIPT_PREVIEW_CHARS)
                .collect::<String>()
        )
    } else {
        transcript.to_string()
    }
}

async fn download_voice(
    bot: &Bot,
    state: &AppState,
    voice: &teloxide::types::Voice,
) -> anyhow::Result<PathBuf> {
    let file = bot.get_file(voice.file.id.clone()).await?;

    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let n = VOICE_COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = voice_path(&state.cfg.temp_dir, ts, n);

    let mut dst = tokio::fs::File::create(&path).await?;
    let downloaded = bot
        .download_file(&file.path, &mut dst)
        .await
        .map_err(anyhow::Error::from);
    drop(dst);
    discard_on_error(&path, downloaded).await?;
    Ok(path)
}

/// Remove a partially written file when the write that produced it failed.
async fn discard_on_error<T>(path: &Path, result: anyhow::Result<T>) -> anyhow::Result<T> {
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "could not remove partial file");
        }
    }
    result
}

pub async fn handle_voice(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(voice) = msg.voice() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    let Some(transcriber) = state.transcriber.as_ref() else {
        let _ = bot
            .send_message(
                chat_id,
                "Voice transcription is not configured. Set OPENAI_API_KEY in .env",
            )
            .await;
        return Ok(());
    };

    tracing::info!(chat_id = chat_id.0, seconds = voice.duration, "voice message");

    let status = bot.send_message(chat_id, "🎤 Transcribing...").await.ok();

    let voice_path = match download_voice(&bot, &state, voice).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(chat_id = chat_id.0, error = %e, "voice download failed");
            let _ = bot
                .send_message(
                    chat_id,
                    format!(
                        "❌ Failed to download voice: {}",
                        e.to_string().chars().take(200).collect::<String>()
                    ),
                )
                .await;
            return Ok(());
        }
    };

    let transcript = match transcriber
        .transcribe_file(&voice_path, Some(&state.cfg.transcription_prompt))
        .await
    {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(chat_id = chat_id.0, error = %e, "transcription failed");
            match &status {
                Some(st) => {
                    let _ = bot
                        .edit_message_text(st.chat.id, st.id, "❌ Transcription failed.")
                        .await;
                }
                None => {
                    let _ = bot.send_message(chat_id, "❌ Transcription failed.").await;
                }
            }
            let _ = tokio::fs::remove_file(&voice_path).await;
            return Ok(());
        }
    };

    if let Some(st) = &status {
        let _ = bot
            .edit_message_text(
                st.chat.id,
                st.id,
                format!("🎤 \"{}\"", transcript_preview(&transcript)),
            )
            .await;
    }

    state.pipeline.handle(ChatId(chat_id.0), &transcript).await;

    let _ = tokio::fs::remove_file(&voice_path).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_files_land_in_temp_dir() {
        let p = voice_path(Path::new("/tmp/lexbot"), 1_700_000_000_000, 7);
        assert_eq!(p, PathBuf::from("/tmp/lexbot/voice_1700000000000_7.ogg"));
    }

    #[test]
    fn long_transcripts_are_previewed() {
        assert_eq!(transcript_preview("remind me at 9"), "remind me at 9");
        let long = "é".repeat(301);
        let preview = transcript_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 303);
    }

    #[tokio::test]
    async fn failed_download_leaves_no_partial_file() {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = PathBuf::from(format!("/tmp/lexbot-voice-{}-{ts}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let partial = voice_path(&dir, ts, 1);
        std::fs::write(&partial, b"OggS").unwrap();
        let res: anyhow::Result<()> =
            discard_on_error(&partial, Err(anyhow::anyhow!("connection reset"))).await;
        assert!(res.is_err());
        assert!(!partial.exists());

        let complete = voice_path(&dir, ts, 2);
        std::fs::write(&complete, b"OggS").unwrap();
        discard_on_error(&complete, Ok(())).await.unwrap();
        assert!(complete.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
