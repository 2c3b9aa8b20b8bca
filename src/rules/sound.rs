//! Sound playback dispatch by file extension

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Extensions handed to the system media handler
const MEDIA_EXTENSIONS: &[&str] = &["mp3", "ogg", "oga", "flac", "m4a", "aac", "wma"];

/// How a sound file gets played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundKind {
    /// Uncompressed WAV through the platform's simple sound player
    Wave,
    /// Any other supported format through the system media handler
    Media,
}

impl SoundKind {
    /// Classify a sound file by extension, `None` if unsupported
    pub fn for_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if ext == "wav" {
            Some(SoundKind::Wave)
        } else if MEDIA_EXTENSIONS.contains(&ext.as_str()) {
            Some(SoundKind::Media)
        } else {
            None
        }
    }
}

/// Start playback without waiting for it to finish
pub(crate) fn play(path: &Path, kind: SoundKind) -> Result<()> {
    match kind {
        SoundKind::Wave => {
            let mut command = wave_player(path);
            debug!("Spawning WAV player: {:?}", command);
            let child = command
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .with_context(|| format!("Failed to start WAV player for {}", path.display()))?;
            super::action::reap(child, "sound player");
        }
        SoundKind::Media => {
            open::that_detached(path)
                .with_context(|| format!("Failed to open media file {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn wave_player(path: &Path) -> Command {
    let mut command = Command::new("afplay");
    command.arg(path);
    command
}

#[cfg(windows)]
fn wave_player(path: &Path) -> Command {
    let script = format!(
        "(New-Object Media.SoundPlayer '{}').PlaySync()",
        path.display().to_string().replace('\'', "''")
    );
    let mut command = Command::new("powershell");
    command.args(["-NoProfile", "-NonInteractive", "-Command", script.as_str()]);
    command
}

#[cfg(all(unix, not(target_os = "macos")))]
fn wave_player(path: &Path) -> Command {
    let mut command = Command::new("aplay");
    command.arg("-q").arg(path);
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sound_kind_by_extension() {
        assert_eq!(
            SoundKind::for_path(Path::new("/s/ding.WAV")),
            Some(SoundKind::Wave)
        );
        assert_eq!(
            SoundKind::for_path(Path::new("/s/song.mp3")),
            Some(SoundKind::Media)
        );
        assert_eq!(SoundKind::for_path(Path::new("/s/notes.txt")), None);
        assert_eq!(SoundKind::for_path(Path::new("/s/noext")), None);
    }
}
