//! Rule actions - what a fired rule does

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, info};

use super::sound::{self, SoundKind};
use super::{ActionKind, RuleRecord};

/// Launches external processes on behalf of actions.
///
/// Both calls return once the process is started; nothing waits for it to finish.
pub trait Launcher: Send + Sync {
    /// Start a shell command line
    fn run_command(&self, command_line: &str) -> Result<()>;

    /// Start playback of a sound file
    fn play_sound(&self, path: &Path, kind: SoundKind) -> Result<()>;
}

/// Launcher backed by the operating system
#[derive(Debug, Clone, Default)]
pub struct SystemLauncher {
    shell: Option<String>,
}

impl SystemLauncher {
    /// Use `shell` instead of the platform default for command lines
    pub fn with_shell(shell: Option<String>) -> Self {
        Self { shell }
    }

    fn shell_command(&self, command_line: &str) -> Command {
        let (program, flag) = match self.shell.as_deref() {
            Some(shell) => {
                let is_cmd = Path::new(shell)
                    .file_stem()
                    .is_some_and(|s| s.eq_ignore_ascii_case("cmd"));
                (shell, if is_cmd { "/C" } else { "-c" })
            }
            None if cfg!(target_os = "windows") => ("cmd", "/C"),
            None => ("sh", "-c"),
        };

        let mut command = Command::new(program);
        command.arg(flag).arg(command_line);
        command
    }
}

impl Launcher for SystemLauncher {
    fn run_command(&self, command_line: &str) -> Result<()> {
        let child = self
            .shell_command(command_line)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to launch command: {}", command_line))?;
        reap(child, command_line);
        Ok(())
    }

    fn play_sound(&self, path: &Path, kind: SoundKind) -> Result<()> {
        sound::play(path, kind)
    }
}

/// Wait for a detached child on a background thread so it does not linger as a zombie
pub(crate) fn reap(mut child: Child, label: &str) {
    let label = label.to_string();
    std::thread::spawn(move || match child.wait() {
        Ok(status) => debug!("'{}' exited with {}", label, status),
        Err(e) => debug!("Failed to wait for '{}': {}", label, e),
    });
}

/// Execute the action of a fired rule
pub fn execute(record: &RuleRecord, launcher: &dyn Launcher) -> Result<()> {
    match &record.action {
        ActionKind::CopyFile => {
            let source = expand(&record.source_path);
            if !source.is_file() {
                anyhow::bail!("Source file not found: {}", source.display());
            }

            let dest = output_folder(record)?;
            let name_override = record.output_file.trim();
            let filename = if name_override.is_empty() {
                source
                    .file_name()
                    .context("Source file has no name")?
                    .to_os_string()
            } else {
                // A single normal component, so the copy stays inside the output folder
                if Path::new(name_override).file_name() != Some(OsStr::new(name_override)) {
                    anyhow::bail!("Output file must be a plain file name: {}", name_override);
                }
                name_override.into()
            };
            std::fs::create_dir_all(&dest)
                .with_context(|| format!("Failed to create directory: {}", dest.display()))?;
            let dest_path = dest.join(filename);

            if dest_path.exists() {
                let same = std::fs::canonicalize(&source)
                    .and_then(|s| std::fs::canonicalize(&dest_path).map(|d| s == d))
                    .with_context(|| format!("Failed to resolve {}", dest_path.display()))?;
                if same {
                    anyhow::bail!(
                        "Source and destination are the same file: {}",
                        source.display()
                    );
                }
            }

            info!("Copying {} -> {}", source.display(), dest_path.display());
            std::fs::copy(&source, &dest_path).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    source.display(),
                    dest_path.display()
                )
            })?;
        }

        ActionKind::CopyFolder => {
            let source = expand(&record.source_path);
            if !source.is_dir() {
                anyhow::bail!("Source folder not found: {}", source.display());
            }

            let source = std::fs::canonicalize(&source).unwrap_or(source);
            let folder_name = source
                .file_name()
                .context("Source folder has no name")?
                .to_os_string();
            let output = output_folder(record)?;
            let dest = output.join(&folder_name);

            let output_abs = std::fs::canonicalize(&output)
                .or_else(|_| std::path::absolute(&output))
                .unwrap_or_else(|_| output.clone());
            if output_abs.join(&folder_name).starts_with(&source) {
                anyhow::bail!(
                    "Refusing to copy {} into its own subtree {}",
                    source.display(),
                    dest.display()
                );
            }

            info!("Copying folder {} -> {}", source.display(), dest.display());
            copy_tree(&source, &dest)?;
        }

        ActionKind::PlaySound => {
            let source = expand(&record.source_path);
            if !source.is_file() {
                anyhow::bail!("Sound file not found: {}", source.display());
            }

            let kind = SoundKind::for_path(&source).with_context(|| {
                format!("Unsupported sound format: {}", source.display())
            })?;

            info!("Playing {:?} sound {}", kind, source.display());
            launcher.play_sound(&source, kind)?;
        }

        ActionKind::RunCommand => {
            let command_line = record.source_path.trim();
            if command_line.is_empty() {
                anyhow::bail!("No command configured");
            }

            info!("Running (shell): {}", command_line);
            launcher.run_command(command_line)?;
        }

        ActionKind::Other(kind) => {
            debug!("No handler for action type '{}'", kind);
        }
    }

    Ok(())
}

fn expand(raw: &str) -> PathBuf {
    crate::expand_path(Path::new(raw.trim()))
}

fn output_folder(record: &RuleRecord) -> Result<PathBuf> {
    if record.output_folder.trim().is_empty() {
        anyhow::bail!("No output folder configured");
    }
    Ok(expand(&record.output_folder))
}

/// Recursively copy `source` into `dest`, overwriting existing files
fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create directory: {}", dest.display()))?;

    for entry in std::fs::read_dir(source)
        .with_context(|| format!("Failed to read directory: {}", source.display()))?
    {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());

        if from.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).with_context(|| {
                format!("Failed to copy {} to {}", from.display(), to.display())
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Trigger;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<String>>,
        sounds: Mutex<Vec<(PathBuf, SoundKind)>>,
    }

    impl Launcher for Recorder {
        fn run_command(&self, command_line: &str) -> Result<()> {
            self.commands.lock().unwrap().push(command_line.to_string());
            Ok(())
        }

        fn play_sound(&self, path: &Path, kind: SoundKind) -> Result<()> {
            self.sounds.lock().unwrap().push((path.to_path_buf(), kind));
            Ok(())
        }
    }

    fn rule(action: ActionKind, source: &Path, output: &Path) -> RuleRecord {
        RuleRecord::new(Trigger::OnSave, action, source.to_string_lossy())
            .with_output_folder(output.to_string_lossy())
    }

    #[test]
    fn test_copy_file_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("a.txt");
        let out = tmp.path().join("out");
        std::fs::write(&source, "new").unwrap();
        std::fs::create_dir(&out).unwrap();
        std::fs::write(out.join("a.txt"), "old").unwrap();

        execute(&rule(ActionKind::CopyFile, &source, &out), &Recorder::default()).unwrap();

        assert_eq!(std::fs::read_to_string(out.join("a.txt")).unwrap(), "new");
    }

    #[test]
    fn test_copy_file_uses_name_override() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("a.txt");
        let out = tmp.path().join("out");
        std::fs::write(&source, "data").unwrap();

        let mut record = rule(ActionKind::CopyFile, &source, &out);
        record.output_file = "b.txt".to_string();
        execute(&record, &Recorder::default()).unwrap();

        assert!(out.join("b.txt").is_file());
        assert!(!out.join("a.txt").exists());
    }

    #[test]
    fn test_copy_file_onto_itself_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("a.txt");
        std::fs::write(&source, "precious data").unwrap();

        let err = execute(&rule(ActionKind::CopyFile, &source, tmp.path()), &Recorder::default())
            .unwrap_err();
        assert!(err.to_string().contains("same file"));
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "precious data");

        let mut record = rule(ActionKind::CopyFile, &source, tmp.path());
        record.output_file = "a.txt".to_string();
        assert!(execute(&record, &Recorder::default()).is_err());
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "precious data");
    }

    #[test]
    fn test_copy_file_name_override_stays_in_output_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("a.txt");
        let out = tmp.path().join("out");
        let outside = tmp.path().join("elsewhere.txt");
        std::fs::write(&source, "data").unwrap();

        for name in [outside.to_string_lossy().into_owned(), "../x.txt".to_string()] {
            let mut record = rule(ActionKind::CopyFile, &source, &out);
            record.output_file = name;
            let err = execute(&record, &Recorder::default()).unwrap_err();
            assert!(err.to_string().contains("plain file name"));
        }

        assert!(!out.exists());
        assert!(!outside.exists());
        assert!(!tmp.path().join("x.txt").exists());
    }

    #[test]
    fn test_copy_file_missing_source_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let record = rule(
            ActionKind::CopyFile,
            &tmp.path().join("missing.txt"),
            &tmp.path().join("out"),
        );

        let err = execute(&record, &Recorder::default()).unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn test_copy_folder_into_itself_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("assets");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(source.join("img.png"), "png").unwrap();

        let record = rule(ActionKind::CopyFolder, &source, &source);
        assert!(execute(&record, &Recorder::default()).is_err());
        assert!(!source.join("assets").exists());
    }

    #[test]
    fn test_play_sound_dispatches_by_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let wav = tmp.path().join("ding.wav");
        let mp3 = tmp.path().join("song.mp3");
        let txt = tmp.path().join("notes.txt");
        std::fs::write(&wav, "RIFF").unwrap();
        std::fs::write(&mp3, "ID3").unwrap();
        std::fs::write(&txt, "text").unwrap();

        let recorder = Recorder::default();
        execute(&rule(ActionKind::PlaySound, &wav, tmp.path()), &recorder).unwrap();
        execute(&rule(ActionKind::PlaySound, &mp3, tmp.path()), &recorder).unwrap();
        assert!(execute(&rule(ActionKind::PlaySound, &txt, tmp.path()), &recorder).is_err());

        let sounds = recorder.sounds.lock().unwrap();
        assert_eq!(
            *sounds,
            vec![(wav.clone(), SoundKind::Wave), (mp3.clone(), SoundKind::Media)]
        );
    }

    #[test]
    fn test_run_command_passes_line_through() {
        let recorder = Recorder::default();
        let record = RuleRecord::new(Trigger::OnBuild, ActionKind::RunCommand, " echo built && ls ");

        execute(&record, &recorder).unwrap();

        assert_eq!(
            *recorder.commands.lock().unwrap(),
            vec!["echo built && ls".to_string()]
        );
    }

    #[test]
    fn test_run_command_empty_fails() {
        let record = RuleRecord::new(Trigger::OnBuild, ActionKind::RunCommand, "  ");
        assert!(execute(&record, &Recorder::default()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_launcher_runs_shell() {
        let tmp = tempfile::tempdir().unwrap();
        let marker = tmp.path().join("marker");
        let launcher = SystemLauncher::default();

        launcher
            .run_command(&format!("touch '{}'", marker.display()))
            .unwrap();

        for _ in 0..50 {
            if marker.exists() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        assert!(marker.exists());
    }
}
