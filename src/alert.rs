//! Audible alerts for connection state changes.
//!
//! The watchdog core only knows about [`Sound`] values and the [`Notifier`]
//! capability. [`PlayerNotifier`] is the production sink: it runs an external
//! audio player with the sound file as its single argument.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info, warn};

/// Pre-recorded notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sound {
    /// A connection was (re)established.
    Connected,
    /// The peer closed the connection.
    ServerLost,
    /// An echo did not arrive before the read deadline.
    ConnectionLost,
    /// Any other session failure.
    Lost,
}

impl Sound {
    pub fn file_name(&self) -> &'static str {
        match self {
            Sound::Connected => "connected.mp3",
            Sound::ServerLost => "server_lost.mp3",
            Sound::ConnectionLost => "connection_lost.mp3",
            Sound::Lost => "lost.mp3",
        }
    }
}

/// Map a session termination message to the alert it should raise.
///
/// | reason                          | sound              |
/// |---------------------------------|--------------------|
/// | `EOF`                           | `ServerLost`       |
/// | `read tcp <route>: i/o timeout` | `ConnectionLost`   |
/// | anything else                   | `Lost`             |
pub fn classify(reason: &str) -> Sound {
    if reason == "EOF" {
        Sound::ServerLost
    } else if is_read_timeout(reason) {
        Sound::ConnectionLost
    } else {
        Sound::Lost
    }
}

/// Matches `^read tcp .+: i/o timeout$`, where `.` excludes newlines.
fn is_read_timeout(reason: &str) -> bool {
    reason
        .strip_prefix("read tcp ")
        .and_then(|rest| rest.strip_suffix(": i/o timeout"))
        .is_some_and(|route| !route.is_empty() && !route.contains('\n'))
}

/// Something that can surface a [`Sound`] to a human.
///
/// Notification is infallible from the caller's point of view; sinks log
/// their own failures.
pub trait Notifier {
    fn notify(&self, sound: Sound) -> impl Future<Output = ()>;
}

/// Plays sounds through an external player executable.
#[derive(Debug, Clone)]
pub struct PlayerNotifier {
    enabled: bool,
    player: String,
    sounds_dir: PathBuf,
}

impl PlayerNotifier {
    pub fn new(enabled: bool, player: impl Into<String>, sounds_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled,
            player: player.into(),
            sounds_dir: sounds_dir.into(),
        }
    }

    /// Path handed to the player for `sound`.
    pub fn sound_path(&self, sound: Sound) -> PathBuf {
        self.sounds_dir.join(sound.file_name())
    }
}

impl Notifier for PlayerNotifier {
    async fn notify(&self, sound: Sound) {
        let path = self.sound_path(sound);

        if !self.enabled {
            info!(sound = sound.file_name(), "Alert (playback disabled)");
            return;
        }

        info!(player = %self.player, path = %path.display(), "Playing alert");

        let status = Command::new(&self.player)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {}
            Ok(status) => {
                warn!(player = %self.player, %status, "Alert player exited unsuccessfully");
            }
            Err(e) => {
                error!(player = %self.player, error = %e, "Error in run player");
            }
        }
    }
}
