use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Files in the data directory whose changes the TUI reloads for
const WATCHED_FILES: &[&str] = &["board.json", "project.toml"];

/// Sent from the watcher thread to the TUI event loop
#[derive(Debug)]
pub enum FileEvent {
    Changed(Vec<PathBuf>),
}

/// Watches `tasklane/` for board or config changes made by other processes.
pub struct BoardWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<FileEvent>,
}

impl BoardWatcher {
    pub fn start(data_dir: &Path) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let data_dir_owned = data_dir.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else {
                    return;
                };
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                let relevant: Vec<PathBuf> = event
                    .paths
                    .into_iter()
                    .filter(|p| is_watched(&data_dir_owned, p))
                    .collect();
                if !relevant.is_empty() {
                    let _ = tx.send(FileEvent::Changed(relevant));
                }
            },
            Config::default(),
        )?;

        watcher.watch(data_dir, RecursiveMode::NonRecursive)?;
        Ok(BoardWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Drain pending events without blocking
    pub fn poll(&self) -> Vec<FileEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }
}

fn is_watched(data_dir: &Path, path: &Path) -> bool {
    path.parent() == Some(data_dir)
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| WATCHED_FILES.contains(&name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_board_and_config_are_watched() {
        let dir = Path::new("/p/tasklane");
        assert!(is_watched(dir, &dir.join("board.json")));
        assert!(is_watched(dir, &dir.join("project.toml")));
        assert!(!is_watched(dir, &dir.join(".lock")));
        assert!(!is_watched(dir, &dir.join("tl.log")));
        assert!(!is_watched(dir, Path::new("/elsewhere/board.json")));
    }
}
