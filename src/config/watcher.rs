//! Configuration file watcher for hot reload.
//!
//! Editors and orchestrators usually save by writing a temporary file and
//! renaming it over the original, which replaces the inode. The watch is
//! therefore placed on the containing directory and events are filtered by
//! file name, so it survives any number of replacements.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ProxyConfig;

/// Watches one configuration file and publishes every valid revision.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiver reloaded configurations arrive on.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Updates stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Some(file_name) = self.path.file_name().map(|n| n.to_os_string()) else {
            return Err(notify::Error::generic("config path has no file name")
                .add_path(self.path.clone()));
        };
        let directory = watched_directory(&self.path);

        let path = self.path;
        let update_tx = self.update_tx;
        let on_event = move |res: notify::Result<Event>| match res {
            Ok(event) if touches_file(&event, &file_name) => {
                tracing::info!(path = ?path, kind = ?event.kind, "Config file changed, reloading");
                match load_config(&path) {
                    Ok(config) => {
                        let _ = update_tx.send(config);
                    }
                    // Partial writes land here too; the final write triggers another event.
                    Err(e) => {
                        tracing::warn!(error = %e, "Config reload failed, keeping current configuration");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = ?e, "Config watch error"),
        };

        let mut watcher = RecommendedWatcher::new(on_event, Config::default())?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        tracing::info!(directory = ?directory, "Config watcher started");
        Ok(watcher)
    }
}

fn watched_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether `event` may have changed the contents behind `file_name`.
fn touches_file(event: &Event, file_name: &OsString) -> bool {
    let relevant_kind = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    relevant_kind
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind, RenameMode};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn directory_of_bare_file_name_is_cwd() {
        assert_eq!(watched_directory(Path::new("proxy.toml")), PathBuf::from("."));
        assert_eq!(
            watched_directory(Path::new("/etc/mbta-proxy/proxy.toml")),
            PathBuf::from("/etc/mbta-proxy")
        );
    }

    #[test]
    fn only_writes_and_renames_onto_the_file_count() {
        let name = OsString::from("proxy.toml");

        assert!(touches_file(
            &event(EventKind::Modify(ModifyKind::Any), "/etc/app/proxy.toml"),
            &name
        ));
        assert!(touches_file(
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::To)),
                "/etc/app/proxy.toml"
            ),
            &name
        ));
        assert!(touches_file(
            &event(EventKind::Create(CreateKind::File), "/etc/app/proxy.toml"),
            &name
        ));

        assert!(!touches_file(
            &event(EventKind::Modify(ModifyKind::Any), "/etc/app/.proxy.toml.swp"),
            &name
        ));
        assert!(!touches_file(
            &event(EventKind::Remove(RemoveKind::File), "/etc/app/proxy.toml"),
            &name
        ));
        assert!(!touches_file(
            &event(EventKind::Access(AccessKind::Any), "/etc/app/proxy.toml"),
            &name
        ));
    }
}
