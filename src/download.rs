//! Saving and previewing rendered documents.
//!
//! The [`DownloadManager`] drives a [`DownloadHost`]: it prefers the host's
//! native save, falls back to a temporary resource that is activated and
//! revoked after a delay, and opens previews in a viewer. Cancelling a save
//! is a normal outcome, not an error.

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use crate::error::{DownloadError, Result};

/// Delay between activating a temporary resource and revoking it.
pub const DEFAULT_REVOKE_DELAY: Duration = Duration::from_secs(1);

/// Opaque handle to a temporary resource created by a host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle(pub String);

/// Result of a host's native save dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeSave {
    Saved { location: String },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written through the host's native save.
    Saved { location: String },
    /// Delivered through a temporary resource, revoked later.
    Downloaded { handle: ResourceHandle },
    /// The user dismissed the save. Not an error.
    Cancelled,
}

/// The environment a document is saved into or previewed in.
pub trait DownloadHost {
    fn supports_native_save(&self) -> bool;

    fn native_save(&mut self, bytes: &[u8], filename: &str) -> Result<NativeSave, DownloadError>;

    fn create_resource(&mut self, bytes: &[u8], filename: &str) -> Result<ResourceHandle, DownloadError>;

    /// Deliver a resource under `filename`, like clicking a download link.
    fn activate(&mut self, handle: &ResourceHandle, filename: &str) -> Result<(), DownloadError>;

    /// Show a resource in a new viewing context. `Ok(false)` means the host
    /// refused to open one.
    fn open_viewer(&mut self, handle: &ResourceHandle) -> Result<bool, DownloadError>;

    fn revoke(&mut self, handle: &ResourceHandle);
}

/// Saves and previews PDF bytes through a host, revoking temporary
/// resources once their delay has passed.
///
/// Pending revocations are processed by [`DownloadManager::reap`], at the
/// start of every save or preview, and when the manager is dropped.
pub struct DownloadManager<H: DownloadHost> {
    host: H,
    revoke_after: Duration,
    pending: Vec<(Instant, ResourceHandle)>,
}

impl<H: DownloadHost> DownloadManager<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            revoke_after: DEFAULT_REVOKE_DELAY,
            pending: Vec::new(),
        }
    }

    pub fn with_revoke_delay(mut self, delay: Duration) -> Self {
        self.revoke_after = delay;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Resources still waiting to be revoked.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn save(&mut self, bytes: &[u8], filename: &str) -> Result<SaveOutcome, DownloadError> {
        self.reap();
        if self.host.supports_native_save() {
            return match self.host.native_save(bytes, filename)? {
                NativeSave::Saved { location } => {
                    log::info!("saved {filename} to {location}");
                    Ok(SaveOutcome::Saved { location })
                }
                NativeSave::Cancelled => {
                    log::info!("save of {filename} cancelled");
                    Ok(SaveOutcome::Cancelled)
                }
            };
        }

        let handle = self.host.create_resource(bytes, filename)?;
        if let Err(e) = self.host.activate(&handle, filename) {
            self.host.revoke(&handle);
            return Err(e);
        }
        self.schedule_revoke(handle.clone());
        Ok(SaveOutcome::Downloaded { handle })
    }

    pub fn preview(&mut self, bytes: &[u8]) -> Result<ResourceHandle, DownloadError> {
        self.reap();
        let handle = self.host.create_resource(bytes, "preview.pdf")?;
        match self.host.open_viewer(&handle) {
            Ok(true) => {
                self.schedule_revoke(handle.clone());
                Ok(handle)
            }
            Ok(false) => {
                self.host.revoke(&handle);
                Err(DownloadError::PopupBlocked)
            }
            Err(e) => {
                self.host.revoke(&handle);
                Err(e)
            }
        }
    }

    fn schedule_revoke(&mut self, handle: ResourceHandle) {
        self.pending.push((Instant::now() + self.revoke_after, handle));
    }

    /// Revoke every resource whose delay has elapsed. Returns how many were
    /// revoked.
    pub fn reap(&mut self) -> usize {
        let now = Instant::now();
        let (due, later): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|(at, _)| *at <= now);
        self.pending = later;
        for (_, handle) in &due {
            self.host.revoke(handle);
        }
        due.len()
    }

    /// Revoke everything still pending, regardless of delay.
    pub fn flush(&mut self) {
        for (_, handle) in std::mem::take(&mut self.pending) {
            self.host.revoke(&handle);
        }
    }
}

impl<H: DownloadHost> Drop for DownloadManager<H> {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Filename for a project: ASCII-lowercased, every character that is not
/// a letter or digit replaced by `_`, suffixed with `_callsheet.pdf`.
pub fn derive_filename(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}_callsheet.pdf")
}

/// Host backed by the local file system.
///
/// Native save writes straight into `save_dir`; an existing file is left
/// alone and reported as a cancelled save unless `overwrite` is set.
/// Temporary resources live under `scratch_dir`. Previews run the `viewer`
/// command with the resource path; without a viewer, previews are refused.
pub struct FsHost {
    pub save_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub viewer: Option<String>,
    pub native: bool,
    pub overwrite: bool,
    created: usize,
}

impl FsHost {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            scratch_dir: std::env::temp_dir().join(format!("callsheet-forge-{}", std::process::id())),
            viewer: None,
            native: true,
            overwrite: true,
            created: 0,
        }
    }

    pub fn with_viewer(mut self, command: impl Into<String>) -> Self {
        self.viewer = Some(command.into());
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }
}

impl DownloadHost for FsHost {
    fn supports_native_save(&self) -> bool {
        self.native
    }

    fn native_save(&mut self, bytes: &[u8], filename: &str) -> Result<NativeSave, DownloadError> {
        let target = self.save_dir.join(filename);
        if target.exists() && !self.overwrite {
            return Ok(NativeSave::Cancelled);
        }
        std::fs::create_dir_all(&self.save_dir)?;
        std::fs::write(&target, bytes)?;
        Ok(NativeSave::Saved {
            location: target.display().to_string(),
        })
    }

    fn create_resource(&mut self, bytes: &[u8], filename: &str) -> Result<ResourceHandle, DownloadError> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        self.created += 1;
        let path = self.scratch_dir.join(format!("{}-{filename}", self.created));
        std::fs::write(&path, bytes)?;
        Ok(ResourceHandle(path.display().to_string()))
    }

    fn activate(&mut self, handle: &ResourceHandle, filename: &str) -> Result<(), DownloadError> {
        std::fs::create_dir_all(&self.save_dir)?;
        std::fs::copy(&handle.0, self.save_dir.join(filename))?;
        Ok(())
    }

    fn open_viewer(&mut self, handle: &ResourceHandle) -> Result<bool, DownloadError> {
        let Some(viewer) = &self.viewer else {
            return Ok(false);
        };
        Command::new(viewer)
            .arg(&handle.0)
            .spawn()
            .map_err(|e| DownloadError::Host(format!("could not start viewer `{viewer}`: {e}")))?;
        Ok(true)
    }

    fn revoke(&mut self, handle: &ResourceHandle) {
        if let Err(e) = std::fs::remove_file(&handle.0) {
            log::debug!("could not remove temporary resource {}: {e}", handle.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        NativeSave(String),
        Create(String),
        Activate(String),
        Open(String),
        Revoke(String),
    }

    #[derive(Default)]
    struct FakeHost {
        native: bool,
        cancel: bool,
        fail_activate: bool,
        block_popups: bool,
        events: Vec<Event>,
    }

    impl DownloadHost for FakeHost {
        fn supports_native_save(&self) -> bool {
            self.native
        }

        fn native_save(&mut self, _bytes: &[u8], filename: &str) -> Result<NativeSave, DownloadError> {
            self.events.push(Event::NativeSave(filename.into()));
            if self.cancel {
                Ok(NativeSave::Cancelled)
            } else {
                Ok(NativeSave::Saved {
                    location: format!("/picked/{filename}"),
                })
            }
        }

        fn create_resource(&mut self, _bytes: &[u8], filename: &str) -> Result<ResourceHandle, DownloadError> {
            self.events.push(Event::Create(filename.into()));
            Ok(ResourceHandle(format!("blob:{filename}")))
        }

        fn activate(&mut self, handle: &ResourceHandle, _filename: &str) -> Result<(), DownloadError> {
            self.events.push(Event::Activate(handle.0.clone()));
            if self.fail_activate {
                return Err(DownloadError::Host("anchor click rejected".into()));
            }
            Ok(())
        }

        fn open_viewer(&mut self, handle: &ResourceHandle) -> Result<bool, DownloadError> {
            self.events.push(Event::Open(handle.0.clone()));
            Ok(!self.block_popups)
        }

        fn revoke(&mut self, handle: &ResourceHandle) {
            self.events.push(Event::Revoke(handle.0.clone()));
        }
    }

    fn revokes(host: &FakeHost) -> usize {
        host.events.iter().filter(|e| matches!(e, Event::Revoke(_))).count()
    }

    #[test]
    fn filename_replaces_every_non_alphanumeric() {
        assert_eq!(derive_filename("Midnight in Paris!"), "midnight_in_paris__callsheet.pdf");
        assert_eq!(derive_filename("Ep. 4: Déjà vu"), "ep__4__d_j__vu_callsheet.pdf");
    }

    #[test]
    fn native_save_is_preferred() {
        let mut manager = DownloadManager::new(FakeHost {
            native: true,
            ..FakeHost::default()
        });
        let outcome = manager.save(b"%PDF-", "a_callsheet.pdf").unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                location: "/picked/a_callsheet.pdf".into()
            }
        );
        assert_eq!(manager.host().events, vec![Event::NativeSave("a_callsheet.pdf".into())]);
    }

    #[test]
    fn cancelled_save_is_not_an_error() {
        let mut manager = DownloadManager::new(FakeHost {
            native: true,
            cancel: true,
            ..FakeHost::default()
        });
        assert_eq!(manager.save(b"%PDF-", "a.pdf").unwrap(), SaveOutcome::Cancelled);
    }

    #[test]
    fn fallback_revokes_after_the_delay() {
        let mut manager = DownloadManager::new(FakeHost::default()).with_revoke_delay(Duration::from_millis(30));
        let outcome = manager.save(b"%PDF-", "a.pdf").unwrap();
        assert!(matches!(outcome, SaveOutcome::Downloaded { .. }));
        assert_eq!(manager.pending(), 1);
        assert_eq!(manager.reap(), 0);
        assert_eq!(revokes(manager.host()), 0);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(manager.reap(), 1);
        assert_eq!(manager.pending(), 0);
        assert_eq!(
            manager.host().events,
            vec![
                Event::Create("a.pdf".into()),
                Event::Activate("blob:a.pdf".into()),
                Event::Revoke("blob:a.pdf".into()),
            ]
        );
    }

    #[test]
    fn failed_activation_revokes_immediately() {
        let mut manager = DownloadManager::new(FakeHost {
            fail_activate: true,
            ..FakeHost::default()
        });
        assert!(matches!(manager.save(b"%PDF-", "a.pdf"), Err(DownloadError::Host(_))));
        assert_eq!(manager.pending(), 0);
        assert_eq!(revokes(manager.host()), 1);
    }

    #[test]
    fn blocked_preview_is_distinguishable() {
        let mut manager = DownloadManager::new(FakeHost {
            block_popups: true,
            ..FakeHost::default()
        });
        let err = manager.preview(b"%PDF-").unwrap_err();
        assert!(matches!(err, DownloadError::PopupBlocked));
        assert_eq!(revokes(manager.host()), 1);
    }

    #[test]
    fn flush_revokes_everything_pending() {
        let mut manager = DownloadManager::new(FakeHost::default()).with_revoke_delay(Duration::from_secs(3600));
        manager.preview(b"%PDF-").unwrap();
        manager.flush();
        assert_eq!(manager.pending(), 0);
        assert_eq!(revokes(manager.host()), 1);
    }

    #[test]
    fn fs_host_round_trip() {
        let root = std::env::temp_dir().join(format!("csf-download-test-{}", std::process::id()));
        let mut host = FsHost::new(root.join("out")).with_scratch_dir(root.join("tmp"));
        host.native = false;
        let mut manager = DownloadManager::new(host).with_revoke_delay(Duration::ZERO);

        let outcome = manager.save(b"%PDF-1.7", "demo_callsheet.pdf").unwrap();
        let SaveOutcome::Downloaded { handle } = outcome else {
            panic!("expected a fallback download, got {outcome:?}");
        };
        assert_eq!(std::fs::read(root.join("out/demo_callsheet.pdf")).unwrap(), b"%PDF-1.7");
        assert_eq!(manager.reap(), 1);
        assert!(!std::path::Path::new(&handle.0).exists());

        assert!(matches!(manager.preview(b"%PDF-"), Err(DownloadError::PopupBlocked)));
        drop(manager);
        let _ = std::fs::remove_dir_all(&root);
    }
}
