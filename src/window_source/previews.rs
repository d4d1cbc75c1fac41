use crate::app::AppEvent;
use crate::platform::preview::fit_thumbnail;
use crate::platform::{WindowIdentity, WindowSystem};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Thumbnails wanted for one list snapshot.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PreviewJob {
    pub epoch: u64,
    pub targets: Vec<WindowIdentity>,
    pub max_w: u32,
    pub max_h: u32,
}

/// Background capture loop. A newer job supersedes whatever is left of
/// the current one.
pub(crate) struct PreviewWorker<W: WindowSystem> {
    system: Arc<W>,
    jobs: Receiver<PreviewJob>,
    events: Sender<AppEvent>,
}

impl<W: WindowSystem + 'static> PreviewWorker<W> {
    pub(crate) fn spawn(system: Arc<W>, events: Sender<AppEvent>) -> Sender<PreviewJob> {
        let (tx, jobs) = crossbeam_channel::unbounded();
        let worker = Self {
            system,
            jobs,
            events,
        };
        let spawned = std::thread::Builder::new()
            .name("previews".into())
            .spawn(move || worker.run());
        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn preview worker");
        }
        tx
    }

    fn run(self) {
        while let Ok(mut job) = self.jobs.recv() {
            while let Some(identity) = job.targets.first().copied() {
                match self.jobs.try_recv() {
                    Ok(newer) => {
                        trace!(stale = job.epoch, epoch = newer.epoch, "preview job superseded");
                        job = newer;
                        continue;
                    }
                    Err(TryRecvError::Disconnected) => return,
                    Err(TryRecvError::Empty) => {}
                }
                job.targets.remove(0);
                if !self.capture_one(job.epoch, identity, job.max_w, job.max_h) {
                    return;
                }
            }
        }
        debug!("preview worker exited");
    }

    /// Returns false once the core has gone away.
    fn capture_one(&self, epoch: u64, identity: WindowIdentity, max_w: u32, max_h: u32) -> bool {
        let image = match self.system.capture_window(identity.window, max_w, max_h) {
            Ok(image) => image,
            Err(e) => {
                debug!(window = identity.window, error = %e, "preview capture failed, keeping icon");
                return true;
            }
        };
        let Some(image) = fit_thumbnail(&image, max_w, max_h) else {
            return true;
        };
        self.events
            .send(AppEvent::PreviewReady {
                epoch,
                identity,
                image: Arc::new(image),
            })
            .is_ok()
    }
}
