mod correlate;
pub(crate) mod previews;

use crate::app::AppEvent;
use crate::candidate::{CandidateList, CandidateWindow, Fidelity};
use crate::config::{ConfigHandle, SwitcherConfig, ICON_SIZE_MAX};
use crate::platform::preview::fit_thumbnail;
use crate::platform::{
    AppRecord, AxWindow, ProcessId, RawWindow, RgbaImage, WindowIdentity, WindowScope,
    WindowSystem, NORMAL_WINDOW_LAYER,
};
use correlate::Resolution;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Builds candidate lists from the OS window list and accessibility tree.
pub(crate) struct WindowSource<W: WindowSystem> {
    system: Arc<W>,
    config: ConfigHandle,
    own_pid: ProcessId,
    epoch: AtomicU64,
    icons: Mutex<HashMap<ProcessId, Option<Arc<RgbaImage>>>>,
}

impl<W: WindowSystem> WindowSource<W> {
    pub(crate) fn new(system: Arc<W>, config: ConfigHandle) -> Self {
        Self {
            system,
            config,
            own_pid: std::process::id() as ProcessId,
            epoch: AtomicU64::new(0),
            icons: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_own_pid(mut self, pid: ProcessId) -> Self {
        self.own_pid = pid;
        self
    }

    /// Rebuilds the candidate list. Never fails: OS errors degrade to a
    /// partial or empty list.
    pub(crate) fn refresh(&self) -> CandidateList {
        let config = self.config.snapshot();
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let windows = self.collect(&config);
        debug!(epoch, total = windows.len(), "enumerated candidates");
        CandidateList::new(epoch, windows)
    }

    fn collect(&self, config: &SwitcherConfig) -> Vec<CandidateWindow> {
        let apps = match self.system.running_apps() {
            Ok(apps) => apps,
            Err(e) => {
                warn!(error = %e, "running application query failed");
                return Vec::new();
            }
        };
        let scope = if config.all_desktops {
            WindowScope::AllDesktops
        } else {
            WindowScope::OnScreen
        };
        let raw = match self.system.window_list(scope) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "window list query failed");
                return Vec::new();
            }
        };

        let apps: HashMap<ProcessId, AppRecord> = apps
            .into_iter()
            .filter(|a| a.regular)
            .map(|a| (a.process.pid, a))
            .collect();

        let qualifying: Vec<&RawWindow> = raw
            .iter()
            .filter(|w| w.pid != self.own_pid)
            .filter(|w| apps.contains_key(&w.pid))
            .filter(|w| w.layer == NORMAL_WINDOW_LAYER)
            .filter(|w| {
                w.bounds.width > config.min_window_size && w.bounds.height > config.min_window_size
            })
            .collect();

        let mut per_pid: HashMap<ProcessId, usize> = HashMap::new();
        for w in &qualifying {
            *per_pid.entry(w.pid).or_default() += 1;
        }

        let mut ax_cache: HashMap<ProcessId, Option<Vec<AxWindow>>> = HashMap::new();
        let mut out = Vec::with_capacity(qualifying.len());
        for w in qualifying {
            let ax = ax_cache
                .entry(w.pid)
                .or_insert_with(|| self.ax_windows(w.pid));
            let (minimized, fidelity) = match ax.as_deref() {
                None => (false, Fidelity::Unresolved),
                Some([]) => {
                    trace!(pid = w.pid, window = w.id, "no accessible windows, dropping");
                    continue;
                }
                Some(elements) => {
                    let count = per_pid.get(&w.pid).copied().unwrap_or(0);
                    match correlate::resolve(w, count, elements) {
                        Resolution::Unresolved => {
                            debug!(
                                pid = w.pid,
                                window = w.id,
                                "ambiguous window match, keeping with reduced metadata"
                            );
                            (false, Fidelity::Unresolved)
                        }
                        resolved => {
                            let Some(element) = resolved.index().and_then(|ix| elements.get(ix))
                            else {
                                continue;
                            };
                            if !element.role.is_switchable() {
                                trace!(pid = w.pid, window = w.id, role = ?element.role, "skipping role");
                                continue;
                            }
                            if element.minimized && !config.show_minimized {
                                trace!(pid = w.pid, window = w.id, "skipping minimized");
                                continue;
                            }
                            (element.minimized, Fidelity::Resolved)
                        }
                    }
                }
            };
            let Some(app) = apps.get(&w.pid) else {
                continue;
            };
            out.push(CandidateWindow {
                identity: WindowIdentity::new(w.pid, w.id),
                owner_name: app.name.clone(),
                owner: app.process.clone(),
                title: w.title.clone(),
                icon: self.icon_for(app),
                preview: None,
                bounds_hint: w.bounds,
                minimized,
                fidelity,
            });
        }

        if !config.show_all_windows {
            out = first_window_per_process(out);
        }
        if config.show_minimized {
            // Stable: minimized windows trail, relative order kept.
            out.sort_by_key(|w| w.minimized);
        }
        if let Some(front) = self.system.frontmost_pid() {
            out = frontmost_first(out, front);
        }
        out
    }

    fn ax_windows(&self, pid: ProcessId) -> Option<Vec<AxWindow>> {
        match self.system.ax_windows(pid) {
            Ok(ax) => ax,
            Err(e) => {
                debug!(pid, error = %e, "accessibility query failed");
                None
            }
        }
    }

    fn icon_for(&self, app: &AppRecord) -> Option<Arc<RgbaImage>> {
        let mut icons = self.icons.lock();
        icons
            .entry(app.process.pid)
            .or_insert_with(|| {
                self.system
                    .app_icon(&app.process)
                    .and_then(|icon| fit_thumbnail(&icon, ICON_SIZE_MAX, ICON_SIZE_MAX))
                    .map(Arc::new)
            })
            .clone()
    }

    /// Drops cached icons of processes that are gone.
    pub(crate) fn retain_icons(&self, list: &CandidateList) {
        let mut icons = self.icons.lock();
        icons.retain(|pid, _| list.iter().any(|w| w.pid() == *pid));
    }
}

fn first_window_per_process(windows: Vec<CandidateWindow>) -> Vec<CandidateWindow> {
    let mut seen = std::collections::HashSet::new();
    windows
        .into_iter()
        .filter(|w| seen.insert(w.pid()))
        .collect()
}

/// Moves the frontmost process's windows to the head, keeping enumeration
/// order on both sides.
fn frontmost_first(windows: Vec<CandidateWindow>, front: ProcessId) -> Vec<CandidateWindow> {
    let (mut head, tail): (Vec<_>, Vec<_>) = windows.into_iter().partition(|w| w.pid() == front);
    head.extend(tail);
    head
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RefreshRequest {
    pub ticket: u64,
}

/// Runs enumeration off the core thread; results come back as
/// [`AppEvent::Enumerated`].
pub(crate) fn spawn_worker<W: WindowSystem + 'static>(
    source: Arc<WindowSource<W>>,
    events: Sender<AppEvent>,
) -> Sender<RefreshRequest> {
    let (tx, rx): (Sender<RefreshRequest>, Receiver<RefreshRequest>) =
        crossbeam_channel::unbounded();
    let spawned = std::thread::Builder::new()
        .name("window-source".into())
        .spawn(move || {
            for req in rx {
                let list = source.refresh();
                source.retain_icons(&list);
                if events
                    .send(AppEvent::Enumerated {
                        ticket: req.ticket,
                        list,
                    })
                    .is_err()
                {
                    break;
                }
            }
            debug!("window source worker exited");
        });
    if let Err(e) = spawned {
        warn!(error = %e, "failed to spawn window source worker");
    }
    tx
}
