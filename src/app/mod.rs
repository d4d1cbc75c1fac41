//! The reactive core. One thread owns the selection, the overlay and the
//! dispatcher; input, enumeration and captures reach it as [`AppEvent`]s.

mod run;

pub use run::run;

use crate::candidate::CandidateList;
use crate::config::{self, ConfigHandle};
use crate::dispatch::{ActionDispatcher, Outcome};
use crate::input::listener::{Action, Command, InputListener};
use crate::overlay::layout::preview_size;
use crate::overlay::placement::active_monitor;
use crate::overlay::surface::{OverlaySurface, SurfaceEvent};
use crate::overlay::OverlayController;
use crate::platform::{ProcessControl, RgbaImage, WindowIdentity, WindowSystem};
use crate::selection::SelectionState;
use crate::window_source::previews::PreviewJob;
use crate::window_source::RefreshRequest;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

#[derive(Debug)]
pub enum AppEvent {
    Input(Vec<Command>),
    Enumerated { ticket: u64, list: CandidateList },
    PreviewReady {
        epoch: u64,
        identity: WindowIdentity,
        image: Arc<RgbaImage>,
    },
    Surface(SurfaceEvent),
    Shutdown,
}

/// Request channels into the background workers.
pub(crate) struct Workers {
    pub refresh: Sender<RefreshRequest>,
    pub previews: Sender<PreviewJob>,
}

#[derive(Debug, Default)]
struct Session {
    active: bool,
    pointer_moved: bool,
}

pub(crate) struct Switcher<W: WindowSystem, P: ProcessControl> {
    system: Arc<W>,
    config: ConfigHandle,
    selection: SelectionState,
    overlay: OverlayController,
    dispatcher: ActionDispatcher<P>,
    listener: Arc<Mutex<InputListener>>,
    workers: Workers,
    queue: VecDeque<Command>,
    next_ticket: u64,
    inflight: Option<u64>,
    reconcile_at: Option<Instant>,
    session: Session,
    persist_to: Option<PathBuf>,
}

impl<W: WindowSystem, P: ProcessControl> Switcher<W, P> {
    pub(crate) fn new(
        system: Arc<W>,
        control: Arc<P>,
        config: ConfigHandle,
        surface: Box<dyn OverlaySurface>,
        listener: Arc<Mutex<InputListener>>,
        workers: Workers,
    ) -> Self {
        Self {
            system,
            dispatcher: ActionDispatcher::new(control, config.clone()),
            config,
            selection: SelectionState::default(),
            overlay: OverlayController::new(surface),
            listener,
            workers,
            queue: VecDeque::new(),
            next_ticket: 0,
            inflight: None,
            reconcile_at: None,
            session: Session::default(),
            persist_to: config::config_write_path(),
        }
    }

    pub(crate) fn visible_flag(&self) -> Arc<AtomicBool> {
        self.overlay.visible_flag()
    }

    /// Earliest timer the loop must wake for.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        match (self.overlay.deadline(), self.reconcile_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub(crate) fn handle(&mut self, event: AppEvent, now: Instant) {
        match event {
            AppEvent::Input(commands) => {
                self.queue.extend(commands);
                self.drain(now);
            }
            AppEvent::Enumerated { ticket, list } => self.on_enumerated(ticket, list, now),
            AppEvent::PreviewReady {
                epoch,
                identity,
                image,
            } => {
                if self.selection.apply_preview(epoch, &identity, image) {
                    self.overlay.refresh(&self.selection);
                } else {
                    trace!(epoch, window = identity.window, "discarding stale preview");
                }
            }
            AppEvent::Surface(event) => self.on_surface(event, now),
            AppEvent::Shutdown => {}
        }
    }

    /// Fires due timers: the debounced show and the post-action reconcile.
    pub(crate) fn tick(&mut self, now: Instant) {
        if let Some(request) = self.overlay.take_due(now) {
            if self.session.active && !self.selection.candidates().is_empty() {
                let monitor = active_monitor(&self.system.monitors(), self.system.cursor_position());
                let icon_size = self.config.read(|c| c.icon_size());
                self.overlay.show(request, &self.selection, icon_size, monitor);
                self.session.pointer_moved = false;
                debug!(reverse = request.reverse, "panel visible");
            }
        }
        if self.reconcile_at.is_some_and(|at| at <= now) {
            self.reconcile_at = None;
            debug!("reconciling candidates after action");
            self.queue.push_back(Command::Refresh);
            self.drain(now);
        }
    }

    /// Applies queued commands in order. A refresh is a barrier: nothing
    /// behind it runs until its list has arrived.
    fn drain(&mut self, now: Instant) {
        while self.inflight.is_none() {
            let Some(command) = self.queue.pop_front() else {
                return;
            };
            self.apply(command, now);
        }
    }

    fn apply(&mut self, command: Command, now: Instant) {
        trace!(?command, "apply");
        match command {
            Command::Begin => {
                self.selection.clear_selection();
                self.session = Session {
                    active: true,
                    pointer_moved: false,
                };
                debug!("session started");
            }
            Command::Refresh => self.request_refresh(),
            Command::Cycle { reverse, repeat } => self.cycle(reverse, repeat, now),
            Command::ScheduleShow { reverse } => {
                if self.session.active && !self.overlay.is_visible() {
                    let delay = self.config.read(|c| c.show_delay());
                    self.overlay.schedule_show(now + delay, reverse);
                }
            }
            Command::Commit => self.commit(now),
            Command::Cancel => {
                self.overlay.hide();
                self.session = Session::default();
                debug!("session cancelled");
            }
            Command::Dispatch(action) => self.dispatch(action, now),
            Command::Rebound(slot) => {
                let Some(path) = self.persist_to.as_deref() else {
                    warn!(?slot, "no writable config location, binding kept in memory");
                    return;
                };
                match config::save_config(path, &self.config.snapshot()) {
                    Ok(()) => info!(?slot, path = %path.display(), "shortcut saved"),
                    Err(e) => warn!(?slot, error = %e, "failed to save shortcut"),
                }
            }
        }
    }

    fn request_refresh(&mut self) {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        match self.workers.refresh.send(RefreshRequest { ticket }) {
            Ok(()) => self.inflight = Some(ticket),
            Err(_) => warn!("window source worker is gone, keeping current list"),
        }
    }

    fn on_enumerated(&mut self, ticket: u64, list: CandidateList, now: Instant) {
        if self.inflight != Some(ticket) {
            trace!(ticket, "ignoring superseded enumeration");
            return;
        }
        self.inflight = None;
        let epoch = list.epoch;
        self.selection.set_candidates(list);
        self.overlay.refresh(&self.selection);
        self.request_previews(epoch);
        self.drain(now);
    }

    fn request_previews(&self, epoch: u64) {
        let (enabled, icon_size) = self.config.read(|c| (c.preview_windows, c.icon_size()));
        if !enabled || self.selection.candidates().is_empty() {
            return;
        }
        let (max_w, max_h) = preview_size(icon_size);
        let job = PreviewJob {
            epoch,
            targets: self.selection.candidates().iter().map(|w| w.identity).collect(),
            max_w,
            max_h,
        };
        if self.workers.previews.send(job).is_err() {
            warn!("preview worker is gone");
        }
    }

    fn cycle(&mut self, reverse: bool, repeat: bool, now: Instant) {
        let continuous = self.config.read(|c| c.continuous_cycling);
        if repeat && !continuous && self.selection.at_boundary(reverse) {
            trace!(reverse, "auto-repeat stopped at list boundary");
            return;
        }
        self.selection.cycle(reverse);
        self.overlay.refresh(&self.selection);

        let live = self.config.read(|c| c.switch_windows_while_cycling);
        if live && self.overlay.is_visible() {
            if let Some(target) = self.selection.selected().cloned() {
                let outcome = self.dispatcher.raise(&target);
                self.after_action(outcome, now);
            }
        }
    }

    fn commit(&mut self, now: Instant) {
        if !self.session.active {
            trace!("commit without a session");
            return;
        }
        self.overlay.hide();
        self.session = Session::default();
        let Some(target) = self.selection.selected().cloned() else {
            debug!("nothing selected, session ended");
            return;
        };
        debug!(pid = target.pid(), window = target.identity.window, "committing selection");
        let outcome = self.dispatcher.activate(&target);
        if outcome == Outcome::Applied {
            self.selection.promote_selected_to_front();
        }
        self.after_action(outcome, now);
    }

    fn dispatch(&mut self, action: Action, now: Instant) {
        let Some(target) = self.selection.selected().cloned() else {
            return;
        };
        let outcome = match action {
            Action::Quit => self.dispatcher.quit(&target),
            Action::CloseWindow => self.dispatcher.close_window(&target),
            Action::NewWindow => self.dispatcher.new_window_instance(&target),
        };
        if outcome != Outcome::Failed {
            match action {
                Action::Quit => self.selection.remove_process(target.pid()),
                Action::CloseWindow => self.selection.remove_window(&target.identity),
                Action::NewWindow => {}
            }
            self.overlay.refresh(&self.selection);
            self.schedule_reconcile(now);
        }
    }

    fn after_action(&mut self, outcome: Outcome, now: Instant) {
        if outcome == Outcome::Stale {
            self.schedule_reconcile(now);
        }
    }

    fn schedule_reconcile(&mut self, now: Instant) {
        let delay = self.config.read(|c| c.reconcile_delay());
        self.reconcile_at = Some(now + delay);
    }

    fn on_surface(&mut self, event: SurfaceEvent, now: Instant) {
        if !self.overlay.is_visible() {
            return;
        }
        match event {
            SurfaceEvent::PointerMoved => self.session.pointer_moved = true,
            SurfaceEvent::Hover(index) => {
                if self.session.pointer_moved && self.selection.select_index(index) {
                    self.overlay.refresh(&self.selection);
                }
            }
            SurfaceEvent::Click(index) => {
                if self.selection.select_index(index) {
                    self.listener.lock().reset();
                    self.queue.push_back(Command::Commit);
                    self.drain(now);
                }
            }
        }
    }
}
