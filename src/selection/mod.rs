mod cycle;

use crate::candidate::{CandidateList, CandidateWindow};
use crate::platform::{ProcessId, RgbaImage, WindowIdentity};
use std::sync::Arc;
use tracing::trace;

/// Candidate list plus cursor. Empty list implies no selection.
#[derive(Debug, Default)]
pub(crate) struct SelectionState {
    list: CandidateList,
    selected: Option<usize>,
}

impl SelectionState {
    pub(crate) fn candidates(&self) -> &CandidateList {
        &self.list
    }

    pub(crate) fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub(crate) fn selected(&self) -> Option<&CandidateWindow> {
        self.selected.and_then(|ix| self.list.get(ix))
    }

    pub(crate) fn selected_identity(&self) -> Option<WindowIdentity> {
        self.selected().map(|w| w.identity)
    }

    /// Replaces the list atomically. Keeps the selected identity when it
    /// survives the rebuild, otherwise selects the first entry.
    pub(crate) fn set_candidates(&mut self, list: CandidateList) {
        let previous = self.selected_identity();
        self.list = list;
        self.selected = match previous.and_then(|id| self.list.position(&id)) {
            Some(ix) => Some(ix),
            None if self.list.is_empty() => None,
            None => Some(0),
        };
        trace!(
            epoch = self.list.epoch,
            total = self.list.len(),
            selected = ?self.selected,
            "set_candidates"
        );
    }

    /// Drops the cursor without touching the list.
    pub(crate) fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Moves the selected entry to index 0, keeping it selected.
    pub(crate) fn promote_selected_to_front(&mut self) {
        let Some(ix) = self.selected else {
            return;
        };
        if ix == 0 || ix >= self.list.len() {
            return;
        }
        let entry = self.list.windows.remove(ix);
        self.list.windows.insert(0, entry);
        self.selected = Some(0);
    }

    /// Optimistically removes one window (after close).
    pub(crate) fn remove_window(&mut self, identity: &WindowIdentity) {
        self.retain(|w| &w.identity != identity);
    }

    /// Optimistically removes every window of a process (after quit).
    pub(crate) fn remove_process(&mut self, pid: ProcessId) {
        self.retain(|w| w.pid() != pid);
    }

    /// Removal keeps the cursor at the same position, clamped to the new
    /// length, so it lands on the neighbour of what was removed.
    fn retain(&mut self, keep: impl Fn(&CandidateWindow) -> bool) {
        let selected_row = self.selected;
        self.list.windows.retain(|w| keep(w));
        self.selected = match (selected_row, self.list.len()) {
            (_, 0) => None,
            (Some(row), len) => Some(row.min(len - 1)),
            (None, _) => None,
        };
    }

    /// Attaches a captured preview. Returns false when the result belongs
    /// to an older epoch or its window has left the list.
    pub(crate) fn apply_preview(
        &mut self,
        epoch: u64,
        identity: &WindowIdentity,
        image: Arc<RgbaImage>,
    ) -> bool {
        if epoch != self.list.epoch {
            return false;
        }
        let Some(ix) = self.list.position(identity) else {
            return false;
        };
        self.list.windows[ix].preview = Some(image);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::test_support::list;

    fn state(ids: &[(ProcessId, u32)]) -> SelectionState {
        let mut s = SelectionState::default();
        s.set_candidates(list(1, ids));
        s
    }

    fn ident(pid: ProcessId, id: u32) -> WindowIdentity {
        WindowIdentity::new(pid, id)
    }

    #[test]
    fn rebuild_preserves_or_resets() {
        let cases: [(&[(ProcessId, u32)], Option<WindowIdentity>); 3] = [
            (&[(3, 30), (2, 20), (1, 10)], Some(ident(2, 20))),
            (&[(3, 30), (1, 10)], Some(ident(3, 30))),
            (&[], None),
        ];
        for (next, expected) in cases {
            let mut s = state(&[(1, 10), (2, 20), (3, 30)]);
            s.select_identity(&ident(2, 20));
            s.set_candidates(list(2, next));
            assert_eq!(s.selected_identity(), expected, "next: {next:?}");
        }
    }

    #[test]
    fn rebuild_without_cursor_selects_first() {
        let mut s = state(&[(1, 10), (2, 20)]);
        s.clear_selection();
        s.set_candidates(list(2, &[(2, 20), (1, 10)]));
        assert_eq!(s.selected_index(), Some(0));
    }

    #[test]
    fn promote_moves_selected_to_front() {
        let mut s = state(&[(1, 10), (2, 20), (3, 30)]);
        s.select_index(2);
        s.promote_selected_to_front();
        let order: Vec<_> = s.candidates().iter().map(|w| w.identity.window).collect();
        assert_eq!(order, vec![30, 10, 20]);
        assert_eq!(s.selected_index(), Some(0));
    }

    #[test]
    fn promote_is_idempotent_at_front() {
        let mut s = state(&[(1, 10), (2, 20), (3, 30)]);
        s.promote_selected_to_front();
        s.promote_selected_to_front();
        let order: Vec<_> = s.candidates().iter().map(|w| w.identity.window).collect();
        assert_eq!(order, vec![10, 20, 30]);
        assert_eq!(s.selected_index(), Some(0));
    }

    #[test]
    fn removal_clamps_cursor() {
        let mut s = state(&[(1, 10), (2, 20), (2, 21), (3, 30)]);
        s.select_index(3);
        s.remove_window(&ident(3, 30));
        assert_eq!(s.selected_identity(), Some(ident(2, 21)));

        s.remove_process(2);
        assert_eq!(s.selected_identity(), Some(ident(1, 10)));

        s.remove_process(1);
        assert_eq!(s.selected_index(), None);
        assert!(s.candidates().is_empty());
    }

    #[test]
    fn previews_apply_only_to_current_epoch() {
        let mut s = state(&[(1, 10), (2, 20)]);
        let img = Arc::new(RgbaImage::new(1, 1));
        let cases = [
            (0, ident(1, 10), false),
            (1, ident(9, 90), false),
            (1, ident(2, 20), true),
        ];
        for (epoch, id, expected) in cases {
            assert_eq!(
                s.apply_preview(epoch, &id, img.clone()),
                expected,
                "epoch: {epoch} id: {id:?}"
            );
        }
        assert!(s.candidates().get(1).unwrap().preview.is_some());
        assert!(s.candidates().get(0).unwrap().preview.is_none());
    }
}
