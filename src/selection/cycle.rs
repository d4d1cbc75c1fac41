use super::SelectionState;
use crate::platform::WindowIdentity;

impl SelectionState {
    /// Steps the cursor by one with wraparound. No-op on an empty list.
    pub(crate) fn cycle(&mut self, reverse: bool) {
        let n = self.list.len() as isize;
        if n == 0 {
            return;
        }
        let offset = if reverse { -1 } else { 1 };
        let next = match self.selected {
            Some(i) => ((i as isize + offset) % n + n) % n,
            // Nothing selected yet: the first step lands on an end.
            None if reverse => n - 1,
            None => 0,
        };
        self.selected = Some(next as usize);
    }

    pub(crate) fn is_first(&self) -> bool {
        self.selected == Some(0)
    }

    pub(crate) fn is_last(&self) -> bool {
        !self.list.is_empty() && self.selected == Some(self.list.len() - 1)
    }

    /// Whether one more step in the given direction would wrap around.
    pub(crate) fn at_boundary(&self, reverse: bool) -> bool {
        if reverse {
            self.is_first()
        } else {
            self.is_last()
        }
    }

    pub(crate) fn select_index(&mut self, index: usize) -> bool {
        if index >= self.list.len() {
            return false;
        }
        self.selected = Some(index);
        true
    }

    #[cfg(test)]
    pub(crate) fn select_identity(&mut self, identity: &WindowIdentity) -> bool {
        match self.list.position(identity) {
            Some(ix) => self.select_index(ix),
            None => false,
        }
    }
}
