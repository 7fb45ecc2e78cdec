//! Progress state shared by the splittable messages.

use std::collections::VecDeque;
use std::mem;

use crate::error::Result;

/// Tracks one logical message across its fragmentation rounds.
///
/// The elements not yet emitted live in `pending`, oldest first; the
/// message's visible element list only ever holds the current round.
#[derive(Debug, Clone)]
pub(crate) struct SplitState<T> {
    rounds: usize,
    pending: VecDeque<T>,
}

impl<T> Default for SplitState<T> {
    fn default() -> Self {
        Self {
            rounds: 0,
            pending: VecDeque::new(),
        }
    }
}

impl<T> SplitState<T> {
    /// Number of rounds emitted so far; zero before the first split.
    pub(crate) fn rounds(&self) -> usize {
        self.rounds
    }

    /// Elements still waiting for a later round.
    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Take over the full element list of a message that needs splitting.
    pub(crate) fn begin(&mut self, elements: &mut Vec<T>) {
        self.pending = mem::take(elements).into();
    }

    /// Move the next round's prefix from `pending` into `elements`.
    ///
    /// Returns how many elements were moved. At least one is moved while
    /// any are pending, even when it alone is over `budget`. A failing
    /// `cost` leaves `pending` untouched. The round only counts once
    /// [`commit`](Self::commit) is called.
    pub(crate) fn carve(
        &mut self,
        elements: &mut Vec<T>,
        budget: usize,
        cost: impl Fn(&T) -> Result<usize>,
    ) -> Result<usize> {
        let take = prefix_len(self.pending.iter().map(cost), budget)?;
        elements.clear();
        elements.extend(self.pending.drain(..take));
        Ok(take)
    }

    /// Count the carved round as emitted.
    pub(crate) fn commit(&mut self) {
        self.rounds += 1;
    }

    /// Give a carved but uncommitted round back to `pending`.
    ///
    /// Before the first committed round the whole list is handed back to
    /// `elements`, leaving the message as it was before splitting began.
    pub(crate) fn unwind(&mut self, elements: &mut Vec<T>) {
        for element in elements.drain(..).rev() {
            self.pending.push_front(element);
        }
        if self.rounds == 0 {
            elements.extend(self.pending.drain(..));
        }
    }

    pub(crate) fn reset(&mut self) {
        self.rounds = 0;
        self.pending.clear();
    }
}

/// Length of the longest prefix whose summed cost stays within `budget`,
/// but never less than one element when any exist.
pub(crate) fn prefix_len(
    costs: impl IntoIterator<Item = Result<usize>>,
    budget: usize,
) -> Result<usize> {
    let mut total = 0usize;
    let mut count = 0usize;
    for cost in costs {
        total = total.saturating_add(cost?);
        if total > budget {
            if count == 0 {
                count = 1;
            }
            break;
        }
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;

    fn costs(values: &[usize]) -> Vec<Result<usize>> {
        values.iter().copied().map(Ok).collect()
    }

    #[test]
    fn prefix_stops_before_overflowing_element() {
        assert_eq!(prefix_len(costs(&[10, 10, 10, 10]), 25).unwrap(), 2);
        assert_eq!(prefix_len(costs(&[10, 10, 10]), 30).unwrap(), 3);
        assert_eq!(prefix_len(costs(&[10, 10, 10]), 1000).unwrap(), 3);
    }

    #[test]
    fn oversized_head_is_taken_alone() {
        assert_eq!(prefix_len(costs(&[100, 1, 1]), 50).unwrap(), 1);
        assert_eq!(prefix_len(costs(&[100, 1, 1]), 0).unwrap(), 1);
    }

    #[test]
    fn empty_input_takes_nothing() {
        assert_eq!(prefix_len(costs(&[]), 50).unwrap(), 0);
    }

    #[test]
    fn prefix_surfaces_cost_errors() {
        let costs = vec![Ok(1), Err(ProtocolError::Exhausted), Ok(1)];
        assert!(matches!(prefix_len(costs, 50), Err(ProtocolError::Exhausted)));
    }

    #[test]
    fn carve_walks_pending_in_order() {
        let mut state = SplitState::default();
        let mut elements = vec![1usize, 2, 3, 4, 5];
        state.begin(&mut elements);
        assert!(elements.is_empty());

        for expected in [vec![1, 2], vec![3, 4], vec![5]] {
            let taken = state.carve(&mut elements, 2, |_| Ok(1)).unwrap();
            state.commit();
            assert_eq!(taken, expected.len());
            assert_eq!(elements, expected);
        }

        assert_eq!(state.rounds(), 3);
        assert_eq!(state.pending(), 0);

        state.reset();
        assert_eq!(state.rounds(), 0);
    }

    #[test]
    fn unwind_before_first_round_restores_elements() {
        let mut state = SplitState::default();
        let mut elements = vec![1usize, 2, 3, 4];
        state.begin(&mut elements);

        state.carve(&mut elements, 2, |_| Ok(1)).unwrap();
        state.unwind(&mut elements);

        assert_eq!(elements, vec![1, 2, 3, 4]);
        assert_eq!(state.pending(), 0);
        assert_eq!(state.rounds(), 0);
    }

    #[test]
    fn unwind_later_round_keeps_elements_pending() {
        let mut state = SplitState::default();
        let mut elements = vec![1usize, 2, 3, 4];
        state.begin(&mut elements);
        state.carve(&mut elements, 2, |_| Ok(1)).unwrap();
        state.commit();

        state.carve(&mut elements, 2, |_| Ok(1)).unwrap();
        state.unwind(&mut elements);
        assert!(elements.is_empty());
        assert_eq!(state.pending(), 2);
        assert_eq!(state.rounds(), 1);

        state.carve(&mut elements, 2, |_| Ok(1)).unwrap();
        assert_eq!(elements, vec![3, 4]);
    }

    #[test]
    fn failed_cost_leaves_pending_intact() {
        let mut state = SplitState::default();
        let mut elements = vec![1usize, 2, 3];
        state.begin(&mut elements);

        let err = state
            .carve(&mut elements, 10, |e| {
                if *e == 2 {
                    Err(ProtocolError::Exhausted)
                } else {
                    Ok(1)
                }
            })
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Exhausted));
        assert_eq!(state.pending(), 3);
    }
}
