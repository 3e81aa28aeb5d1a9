// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::PortValue;

/// Ordered slots for one join, one per expected iteration.
///
/// Iterations report in whatever order they finish; the group is complete only once
/// every slot is filled, and its values always come back in iteration order. Failed
/// iterations report a [`PortValue::Failed`] so they still occupy their slot.
#[derive(Debug, Clone)]
pub struct JoinGroup {
    slots: Vec<Option<PortValue>>,
    filled: usize,
}

impl JoinGroup {
    pub fn new(expected: usize) -> Self {
        Self {
            slots: vec![None; expected],
            filled: 0,
        }
    }

    pub fn expected(&self) -> usize {
        self.slots.len()
    }

    /// Record the value of iteration `index`. Returns false if the index is out of
    /// range or the slot was already filled.
    pub fn report(&mut self, index: usize, value: PortValue) -> bool {
        match self.slots.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(value);
                self.filled += 1;
                true
            }
            _ => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// The gathered values in iteration order, once complete.
    pub fn values(&self) -> Option<Vec<PortValue>> {
        if !self.is_complete() {
            return None;
        }
        self.slots.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::IterationContext;
    use crate::errors::StageFailure;

    #[test]
    fn test_values_follow_iteration_order() {
        let mut group = JoinGroup::new(3);
        assert!(group.report(2, PortValue::Measure(Some(2.0))));
        assert!(group.report(0, PortValue::Measure(Some(0.0))));
        assert!(!group.is_complete());
        assert!(group.values().is_none());

        assert!(group.report(1, PortValue::Measure(Some(1.0))));
        assert_eq!(
            group.values().unwrap(),
            vec![
                PortValue::Measure(Some(0.0)),
                PortValue::Measure(Some(1.0)),
                PortValue::Measure(Some(2.0)),
            ]
        );
    }

    #[test]
    fn test_duplicate_and_out_of_range_reports_are_rejected() {
        let mut group = JoinGroup::new(2);
        let failure = StageFailure::aborted("denoise", &IterationContext::default());

        assert!(group.report(0, PortValue::Failed(failure)));
        assert!(!group.report(0, PortValue::Measure(None)));
        assert!(!group.report(2, PortValue::Measure(None)));
        assert!(!group.is_complete());
    }

    #[test]
    fn test_empty_group_is_complete() {
        let group = JoinGroup::new(0);
        assert!(group.is_complete());
        assert_eq!(group.values().unwrap(), Vec::<PortValue>::new());
    }
}
