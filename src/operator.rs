use crate::bbox::{BBox, Ltwh};
use crate::error::Result;
use crate::frame::Frame;

/// Why the operator is asked for a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectReason {
    /// First frame of the video
    Initial,
    /// The tracker lost the target
    Lost,
    /// The operator asked to re-select while tracking
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorAction {
    Continue,
    Reselect,
}

/// The human in the loop. Both calls block for as long as the operator
/// needs; there is no timeout.
pub trait Operator<F: Frame> {
    /// Draws a box on a down-sampled `preview`, in preview pixels.
    /// `BBox::NO_SELECTION` means the target is not visible.
    fn select(&mut self, preview: &F, reason: SelectReason) -> Result<BBox<Ltwh>>;

    /// Shows a tracked frame. Returning `Reselect` triggers a manual
    /// re-selection on this frame.
    fn present(&mut self, _frame: &F, _bbox: Option<&BBox<Ltwh>>) -> Result<OperatorAction> {
        Ok(OperatorAction::Continue)
    }
}

/// Operator for unattended runs: never sees the target. Combined with a
/// seeded initial box the session tracks until the first loss and then
/// only records gaps.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unattended;

impl<F: Frame> Operator<F> for Unattended {
    fn select(&mut self, _preview: &F, _reason: SelectReason) -> Result<BBox<Ltwh>> {
        Ok(BBox::NO_SELECTION)
    }
}
