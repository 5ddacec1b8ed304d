use crate::catalog::LinkId;
use crate::pins::{PinSet, Placement};

/// Which half of a row the pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowHalf {
    Upper,
    Lower,
}

impl From<RowHalf> for Placement {
    fn from(half: RowHalf) -> Self {
        match half {
            RowHalf::Upper => Placement::Before,
            RowHalf::Lower => Placement::After,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEvent {
    Start { id: LinkId },
    Over { id: LinkId, half: Option<RowHalf> },
    Leave { id: LinkId },
    Drop { id: LinkId, half: Option<RowHalf> },
    /// Drag finished without landing on a row.
    End,
    /// Pointer left the draggable region.
    PointerExit,
}

/// Where the dragged row would land; used only for highlighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverHint {
    pub target: LinkId,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        source: LinkId,
        hint: Option<HoverHint>,
        last_direction: Option<Placement>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderCommand {
    pub source: LinkId,
    pub target: LinkId,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// Event did not apply in the current state.
    Ignored,
    /// Drag started or its hover hint changed.
    Tracking,
    /// Drop landed on a row; the command must be applied exactly once.
    Dropped(ReorderCommand),
    /// Drag ended without a drop. Nothing is to be reordered or saved.
    Abandoned,
}

/// Turns a stream of drag events into at most one reorder per drag.
///
/// Placement on drop is decided by, in order: the row half carried by the
/// drop, the last hover that carried a row half, and finally the positions
/// of source and target (a row dropped on a later row lands after it, on an
/// earlier row before it).
#[derive(Debug, Default)]
pub struct DragReorder {
    state: DragState,
}

impl DragReorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn source(&self) -> Option<&LinkId> {
        match &self.state {
            DragState::Dragging { source, .. } => Some(source),
            DragState::Idle => None,
        }
    }

    pub fn hint(&self) -> Option<&HoverHint> {
        match &self.state {
            DragState::Dragging { hint, .. } => hint.as_ref(),
            DragState::Idle => None,
        }
    }

    pub fn handle(&mut self, event: DragEvent, pins: &PinSet) -> DragOutcome {
        match event {
            DragEvent::Start { id } => {
                if let DragState::Dragging { source, .. } = &self.state {
                    tracing::debug!(previous = %source, next = %id, "drag restarted");
                }
                self.state = DragState::Dragging {
                    source: id,
                    hint: None,
                    last_direction: None,
                };
                DragOutcome::Tracking
            }
            DragEvent::Over { id, half } => {
                let DragState::Dragging {
                    source,
                    hint,
                    last_direction,
                } = &mut self.state
                else {
                    return DragOutcome::Ignored;
                };
                if id == *source {
                    *hint = None;
                    return DragOutcome::Tracking;
                }
                if let Some(half) = half {
                    *last_direction = Some(half.into());
                }
                let placement = half
                    .map(Placement::from)
                    .or(*last_direction)
                    .unwrap_or_else(|| positional_placement(pins, source, &id));
                *hint = Some(HoverHint {
                    target: id,
                    placement,
                });
                DragOutcome::Tracking
            }
            DragEvent::Leave { id } => {
                let DragState::Dragging { hint, .. } = &mut self.state else {
                    return DragOutcome::Ignored;
                };
                if hint.as_ref().is_some_and(|current| current.target == id) {
                    *hint = None;
                }
                DragOutcome::Tracking
            }
            DragEvent::Drop { id, half } => {
                let DragState::Dragging {
                    source,
                    last_direction,
                    ..
                } = std::mem::take(&mut self.state)
                else {
                    return DragOutcome::Ignored;
                };
                let placement = half
                    .map(Placement::from)
                    .or(last_direction)
                    .unwrap_or_else(|| positional_placement(pins, &source, &id));
                DragOutcome::Dropped(ReorderCommand {
                    source,
                    target: id,
                    placement,
                })
            }
            DragEvent::End | DragEvent::PointerExit => {
                if !self.is_dragging() {
                    return DragOutcome::Ignored;
                }
                self.state = DragState::Idle;
                DragOutcome::Abandoned
            }
        }
    }
}

fn positional_placement(pins: &PinSet, source: &LinkId, target: &LinkId) -> Placement {
    match (pins.position(source.as_str()), pins.position(target.as_str())) {
        (Some(from), Some(to)) if from < to => Placement::After,
        _ => Placement::Before,
    }
}
