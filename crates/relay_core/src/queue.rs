use crate::{ItemId, ItemStatus, QueueItem, Settings};

/// Position of the first `Pending` item in list order.
pub fn next_pending(queue: &[QueueItem]) -> Option<usize> {
    queue
        .iter()
        .position(|item| item.status == ItemStatus::Pending)
}

pub fn has_pending(queue: &[QueueItem]) -> bool {
    next_pending(queue).is_some()
}

/// Tool forwarded for the item at `index`. With sequencing on, the sequence
/// is indexed by queue position, not insertion order.
pub fn tool_for_index(settings: &Settings, queue: &[QueueItem], index: usize) -> Option<String> {
    if settings.use_tool_sequence && !settings.tool_sequence.is_empty() {
        let slot = index % settings.tool_sequence.len();
        return Some(settings.tool_sequence[slot].clone());
    }
    queue.get(index).and_then(|item| item.tool.clone())
}

pub fn find_item_mut<'a>(queue: &'a mut [QueueItem], id: &ItemId) -> Option<&'a mut QueueItem> {
    queue.iter_mut().find(|item| &item.id == id)
}

/// Resets the listed terminal items (or every terminal item when `ids` is
/// empty). Returns the number of items changed.
pub fn reset_items(queue: &mut [QueueItem], ids: &[ItemId]) -> usize {
    queue
        .iter_mut()
        .filter(|item| ids.is_empty() || ids.contains(&item.id))
        .map(QueueItem::reset_to_pending)
        .filter(|changed| *changed)
        .count()
}

/// Items left `Processing` by an engine that went away mid-exchange.
pub fn interrupted_items(queue: &[QueueItem]) -> Vec<ItemId> {
    queue
        .iter()
        .filter(|item| item.status == ItemStatus::Processing)
        .map(|item| item.id.clone())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueSummary {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueSummary {
    pub fn of(queue: &[QueueItem]) -> Self {
        let mut summary = Self::default();
        for item in queue {
            match item.status {
                ItemStatus::Pending => summary.pending += 1,
                ItemStatus::Processing => summary.processing += 1,
                ItemStatus::Completed => summary.completed += 1,
                ItemStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed
    }
}
