use relay_core::{
    has_pending, interrupted_items, next_pending, reset_items, tool_for_index, ItemId, ItemStatus,
    QueueItem, QueueSummary, Settings,
};

fn item(id: &str, status: ItemStatus) -> QueueItem {
    let mut item = QueueItem::new(format!("prompt {id}")).with_id(id);
    item.status = status;
    item
}

#[test]
fn first_pending_in_list_order_is_selected() {
    let queue = vec![
        item("a", ItemStatus::Completed),
        item("b", ItemStatus::Failed),
        item("c", ItemStatus::Pending),
        item("d", ItemStatus::Pending),
    ];
    assert_eq!(next_pending(&queue), Some(2));
    assert!(has_pending(&queue));
    assert_eq!(next_pending(&queue[..2]), None);
}

#[test]
fn tool_sequence_follows_queue_position() {
    let settings = Settings {
        use_tool_sequence: true,
        tool_sequence: vec!["X".into(), "Y".into()],
        ..Settings::default()
    };
    let queue = vec![
        item("a", ItemStatus::Pending),
        item("b", ItemStatus::Pending),
        item("c", ItemStatus::Pending),
    ];
    assert_eq!(tool_for_index(&settings, &queue, 0).as_deref(), Some("X"));
    assert_eq!(tool_for_index(&settings, &queue, 1).as_deref(), Some("Y"));
    assert_eq!(tool_for_index(&settings, &queue, 2).as_deref(), Some("X"));
}

#[test]
fn item_tool_is_used_without_sequence() {
    let settings = Settings {
        use_tool_sequence: false,
        tool_sequence: vec!["X".into()],
        ..Settings::default()
    };
    let queue = vec![item("a", ItemStatus::Pending).with_tool("search")];
    assert_eq!(tool_for_index(&settings, &queue, 0).as_deref(), Some("search"));
}

#[test]
fn reset_with_empty_ids_resets_all_terminal_items() {
    let mut queue = vec![
        item("a", ItemStatus::Completed),
        item("b", ItemStatus::Failed),
        item("c", ItemStatus::Pending),
    ];
    assert_eq!(reset_items(&mut queue, &[]), 2);
    assert!(queue.iter().all(|item| item.status == ItemStatus::Pending));
}

#[test]
fn reset_with_ids_is_selective() {
    let mut queue = vec![item("a", ItemStatus::Failed), item("b", ItemStatus::Failed)];
    assert_eq!(reset_items(&mut queue, &[ItemId::from("b")]), 1);
    assert_eq!(queue[0].status, ItemStatus::Failed);
    assert_eq!(queue[1].status, ItemStatus::Pending);
}

#[test]
fn processing_items_are_reported_as_interrupted() {
    let queue = vec![item("a", ItemStatus::Processing), item("b", ItemStatus::Pending)];
    assert_eq!(interrupted_items(&queue), vec![ItemId::from("a")]);

    let summary = QueueSummary::of(&queue);
    assert_eq!(summary.processing, 1);
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.total(), 2);
}
