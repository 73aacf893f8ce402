use super::*;
use crate::element::Element;
use crate::test_support::NullHost;

fn element_fiber(store: &mut FiberStore<NullHost>, tag: &str, key: Option<&str>) -> FiberId {
    let mut builder = Element::host(tag);
    if let Some(key) = key {
        builder = builder.key(key);
    }
    let element = builder.build();
    store
        .create_fiber_from_element(&element, Priority::Synchronous)
        .expect("host element")
}

#[test]
fn priority_ordering_treats_no_work_as_absent() {
    assert!(Priority::Synchronous.is_more_urgent_than(Priority::Low));
    assert!(Priority::Low.is_more_urgent_than(Priority::NoWork));
    assert!(!Priority::NoWork.is_more_urgent_than(Priority::Offscreen));
    assert_eq!(Priority::NoWork.most_urgent(Priority::High), Priority::High);
    assert!(Priority::Task.is_within(Priority::Animation));
    assert!(!Priority::Low.is_within(Priority::Animation));
    assert!(!Priority::NoWork.is_within(Priority::Offscreen));
}

#[test]
fn released_ids_stop_resolving() {
    let mut store = FiberStore::<NullHost>::new();
    let id = element_fiber(&mut store, "div", None);
    assert!(store.contains(id));
    store.release(id);
    assert!(!store.contains(id));
    assert!(store.is_empty());

    let reused = element_fiber(&mut store, "span", None);
    assert_eq!(reused.index(), id.index());
    assert_ne!(reused, id);
    assert!(store.get(id).is_none());
}

#[test]
fn element_fibers_carry_tag_key_and_props() {
    let mut store = FiberStore::<NullHost>::new();
    let id = element_fiber(&mut store, "li", Some("a"));
    let fiber = &store[id];
    assert_eq!(fiber.tag(), FiberTag::HostComponent);
    assert_eq!(fiber.key().map(|key| &**key), Some("a"));
    assert!(matches!(fiber.pending_props, Some(FiberProps::Element(_))));
    assert_eq!(fiber.pending_work_priority(), Priority::Synchronous);
}

#[test]
fn clone_to_work_in_progress_pairs_and_recycles() {
    let mut store = FiberStore::<NullHost>::new();
    let current = element_fiber(&mut store, "div", None);
    store.take_uncommitted();

    let work = store.clone_to_work_in_progress(current, Priority::Low);
    assert_ne!(work, current);
    assert_eq!(store[work].alternate(), Some(current));
    assert_eq!(store[current].alternate(), Some(work));
    assert_eq!(store[work].pending_work_priority(), Priority::Low);
    assert!(store.is_uncommitted(work));

    store[work].effect_tag = EffectTag::PLACEMENT;
    let again = store.clone_to_work_in_progress(current, Priority::High);
    assert_eq!(again, work);
    assert!(store[again].effect_tag().is_empty());
    assert_eq!(store.len(), 2);
}

#[test]
fn release_unlinks_the_partner() {
    let mut store = FiberStore::<NullHost>::new();
    let current = element_fiber(&mut store, "div", None);
    let work = store.clone_to_work_in_progress(current, Priority::Synchronous);
    store.release(work);
    assert_eq!(store[current].alternate(), None);
}

#[test]
fn subtree_walks_in_tree_order() {
    let mut store = FiberStore::<NullHost>::new();
    let parent = element_fiber(&mut store, "ul", None);
    let first = element_fiber(&mut store, "li", Some("1"));
    let second = element_fiber(&mut store, "li", Some("2"));
    let nested = element_fiber(&mut store, "b", None);

    let head = store.link_children(parent, &[first, second]);
    store[parent].child = head;
    let nested_head = store.link_children(first, &[nested]);
    store[first].child = nested_head;

    assert_eq!(store.subtree(parent), vec![parent, first, nested, second]);
    assert_eq!(store.all_children(parent), vec![first, second]);
    assert_eq!(store[second].parent(), Some(parent));
}

#[test]
fn text_props_compare_by_value() {
    let a = FiberProps::Text(Rc::from("same"));
    let b = FiberProps::Text(Rc::from("same"));
    assert!(a.same(&b));
    assert!(!a.same(&FiberProps::Text(Rc::from("other"))));
}
