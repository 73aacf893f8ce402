use std::cell::RefCell;
use std::rc::Rc;

use fiber_core::{Component, ComponentClass, Element, HookError, HookResult, Instance, Node};
use fiber_testing::{HostOp, TestRenderer};

fn list(keys: &[&str]) -> Element {
    Element::host("ul")
        .children(
            keys.iter()
                .map(|key| Element::host("li").key(*key).child(*key).into()),
        )
        .build()
}

fn structural(ops: Vec<HostOp>) -> Vec<HostOp> {
    ops.into_iter()
        .filter(|op| {
            matches!(
                op,
                HostOp::Append { .. } | HostOp::InsertBefore { .. } | HostOp::Remove { .. }
            )
        })
        .collect()
}

#[test]
fn mounts_a_nested_tree() {
    let mut renderer = TestRenderer::new();
    renderer
        .render(
            Element::host("div")
                .attr("id", "app")
                .child(Element::host("span").child("hello"))
                .child("world"),
        )
        .expect("render");

    assert_eq!(
        renderer.markup(),
        "<div id=\"app\"><span>hello</span>world</div>"
    );
    let ops = renderer.host_mut().take_ops();
    assert_eq!(
        ops.last(),
        Some(&HostOp::UpdateContainer {
            children: renderer.container_children()
        })
    );
    assert!(structural(ops).is_empty(), "children are attached at creation");
}

#[test]
fn top_level_fragments_render_as_siblings() {
    let mut renderer = TestRenderer::new();
    renderer
        .render(Node::fragment([
            Element::host("a").into(),
            Node::text("-"),
            Element::host("b").into(),
        ]))
        .expect("render");
    assert_eq!(renderer.markup(), "<a></a>-<b></b>");
    assert_eq!(renderer.container_children().len(), 3);
}

#[test]
fn updates_text_and_attributes_in_place() {
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::host("p").attr("class", "old").child("before"))
        .expect("mount");
    let node = renderer.container_children()[0];
    renderer.host_mut().take_ops();

    renderer
        .render(Element::host("p").attr("class", "new").child("after"))
        .expect("update");

    assert_eq!(renderer.container_children(), vec![node]);
    assert_eq!(renderer.markup(), "<p class=\"new\">after</p>");
    let ops = renderer.host_mut().take_ops();
    assert!(ops.contains(&HostOp::CommitUpdate { id: node }));
    assert!(ops
        .iter()
        .any(|op| matches!(op, HostOp::CommitText { text, .. } if text == "after")));
    assert!(!ops
        .iter()
        .any(|op| matches!(op, HostOp::CreateInstance { .. } | HostOp::CreateText { .. })));
}

#[test]
fn unchanged_attributes_skip_the_host_update() {
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::host("p").attr("class", "same"))
        .expect("mount");
    renderer.host_mut().take_ops();
    renderer
        .render(Element::host("p").attr("class", "same"))
        .expect("update");

    let ops = renderer.host_mut().take_ops();
    assert!(!ops.iter().any(|op| matches!(op, HostOp::CommitUpdate { .. })));
}

#[test]
fn keyed_reorder_moves_existing_nodes() {
    let mut renderer = TestRenderer::new();
    renderer.render(list(&["a", "b", "c"])).expect("mount");
    let ul = renderer.container_children()[0];
    let before = renderer.host().children(ul).to_vec();
    renderer.host_mut().take_ops();

    renderer.render(list(&["c", "a", "b"])).expect("reorder");

    assert_eq!(renderer.markup(), "<ul><li>c</li><li>a</li><li>b</li></ul>");
    let after = renderer.host().children(ul).to_vec();
    assert_eq!(after, vec![before[2], before[0], before[1]]);

    let ops = renderer.host_mut().take_ops();
    assert!(!ops.iter().any(|op| matches!(op, HostOp::CreateInstance { .. })));
    assert_eq!(
        structural(ops),
        vec![
            HostOp::Append {
                parent: ul,
                child: before[0]
            },
            HostOp::Append {
                parent: ul,
                child: before[1]
            },
        ]
    );
}

#[test]
fn moving_a_node_forward_inserts_before_its_new_sibling() {
    let mut renderer = TestRenderer::new();
    renderer.render(list(&["a", "b", "c"])).expect("mount");
    let ul = renderer.container_children()[0];
    let before = renderer.host().children(ul).to_vec();
    renderer.host_mut().take_ops();

    renderer.render(list(&["b", "a", "c"])).expect("swap");

    assert_eq!(renderer.markup(), "<ul><li>b</li><li>a</li><li>c</li></ul>");
    assert_eq!(
        structural(renderer.host_mut().take_ops()),
        vec![HostOp::InsertBefore {
            parent: ul,
            child: before[0],
            before: before[2],
        }]
    );
}

#[test]
fn removed_keys_are_deleted_and_new_keys_inserted() {
    let mut renderer = TestRenderer::new();
    renderer.render(list(&["a", "b", "c"])).expect("mount");
    let ul = renderer.container_children()[0];
    let before = renderer.host().children(ul).to_vec();
    renderer.host_mut().take_ops();

    renderer.render(list(&["a", "d", "c"])).expect("update");

    assert_eq!(renderer.markup(), "<ul><li>a</li><li>d</li><li>c</li></ul>");
    let children = renderer.host().children(ul).to_vec();
    assert_eq!(children[0], before[0]);
    assert_eq!(children[2], before[2]);
    assert!(!before.contains(&children[1]));

    let ops = structural(renderer.host_mut().take_ops());
    assert!(ops.contains(&HostOp::Remove {
        parent: ul,
        child: before[1]
    }));
    assert!(ops.contains(&HostOp::InsertBefore {
        parent: ul,
        child: children[1],
        before: before[2],
    }));
}

#[test]
fn changing_the_element_type_replaces_the_node() {
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::host("div").child(Element::host("b").child("x")))
        .expect("mount");
    let div = renderer.container_children()[0];
    let old = renderer.host().children(div)[0];

    renderer
        .render(Element::host("div").child(Element::host("i").child("x")))
        .expect("update");

    assert_eq!(renderer.markup(), "<div><i>x</i></div>");
    let new = renderer.host().children(div)[0];
    assert_ne!(new, old);
    assert_eq!(renderer.host().parent(old), None);
}

#[test]
fn unmounting_empties_the_container() {
    let mut renderer = TestRenderer::new();
    renderer.render(list(&["a", "b"])).expect("mount");
    assert!(!renderer.reconciler().fibers().is_empty());

    renderer.unmount().expect("unmount");

    assert_eq!(renderer.markup(), "");
    assert!(renderer.container_children().is_empty());
    assert!(!renderer.reconciler().has_pending_work());
}

#[test]
fn committed_trees_do_not_leak_fibers() {
    let mut renderer = TestRenderer::new();
    renderer.render(list(&["a", "b", "c"])).expect("mount");
    renderer.render(list(&["c", "b", "a"])).expect("update");
    let settled = renderer.reconciler().fibers().len();

    for _ in 0..5 {
        renderer.render(list(&["a", "b", "c"])).expect("update");
        renderer.render(list(&["c", "b", "a"])).expect("update");
    }
    assert_eq!(renderer.reconciler().fibers().len(), settled);
}

/// Renders `<div>` around `inner` when it has one, a bare `<p>` otherwise.
struct Layer {
    name: &'static str,
    inner: Option<Rc<ComponentClass>>,
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Component for Layer {
    fn render(&self, _this: &Instance) -> Result<Node, HookError> {
        Ok(match &self.inner {
            Some(inner) => Element::host("div").child(Element::class(inner)).into(),
            None => Element::host("p").into(),
        })
    }

    fn will_unmount(&mut self, _this: &Instance) -> HookResult {
        self.log.borrow_mut().push(self.name);
        Ok(())
    }
}

fn layer(
    name: &'static str,
    inner: Option<Rc<ComponentClass>>,
    log: &Rc<RefCell<Vec<&'static str>>>,
) -> Rc<ComponentClass> {
    let log = Rc::clone(log);
    Rc::new(ComponentClass::new(name, move |_, _| Layer {
        name,
        inner: inner.clone(),
        log: Rc::clone(&log),
    }))
}

#[test]
fn deleting_a_subtree_unmounts_parents_first_and_detaches_only_its_root() {
    let log = Rc::default();
    let inner = layer("B", None, &log);
    let outer = layer("A", Some(inner), &log);
    let mut renderer = TestRenderer::new();
    renderer
        .render(
            Element::host("main").child(
                Element::host("section")
                    .key("s")
                    .child(Element::class(&outer)),
            ),
        )
        .expect("mount");
    assert_eq!(
        renderer.markup(),
        "<main><section><div><p></p></div></section></main>"
    );
    let main = renderer.container_children()[0];
    let section = renderer.host().children(main)[0];
    renderer.host_mut().take_ops();

    renderer.render(Element::host("main")).expect("delete");

    assert_eq!(*log.borrow(), ["A", "B"]);
    assert_eq!(
        structural(renderer.host_mut().take_ops()),
        [HostOp::Remove {
            parent: main,
            child: section
        }]
    );
    assert_eq!(renderer.markup(), "<main></main>");
}
