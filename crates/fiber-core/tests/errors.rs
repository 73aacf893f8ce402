use std::cell::RefCell;
use std::rc::Rc;

use fiber_core::{
    Component, ComponentClass, Element, FunctionComponent, HookError, HookResult, Instance, Node, ReconcileError,
};
use fiber_testing::TestRenderer;

struct Fragile {
    fail_mount: bool,
    fail_unmount: bool,
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Component for Fragile {
    fn render(&self, _this: &Instance) -> Result<Node, HookError> {
        Ok(Element::host("p").child("fragile").into())
    }

    fn did_mount(&mut self, _this: &Instance) -> HookResult {
        self.log.borrow_mut().push("did_mount");
        if self.fail_mount {
            return Err("mount failed".into());
        }
        Ok(())
    }

    fn will_unmount(&mut self, _this: &Instance) -> HookResult {
        self.log.borrow_mut().push("will_unmount");
        if self.fail_unmount {
            return Err("unmount failed".into());
        }
        Ok(())
    }
}

fn fragile(name: &str, fail_mount: bool, fail_unmount: bool, log: &Rc<RefCell<Vec<&'static str>>>) -> Rc<ComponentClass> {
    let log = Rc::clone(log);
    Rc::new(ComponentClass::new(name, move |_, _| Fragile {
        fail_mount,
        fail_unmount,
        log: Rc::clone(&log),
    }))
}

#[test]
fn lifecycle_failures_are_reported_without_aborting_the_commit() {
    let log = Rc::default();
    let broken = fragile("Broken", true, false, &log);
    let healthy = fragile("Healthy", false, false, &log);
    let mut renderer = TestRenderer::new();

    renderer
        .render(
            Element::host("main")
                .child(Element::class(&broken))
                .child(Element::class(&healthy)),
        )
        .expect("commit completes");

    assert_eq!(*log.borrow(), ["did_mount", "did_mount"]);
    assert_eq!(renderer.markup(), "<main><p>fragile</p><p>fragile</p></main>");
    let errors = renderer.take_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].component.as_deref(), Some("Broken"));
    assert!(!errors[0].during_unmount);
    assert_eq!(errors[0].error.to_string(), "mount failed");
}

#[test]
fn unmount_failures_do_not_stop_the_removal() {
    let log = Rc::default();
    let broken = fragile("Broken", false, true, &log);
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::host("main").child(Element::class(&broken)))
        .expect("mount");

    renderer.render(Element::host("main")).expect("update");

    assert_eq!(renderer.markup(), "<main></main>");
    let errors = renderer.take_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].during_unmount);
    assert_eq!(*log.borrow(), ["did_mount", "will_unmount"]);
}

#[test]
fn failing_callbacks_are_reported() {
    let mut renderer = TestRenderer::new();
    renderer
        .render_with_callback(
            Element::host("div"),
            Some(Box::new(|| -> HookResult { Err("callback failed".into()) })),
        )
        .expect("commit completes");
    assert_eq!(renderer.markup(), "<div></div>");
    let errors = renderer.take_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error.to_string(), "callback failed");
}

#[test]
fn render_failures_abort_the_pass_and_leave_the_tree_intact() {
    let bad = Rc::new(FunctionComponent::new("Bad", |_props, _context| Err("no luck".into())));
    let mut renderer = TestRenderer::new();
    renderer.render(Element::host("div").child("before")).expect("mount");

    let err = renderer
        .render(Element::host("div").child(Element::function(&bad)))
        .expect_err("render fails");
    assert!(matches!(err, ReconcileError::Render { ref component, .. } if &**component == "Bad"));
    assert_eq!(renderer.markup(), "<div>before</div>");
    assert!(!renderer.reconciler().has_pending_work());

    renderer.render(Element::host("div").child("after")).expect("recovers");
    assert_eq!(renderer.markup(), "<div>after</div>");
}
