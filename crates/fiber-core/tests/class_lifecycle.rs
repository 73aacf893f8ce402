use std::cell::RefCell;
use std::rc::Rc;

use fiber_core::{
    Component, ComponentClass, ComponentHandle, ConfigError, Context, Element, HookResult, Instance, Node,
    Object, Props, ReconcileError, State, Value,
};
use fiber_testing::TestRenderer;

type Log = Rc<RefCell<Vec<String>>>;
type Slot = Rc<RefCell<Option<ComponentHandle>>>;

fn take(log: &Log) -> Vec<String> {
    std::mem::take(&mut *log.borrow_mut())
}

struct Counter {
    log: Log,
    gate: Option<bool>,
}

impl Counter {
    fn record(&self, event: &str) {
        self.log.borrow_mut().push(event.to_owned());
    }
}

impl Component for Counter {
    fn initial_state(&self) -> Option<Value> {
        Some(Object::new().with("count", 0).into())
    }

    fn render(&self, this: &Instance) -> Result<Node, fiber_core::HookError> {
        self.record("render");
        let count = this.state_value("count").and_then(Value::as_int).unwrap_or_default();
        let label = this.props().get("label").and_then(Value::as_str).unwrap_or("count");
        Ok(Element::host("span").child(format!("{label}:{count}")).into())
    }

    fn should_update(
        &self,
        _this: &Instance,
        _next_props: &Rc<Props>,
        _next_state: Option<&State>,
        _next_context: &Context,
    ) -> Option<bool> {
        self.gate
    }

    fn will_mount(&mut self, _this: &Instance) -> HookResult {
        self.record("will_mount");
        Ok(())
    }

    fn did_mount(&mut self, _this: &Instance) -> HookResult {
        self.record("did_mount");
        Ok(())
    }

    fn will_receive_props(&mut self, _this: &Instance, _next_props: &Rc<Props>, _next_context: &Context) -> HookResult {
        self.record("will_receive_props");
        Ok(())
    }

    fn will_update(
        &mut self,
        _this: &Instance,
        _next_props: &Rc<Props>,
        _next_state: Option<&State>,
        _next_context: &Context,
    ) -> HookResult {
        self.record("will_update");
        Ok(())
    }

    fn did_update(&mut self, this: &Instance, prev_props: &Rc<Props>, _prev_state: Option<&State>) -> HookResult {
        let before = prev_props.get("label").and_then(Value::as_str).unwrap_or("count");
        let after = this.props().get("label").and_then(Value::as_str).unwrap_or("count");
        self.record(&format!("did_update {before}->{after}"));
        Ok(())
    }

    fn will_unmount(&mut self, _this: &Instance) -> HookResult {
        self.record("will_unmount");
        Ok(())
    }
}

fn counter_class(log: &Log, gate: Option<bool>) -> Rc<ComponentClass> {
    let log = Rc::clone(log);
    Rc::new(ComponentClass::new("Counter", move |_, _| Counter {
        log: Rc::clone(&log),
        gate,
    }))
}

fn capture(slot: &Slot) -> impl Fn(Option<fiber_core::RefTarget>) + 'static {
    let slot = Rc::clone(slot);
    move |target| *slot.borrow_mut() = target.and_then(|target| target.as_component().cloned())
}

fn handle(slot: &Slot) -> ComponentHandle {
    slot.borrow().clone().expect("ref attached")
}

#[test]
fn lifecycle_hooks_run_in_order() {
    let log = Log::default();
    let class = counter_class(&log, None);
    let mut renderer = TestRenderer::new();

    renderer.render(Element::class(&class).attr("label", "a")).expect("mount");
    assert_eq!(take(&log), ["will_mount", "render", "did_mount"]);
    assert_eq!(renderer.markup(), "<span>a:0</span>");

    renderer.render(Element::class(&class).attr("label", "b")).expect("update");
    assert_eq!(take(&log), ["will_receive_props", "will_update", "render", "did_update a->b"]);
    assert_eq!(renderer.markup(), "<span>b:0</span>");

    renderer.unmount().expect("unmount");
    assert_eq!(take(&log), ["will_unmount"]);
    assert_eq!(renderer.markup(), "");
}

#[test]
fn set_state_rerenders_after_a_flush() {
    let log = Log::default();
    let class = counter_class(&log, None);
    let slot = Slot::default();
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::class(&class).with_ref(capture(&slot)))
        .expect("mount");
    take(&log);

    let counter = handle(&slot);
    counter.set_state(Object::new().with("count", 1));
    counter.set_state(Object::new().with("count", 2));
    assert_eq!(renderer.markup(), "<span>count:0</span>");
    assert!(renderer.reconciler().has_pending_work());

    renderer.flush_sync().expect("flush");

    assert_eq!(renderer.markup(), "<span>count:2</span>");
    assert_eq!(take(&log), ["will_update", "render", "did_update count->count"]);
    assert_eq!(
        counter.state().and_then(|state| state.get("count").and_then(Value::as_int)),
        Some(2)
    );
}

#[test]
fn state_updaters_see_the_previous_result() {
    let log = Log::default();
    let class = counter_class(&log, None);
    let slot = Slot::default();
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::class(&class).with_ref(capture(&slot)))
        .expect("mount");

    let counter = handle(&slot);
    for _ in 0..3 {
        counter.instance().set_state_with(|state, _props| {
            let count = state.get("count").and_then(Value::as_int).unwrap_or_default();
            Object::new().with("count", count + 1)
        });
    }
    renderer.flush_sync().expect("flush");
    assert_eq!(renderer.markup(), "<span>count:3</span>");
}

#[test]
fn callbacks_run_after_the_update_commits() {
    let log = Log::default();
    let class = counter_class(&log, None);
    let slot = Slot::default();
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::class(&class).with_ref(capture(&slot)))
        .expect("mount");
    take(&log);

    let counter = handle(&slot);
    let callback_log = Rc::clone(&log);
    counter
        .instance()
        .set_state_then(Object::new().with("count", 5), move || {
            callback_log.borrow_mut().push("callback".to_owned());
            Ok(())
        });
    renderer.flush_sync().expect("flush");

    assert_eq!(
        take(&log),
        ["will_update", "render", "did_update count->count", "callback"]
    );
    assert_eq!(renderer.markup(), "<span>count:5</span>");
}

#[test]
fn root_callbacks_run_once_the_tree_is_committed() {
    let log = Log::default();
    let class = counter_class(&log, None);
    let mut renderer = TestRenderer::new();
    let callback_log = Rc::clone(&log);
    renderer
        .render_with_callback(
            Element::class(&class),
            Some(Box::new(move || -> HookResult {
                callback_log.borrow_mut().push("root callback".to_owned());
                Ok(())
            })),
        )
        .expect("mount");

    assert_eq!(take(&log), ["will_mount", "render", "did_mount", "root callback"]);
}

#[test]
fn negative_should_update_skips_render_but_keeps_state() {
    let log = Log::default();
    let class = counter_class(&log, Some(false));
    let slot = Slot::default();
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::class(&class).with_ref(capture(&slot)))
        .expect("mount");
    take(&log);

    let counter = handle(&slot);
    counter.set_state(Object::new().with("count", 7));
    renderer.flush_sync().expect("flush");

    assert!(take(&log).is_empty());
    assert_eq!(renderer.markup(), "<span>count:0</span>");
    assert_eq!(
        counter.state().and_then(|state| state.get("count").and_then(Value::as_int)),
        Some(7)
    );

    counter.force_update();
    renderer.flush_sync().expect("flush");
    assert_eq!(take(&log), ["will_update", "render", "did_update count->count"]);
    assert_eq!(renderer.markup(), "<span>count:7</span>");
}

#[test]
fn pure_components_skip_equal_props() {
    let renders = Rc::new(RefCell::new(0));
    let counted = Rc::clone(&renders);
    struct Label {
        renders: Rc<RefCell<usize>>,
    }
    impl Component for Label {
        fn render(&self, this: &Instance) -> Result<Node, fiber_core::HookError> {
            *self.renders.borrow_mut() += 1;
            let text = this.props().get("text").and_then(Value::as_str).unwrap_or_default();
            Ok(Node::text(text))
        }
    }
    let class = Rc::new(
        ComponentClass::new("Label", move |_, _| Label {
            renders: Rc::clone(&counted),
        })
        .pure(),
    );
    let mut renderer = TestRenderer::new();

    renderer.render(Element::class(&class).attr("text", "hi")).expect("mount");
    renderer.render(Element::class(&class).attr("text", "hi")).expect("same props");
    assert_eq!(*renders.borrow(), 1);

    renderer.render(Element::class(&class).attr("text", "bye")).expect("new props");
    assert_eq!(*renders.borrow(), 2);
    assert_eq!(renderer.markup(), "bye");
}

#[test]
fn replace_state_drops_previous_keys() {
    let log = Log::default();
    let class = counter_class(&log, None);
    let slot = Slot::default();
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::class(&class).with_ref(capture(&slot)))
        .expect("mount");

    let counter = handle(&slot);
    counter.instance().replace_state(Object::new().with("other", true));
    renderer.flush_sync().expect("flush");

    let state = counter.state().expect("state");
    assert!(!state.contains_key("count"));
    assert_eq!(state.get("other").and_then(Value::as_bool), Some(true));
    assert_eq!(renderer.markup(), "<span>count:0</span>");
}

#[test]
fn state_set_during_will_mount_is_rendered_first_time() {
    struct Eager;
    impl Component for Eager {
        fn will_mount(&mut self, this: &Instance) -> HookResult {
            this.set_state(Object::new().with("ready", true));
            Ok(())
        }

        fn render(&self, this: &Instance) -> Result<Node, fiber_core::HookError> {
            let ready = this.state_value("ready").and_then(Value::as_bool).unwrap_or(false);
            Ok(Node::text(if ready { "ready" } else { "waiting" }))
        }
    }
    let class = Rc::new(ComponentClass::new("Eager", |_, _| Eager));
    let mut renderer = TestRenderer::new();
    renderer.render(Element::class(&class)).expect("mount");

    assert_eq!(renderer.markup(), "ready");
    assert!(!renderer.reconciler().has_pending_work());
}

#[test]
fn state_set_during_did_mount_renders_again_before_returning() {
    struct Loader {
        renders: Log,
    }
    impl Component for Loader {
        fn did_mount(&mut self, this: &Instance) -> HookResult {
            this.set_state(Object::new().with("loaded", true));
            Ok(())
        }

        fn render(&self, this: &Instance) -> Result<Node, fiber_core::HookError> {
            let loaded = this.state_value("loaded").and_then(Value::as_bool).unwrap_or(false);
            let text = if loaded { "loaded" } else { "loading" };
            self.renders.borrow_mut().push(text.to_owned());
            Ok(Node::text(text))
        }
    }
    let log = Log::default();
    let renders = Rc::clone(&log);
    let class = Rc::new(ComponentClass::new("Loader", move |_, _| Loader {
        renders: Rc::clone(&renders),
    }));
    let mut renderer = TestRenderer::new();
    renderer.render(Element::class(&class)).expect("mount");

    assert_eq!(take(&log), ["loading", "loaded"]);
    assert_eq!(renderer.markup(), "loaded");
}

#[test]
fn component_refs_follow_the_instance() {
    let log = Log::default();
    let class = counter_class(&log, None);
    let slot = Slot::default();
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::class(&class).with_ref(capture(&slot)))
        .expect("mount");
    let first = handle(&slot);

    renderer
        .render(Element::class(&class).with_ref(capture(&slot)))
        .expect("update");
    assert!(handle(&slot).ptr_eq(&first));
    assert!(first.with_component(|counter: &Counter| counter.gate.is_none()).unwrap_or(false));

    renderer.render(Node::Empty).expect("clear");
    assert!(slot.borrow().is_none());
}

#[test]
fn handles_downcast_to_the_concrete_component() {
    let log = Log::default();
    let class = counter_class(&log, Some(true));
    let slot = Slot::default();
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::class(&class).with_ref(capture(&slot)))
        .expect("mount");
    let handle = handle(&slot);

    assert_eq!(handle.with_component(|counter: &Counter| counter.gate), Some(Some(true)));
    assert_eq!(handle.with_component(|_: &Marker| ()), None);
}

struct Marker;

impl Component for Marker {
    fn render(&self, _this: &Instance) -> Result<Node, fiber_core::HookError> {
        Ok(Node::Empty)
    }
}

#[test]
fn host_refs_receive_the_node() {
    let seen: Rc<RefCell<Vec<Option<usize>>>> = Rc::default();
    let record = Rc::clone(&seen);
    let shared: fiber_core::Ref = Rc::new(move |target: Option<fiber_core::RefTarget>| {
        record
            .borrow_mut()
            .push(target.and_then(|target| target.downcast_host::<usize>().copied()));
    });
    let mut renderer = TestRenderer::new();
    renderer
        .render(Element::host("input").shared_ref(&shared))
        .expect("mount");
    let node = renderer.container_children()[0];
    assert_eq!(*seen.borrow(), vec![Some(node)]);

    renderer
        .render(Element::host("input").attr("value", "x").shared_ref(&shared))
        .expect("update");
    assert_eq!(seen.borrow().len(), 1, "an unchanged ref is not re-attached");

    renderer.unmount().expect("unmount");
    assert_eq!(*seen.borrow(), vec![Some(node), None]);
}

#[test]
fn non_map_initial_state_is_rejected() {
    struct Broken;
    impl Component for Broken {
        fn initial_state(&self) -> Option<Value> {
            Some(Value::Int(3))
        }

        fn render(&self, _this: &Instance) -> Result<Node, fiber_core::HookError> {
            Ok(Node::Empty)
        }
    }
    let class = Rc::new(ComponentClass::new("Broken", |_, _| Broken));
    let mut renderer = TestRenderer::new();
    let err = renderer.render(Element::class(&class)).expect_err("invalid state");
    assert!(matches!(
        err,
        ReconcileError::Config(ConfigError::InvalidState { ref component }) if &**component == "Broken"
    ));
    assert_eq!(renderer.markup(), "");
}
