use std::cell::Cell;
use std::rc::Rc;

use fiber_core::{
    Component, ComponentClass, ConfigError, Element, FunctionComponent, HookError, Instance, Node, Object,
    ReconcileError, Value,
};
use fiber_testing::TestRenderer;

/// Provides `theme` from its props and renders a fixed child element.
struct ThemeProvider {
    child: Element,
}

impl Component for ThemeProvider {
    fn render(&self, _this: &Instance) -> Result<Node, HookError> {
        Ok(self.child.clone().into())
    }

    fn is_context_provider(&self) -> bool {
        true
    }

    fn child_context(&self, this: &Instance) -> Object {
        let theme = this.props().get("theme").cloned().unwrap_or(Value::Null);
        Object::new().with("theme", theme)
    }
}

fn provider_class(child: &Element) -> Rc<ComponentClass> {
    let child = child.clone();
    Rc::new(
        ComponentClass::new("ThemeProvider", move |_, _| ThemeProvider { child: child.clone() })
            .child_context_types(["theme"]),
    )
}

fn themed_label(renders: &Rc<Cell<usize>>) -> Rc<FunctionComponent> {
    let renders = Rc::clone(renders);
    Rc::new(
        FunctionComponent::new("ThemedLabel", move |_props, context| {
            renders.set(renders.get() + 1);
            let theme = context.get("theme").and_then(Value::as_str).unwrap_or("none");
            Ok(Node::text(theme))
        })
        .context_types(["theme"]),
    )
}

#[test]
fn consumers_read_the_nearest_provider() {
    let renders = Rc::new(Cell::new(0));
    let label = Element::function(&themed_label(&renders)).build();
    let provider = provider_class(&label);
    let mut renderer = TestRenderer::new();

    renderer
        .render(Element::class(&provider).attr("theme", "dark"))
        .expect("mount");
    assert_eq!(renderer.markup(), "dark");
}

#[test]
fn context_changes_reach_consumers_with_identical_props() {
    let renders = Rc::new(Cell::new(0));
    let label = Element::function(&themed_label(&renders)).build();
    let provider = provider_class(&label);
    let mut renderer = TestRenderer::new();

    renderer
        .render(Element::class(&provider).attr("theme", "dark"))
        .expect("mount");
    assert_eq!(renders.get(), 1);

    renderer
        .render(Element::class(&provider).attr("theme", "light"))
        .expect("update");
    assert_eq!(renders.get(), 2);
    assert_eq!(renderer.markup(), "light");
}

#[test]
fn consumers_without_declared_types_see_nothing() {
    let plain = Rc::new(FunctionComponent::new("Plain", |_props, context| {
        Ok(Node::text(if context.is_empty() { "empty" } else { "leaked" }))
    }));
    let child = Element::function(&plain).build();
    let provider = provider_class(&child);
    let mut renderer = TestRenderer::new();

    renderer
        .render(Element::class(&provider).attr("theme", "dark"))
        .expect("mount");
    assert_eq!(renderer.markup(), "empty");
}

#[test]
fn siblings_outside_the_provider_are_unaffected() {
    let renders = Rc::new(Cell::new(0));
    let label_fn = themed_label(&renders);
    let inside = Element::function(&label_fn).build();
    let provider = provider_class(&inside);
    let mut renderer = TestRenderer::new();

    renderer
        .render(
            Element::host("div")
                .child(Element::class(&provider).attr("theme", "dark"))
                .child(Element::function(&label_fn)),
        )
        .expect("mount");
    assert_eq!(renderer.markup(), "<div>darknone</div>");
}

#[test]
fn providers_must_declare_child_context_types() {
    struct Undeclared;
    impl Component for Undeclared {
        fn render(&self, _this: &Instance) -> Result<Node, HookError> {
            Ok(Node::Empty)
        }

        fn is_context_provider(&self) -> bool {
            true
        }
    }
    let class = Rc::new(ComponentClass::new("Undeclared", |_, _| Undeclared));
    let mut renderer = TestRenderer::new();

    let err = renderer.render(Element::class(&class)).expect_err("undeclared provider");
    assert!(matches!(
        err,
        ReconcileError::Config(ConfigError::MissingChildContextTypes { .. })
    ));
}
