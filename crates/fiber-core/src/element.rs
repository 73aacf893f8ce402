//! Immutable descriptions of the desired tree produced by render functions.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::component::{ComponentClass, ComponentHandle, FunctionComponent};
use crate::fiber::FiberId;
use crate::value::{Object, Value};

pub type Key = Rc<str>;

/// Callback receiving the public instance on attach and `None` on detach.
pub type Ref = Rc<dyn Fn(Option<RefTarget>)>;

/// Handler invoked with the coroutine props and the collected yield values.
pub type CoroutineHandler = Rc<dyn Fn(&Object, &[Value]) -> Node>;

#[derive(Clone)]
pub enum RefTarget {
    Component(ComponentHandle),
    Host(Rc<dyn Any>),
}

impl RefTarget {
    pub fn as_component(&self) -> Option<&ComponentHandle> {
        match self {
            RefTarget::Component(handle) => Some(handle),
            RefTarget::Host(_) => None,
        }
    }

    pub fn downcast_host<T: Any>(&self) -> Option<&T> {
        match self {
            RefTarget::Host(node) => node.downcast_ref::<T>(),
            RefTarget::Component(_) => None,
        }
    }
}

impl fmt::Debug for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefTarget::Component(handle) => f.debug_tuple("Component").field(handle).finish(),
            RefTarget::Host(_) => f.write_str("Host(..)"),
        }
    }
}

pub(crate) fn same_ref(a: Option<&Ref>, b: Option<&Ref>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
        _ => false,
    }
}

/// A node of the element tree. A top level `Fragment` is a plain child list;
/// a `Fragment` nested inside a list becomes its own fiber.
#[derive(Clone, Default)]
pub enum Node {
    #[default]
    Empty,
    Text(Rc<str>),
    Element(Element),
    Fragment(Rc<[Node]>),
    Coroutine(Rc<Coroutine>),
    Yield(Rc<Yield>),
}

impl Node {
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        Node::Text(text.into())
    }

    pub fn fragment(nodes: impl IntoIterator<Item = Node>) -> Self {
        Node::Fragment(nodes.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Node::Empty)
    }

    pub(crate) fn shallow_eq(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::Empty, Node::Empty) => true,
            (Node::Text(a), Node::Text(b)) => a == b,
            (Node::Element(a), Node::Element(b)) => {
                Rc::ptr_eq(&a.props, &b.props) && a.key == b.key && a.ty.same_type(&b.ty)
            }
            (Node::Fragment(a), Node::Fragment(b)) => Rc::ptr_eq(a, b),
            (Node::Coroutine(a), Node::Coroutine(b)) => Rc::ptr_eq(a, b),
            (Node::Yield(a), Node::Yield(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Empty => f.write_str("Empty"),
            Node::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Node::Element(element) => fmt::Debug::fmt(element, f),
            Node::Fragment(nodes) => f.debug_list().entries(nodes.iter()).finish(),
            Node::Coroutine(coroutine) => f
                .debug_struct("Coroutine")
                .field("key", &coroutine.key)
                .field("children", &coroutine.children)
                .finish(),
            Node::Yield(yielded) => f
                .debug_struct("Yield")
                .field("key", &yielded.key)
                .field("value", &yielded.value)
                .finish(),
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<ElementBuilder> for Node {
    fn from(builder: ElementBuilder) -> Self {
        Node::Element(builder.build())
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(Rc::from(text))
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(Rc::from(text))
    }
}

impl From<Vec<Node>> for Node {
    fn from(nodes: Vec<Node>) -> Self {
        Node::Fragment(Rc::from(nodes))
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(node: Option<T>) -> Self {
        node.map(Into::into).unwrap_or_default()
    }
}

#[derive(Clone)]
pub enum ElementType {
    Host(Rc<str>),
    Class(Rc<ComponentClass>),
    Function(Rc<FunctionComponent>),
    /// A fiber handed back as-is, resuming a previously created subtree.
    Continuation(FiberId),
}

impl ElementType {
    pub fn same_type(&self, other: &ElementType) -> bool {
        match (self, other) {
            (ElementType::Host(a), ElementType::Host(b)) => a == b,
            (ElementType::Class(a), ElementType::Class(b)) => Rc::ptr_eq(a, b),
            (ElementType::Function(a), ElementType::Function(b)) => Rc::ptr_eq(a, b),
            (ElementType::Continuation(a), ElementType::Continuation(b)) => a == b,
            _ => false,
        }
    }

    pub fn name(&self) -> Rc<str> {
        match self {
            ElementType::Host(tag) => Rc::clone(tag),
            ElementType::Class(class) => Rc::clone(class.name()),
            ElementType::Function(function) => Rc::clone(function.name()),
            ElementType::Continuation(_) => Rc::from("Continuation"),
        }
    }
}

impl fmt::Debug for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Continuation(fiber) => write!(f, "Continuation({fiber:?})"),
            other => f.write_str(&other.name()),
        }
    }
}

/// Props as seen by components and hosts: attributes plus the child description.
#[derive(Clone, Default)]
pub struct Props {
    attrs: Object,
    children: Node,
}

impl Props {
    pub fn new(attrs: Object, children: Node) -> Self {
        Self { attrs, children }
    }

    pub fn attrs(&self) -> &Object {
        &self.attrs
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn children(&self) -> &Node {
        &self.children
    }

    pub fn shallow_eq(&self, other: &Props) -> bool {
        self.attrs.shallow_eq(&other.attrs) && self.children.shallow_eq(&other.children)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("attrs", &self.attrs)
            .field("children", &self.children)
            .finish()
    }
}

#[derive(Clone)]
pub struct Element {
    pub(crate) ty: ElementType,
    pub(crate) key: Option<Key>,
    pub(crate) ref_: Option<Ref>,
    pub(crate) props: Rc<Props>,
}

impl Element {
    pub fn host(tag: impl Into<Rc<str>>) -> ElementBuilder {
        ElementBuilder::new(ElementType::Host(tag.into()))
    }

    pub fn class(class: &Rc<ComponentClass>) -> ElementBuilder {
        ElementBuilder::new(ElementType::Class(Rc::clone(class)))
    }

    pub fn function(function: &Rc<FunctionComponent>) -> ElementBuilder {
        ElementBuilder::new(ElementType::Function(Rc::clone(function)))
    }

    pub fn continuation(fiber: FiberId) -> Element {
        ElementBuilder::new(ElementType::Continuation(fiber)).build()
    }

    /// Builds an element around an already shared props allocation so
    /// repeated renders can hand out the identical props.
    pub fn with_props(ty: ElementType, key: Option<Key>, props: Rc<Props>) -> Element {
        Element {
            ty,
            key,
            ref_: None,
            props,
        }
    }

    pub fn ty(&self) -> &ElementType {
        &self.ty
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn props(&self) -> &Rc<Props> {
        &self.props
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("ty", &self.ty)
            .field("key", &self.key)
            .field("props", &self.props)
            .finish()
    }
}

pub struct ElementBuilder {
    ty: ElementType,
    key: Option<Key>,
    ref_: Option<Ref>,
    attrs: Object,
    children: Vec<Node>,
}

impl ElementBuilder {
    fn new(ty: ElementType) -> Self {
        Self {
            ty,
            key: None,
            ref_: None,
            attrs: Object::new(),
            children: Vec::new(),
        }
    }

    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: impl Into<Rc<str>>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name, value);
        self
    }

    pub fn attrs(mut self, attrs: Object) -> Self {
        self.attrs.assign(&attrs);
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_ref(mut self, callback: impl Fn(Option<RefTarget>) + 'static) -> Self {
        self.ref_ = Some(Rc::new(callback));
        self
    }

    pub fn shared_ref(mut self, callback: &Ref) -> Self {
        self.ref_ = Some(Rc::clone(callback));
        self
    }

    pub fn build(self) -> Element {
        let mut children = self.children;
        let children = match children.len() {
            0 => Node::Empty,
            1 => children.pop().unwrap_or_default(),
            _ => Node::Fragment(Rc::from(children)),
        };
        Element {
            ty: self.ty,
            key: self.key,
            ref_: self.ref_,
            props: Rc::new(Props::new(self.attrs, children)),
        }
    }
}

/// Two-phase node: the yields found among `children` are handed to `handler`,
/// whose output becomes the host-visible subtree.
pub struct Coroutine {
    pub(crate) key: Option<Key>,
    pub(crate) children: Node,
    pub(crate) handler: CoroutineHandler,
    pub(crate) props: Object,
}

impl Coroutine {
    pub fn new(
        children: impl Into<Node>,
        props: Object,
        handler: impl Fn(&Object, &[Value]) -> Node + 'static,
    ) -> Self {
        Self {
            key: None,
            children: children.into(),
            handler: Rc::new(handler),
            props,
        }
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl From<Coroutine> for Node {
    fn from(coroutine: Coroutine) -> Self {
        Node::Coroutine(Rc::new(coroutine))
    }
}

pub struct Yield {
    pub(crate) key: Option<Key>,
    pub(crate) value: Value,
}

impl Yield {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            key: None,
            value: value.into(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl From<Yield> for Node {
    fn from(yielded: Yield) -> Self {
        Node::Yield(Rc::new(yielded))
    }
}
