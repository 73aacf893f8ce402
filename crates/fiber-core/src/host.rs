//! Contract between the reconciler and the environment that owns the
//! physical nodes (a DOM, a widget toolkit, an in-memory test double).
//!
//! Host operations are infallible from the reconciler's point of view.

use crate::element::Props;
use crate::fiber::FiberId;

pub trait HostConfig {
    /// Handle to an element or text node created by the host.
    type HostNode: Clone + 'static;
    /// The root container a tree is mounted into.
    type Container;

    /// Creates an element node. `children` are the already created host
    /// nodes of the subtree, in order, and must be appended by the host.
    fn create_instance(
        &mut self,
        ty: &str,
        props: &Props,
        children: &[Self::HostNode],
        fiber: FiberId,
    ) -> Self::HostNode;

    fn create_text_instance(&mut self, text: &str, fiber: FiberId) -> Self::HostNode;

    /// Returns whether `commit_update` should run for this props change.
    fn prepare_update(&mut self, node: &Self::HostNode, old_props: &Props, new_props: &Props) -> bool;

    fn commit_update(&mut self, node: &Self::HostNode, old_props: &Props, new_props: &Props);

    fn commit_text_update(&mut self, node: &Self::HostNode, old_text: &str, new_text: &str);

    fn append_child(&mut self, parent: &Self::HostNode, child: &Self::HostNode);

    fn insert_before(
        &mut self,
        parent: &Self::HostNode,
        child: &Self::HostNode,
        before: &Self::HostNode,
    );

    fn remove_child(&mut self, parent: &Self::HostNode, child: &Self::HostNode);

    /// Replaces the top level content of `container` with `children`.
    fn update_container(&mut self, container: &mut Self::Container, children: &[Self::HostNode]);
}
