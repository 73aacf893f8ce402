//! Host double for unit tests that never look at host nodes.

use crate::element::Props;
use crate::fiber::FiberId;
use crate::host::HostConfig;

#[derive(Default)]
pub(crate) struct NullHost;

impl HostConfig for NullHost {
    type HostNode = ();
    type Container = ();

    fn create_instance(&mut self, _ty: &str, _props: &Props, _children: &[()], _fiber: FiberId) {}

    fn create_text_instance(&mut self, _text: &str, _fiber: FiberId) {}

    fn prepare_update(&mut self, _node: &(), _old_props: &Props, _new_props: &Props) -> bool {
        false
    }

    fn commit_update(&mut self, _node: &(), _old_props: &Props, _new_props: &Props) {}

    fn commit_text_update(&mut self, _node: &(), _old_text: &str, _new_text: &str) {}

    fn append_child(&mut self, _parent: &(), _child: &()) {}

    fn insert_before(&mut self, _parent: &(), _child: &(), _before: &()) {}

    fn remove_child(&mut self, _parent: &(), _child: &()) {}

    fn update_container(&mut self, _container: &mut (), _children: &[()]) {}
}
