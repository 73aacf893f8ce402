//! Testing utilities and harness for the fiber reconciler.

pub mod harness;
pub mod host;
pub mod scheduler;

pub use harness::TestRenderer;
pub use host::{HostOp, MemContainer, MemoryHost, MemoryNode, NodeId};
pub use scheduler::{TestScheduler, UnitDeadline};

pub mod prelude {
    pub use crate::harness::TestRenderer;
    pub use crate::host::{HostOp, MemContainer, MemoryHost, MemoryNode, NodeId};
    pub use crate::scheduler::{TestScheduler, UnitDeadline};
}
