//! Standard node library
//!
//! Domain-neutral nodes for common operations. Anything that talks to a
//! particular market or exchange lives outside this crate and is registered
//! next to these.

mod debug;
mod flow;
mod http;
mod transform;
mod trigger;

pub use debug::DebugNode;
pub use flow::{IfNode, MergeNode};
pub use http::HttpRequestNode;
pub use transform::SetNode;
pub use trigger::{ManualTrigger, TimerTrigger};

use std::sync::Arc;
use wfengine::NodeRegistry;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register_node(Arc::new(ManualTrigger));
    registry.register_node(Arc::new(TimerTrigger));
    registry.register_node(Arc::new(DebugNode));
    registry.register_node(Arc::new(SetNode));
    registry.register_node(Arc::new(IfNode));
    registry.register_node(Arc::new(MergeNode));
    registry.register_node(Arc::new(HttpRequestNode::new()));
}
