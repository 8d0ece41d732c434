//! Core infrastructure shared by all node behaviors.

use std::sync::Arc;

use crate::reasoning::ReasoningGateway;

/// Shared dependencies composed into each node behavior.
///
/// Behaviors are otherwise stateless: everything investigation-specific
/// lives in the agent state they receive and return.
#[derive(Clone)]
pub struct AgentCore {
    gateway: Arc<ReasoningGateway>,
}

impl AgentCore {
    /// Create a core around the reasoning gateway.
    pub fn new(gateway: Arc<ReasoningGateway>) -> Self {
        Self { gateway }
    }

    /// Get a reference to the reasoning gateway.
    #[inline]
    pub fn gateway(&self) -> &ReasoningGateway {
        &self.gateway
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_core_is_clone_send_sync() {
        fn assert_clone<T: Clone>() {}
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_clone::<AgentCore>();
        assert_send::<AgentCore>();
        assert_sync::<AgentCore>();
    }
}
