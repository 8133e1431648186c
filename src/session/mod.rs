pub(crate) mod manager;
pub(crate) mod orchestrator;
pub(crate) mod registry;
