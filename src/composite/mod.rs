pub(crate) mod engine;
pub(crate) mod merge;
pub(crate) mod reduce;
