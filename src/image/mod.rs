pub(crate) mod partial;
pub(crate) mod raw;
pub(crate) mod wire;
