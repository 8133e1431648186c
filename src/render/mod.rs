pub(crate) mod camera;
pub(crate) mod post;
pub(crate) mod stage;
pub(crate) mod target;
