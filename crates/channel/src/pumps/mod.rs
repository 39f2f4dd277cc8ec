pub(crate) mod dispatch;
pub(crate) mod read;
pub(crate) mod write;
