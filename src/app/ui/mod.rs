mod controls;
mod details;
pub(in crate::app) mod fps;
mod panels;
