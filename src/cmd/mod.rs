pub mod align;
pub mod classify;
