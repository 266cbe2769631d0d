pub mod mate_label;
pub(crate) mod whichever;
