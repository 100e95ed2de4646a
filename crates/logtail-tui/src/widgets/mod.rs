pub mod channel_picker;
pub mod log_view;
