//! Component kinds shipped with viewkit

pub mod sample_button;

pub use sample_button::SampleButton;
