//! Core value types shared between the lightbox cache and its consumers.
//!
//! Everything here is a plain value: structural equality, cheap to clone,
//! no I/O. The expensive machinery (store, renderer, coordination) lives in
//! `lightbox-core`.

pub mod key;
pub mod orientation;
pub mod source;

pub use key::DerivativeKey;
pub use orientation::Orientation;
pub use source::SourceId;
