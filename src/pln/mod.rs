//! Signed literals ("PLN").
//!
//! Typed server values travel to the client as opaque, MAC-protected blobs
//! embedded in ordinary JSON (`{"__pln": "<mac>:<payload>"}`) and come back
//! through query strings or form fields.
//!
//! # Data Flow
//! ```text
//! Engine value → codec.rs wrap → response JSON
//!     ... client round trip ...
//! Query / form field → props.rs decode_prop
//!     → JSON walk → codec.rs verify
//!     → Verified(payload) | Json(object) on failure
//! ```

pub mod codec;
pub mod props;

pub use codec::{SignedLiteralCodec, PLN_MARKER};
pub use props::{decode_prop, decode_props, PropValue};
