//! Filesystem persistence for VJMix shader documents.
//!
//! Each record lives in `<root>/<id>.json`. [`StoreSession`] adapts the store
//! to the preview engine's [`preview::Persist`] seam so the editor can save
//! without knowing where documents go.

mod record;
mod session;
mod store;

pub use record::{
    generate_id, is_valid_id, NewShader, ShaderRecord, DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS,
    UNTITLED,
};
pub use session::StoreSession;
pub use store::{ShaderStore, StoreError};
