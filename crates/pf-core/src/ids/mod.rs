//! ID type wrappers for type safety.

mod id_macro;

pub mod entity_id;
pub mod slot_key;

pub use entity_id::{EntityId, PLACEHOLDER_ID_PREFIX};
pub use slot_key::SlotKey;
