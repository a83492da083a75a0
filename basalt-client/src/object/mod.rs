//! The record model: class-scoped records with dirty tracking, pointers,
//! and access-control lists.

pub mod acl;
pub mod pointer;
pub mod record;
pub mod session;

pub use acl::{Acl, PUBLIC, Permission};
pub use pointer::{GeoPoint, Pointer, decode_date, encode_date};
pub use record::{FieldChange, Record};
pub use session::{IntoSessionToken, Session, User};
