//! Store access for cantina-sync
//!
//! Schema is created by `cantina_common::db::init`. Functions here take a
//! `&SqlitePool` and return `cantina_common::Result`.

pub mod images;
pub mod menus;
pub mod surveillance;
