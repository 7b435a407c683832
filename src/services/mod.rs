pub mod inventory;
pub mod rows;
pub mod schema;
pub mod storage;
pub mod updater;
