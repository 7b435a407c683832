pub mod access;
pub mod config_item;
pub mod permission;
pub mod permission_row;
pub mod php_value;
pub mod role;
pub mod site_preferences;

#[allow(unused_imports)]
pub mod prelude {
    pub use super::config_item::{self, Entity as ConfigItem};
    pub use super::permission_row::{self, Entity as PermissionRow};
    pub use super::role::{self, Entity as Role};
}
