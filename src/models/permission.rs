//! Flattening of the legacy per-group permission flags

use std::collections::BTreeSet;

/// Flag value that grants a legacy permission
pub const GRANTED: &str = "y";

/// Every permission flag column carried by the legacy `member_groups` table,
/// in the order they are flattened.
pub const LEGACY_PERMISSIONS: &[&str] = &[
    "can_view_offline_system",
    "can_view_online_system",
    "can_access_cp",
    "can_access_footer_report_bug",
    "can_access_footer_new_ticket",
    "can_access_footer_user_guide",
    "can_view_homepage_news",
    "can_access_files",
    "can_access_design",
    "can_access_addons",
    "can_access_members",
    "can_access_sys_prefs",
    "can_access_comm",
    "can_access_utilities",
    "can_access_data",
    "can_access_logs",
    "can_admin_channels",
    "can_admin_design",
    "can_delete_members",
    "can_admin_mbr_groups",
    "can_admin_mbr_templates",
    "can_ban_users",
    "can_admin_addons",
    "can_edit_categories",
    "can_delete_categories",
    "can_view_other_entries",
    "can_edit_other_entries",
    "can_assign_post_authors",
    "can_delete_self_entries",
    "can_delete_all_entries",
    "can_view_other_comments",
    "can_edit_own_comments",
    "can_delete_own_comments",
    "can_edit_all_comments",
    "can_delete_all_comments",
    "can_moderate_comments",
    "can_send_cached_email",
    "can_email_member_groups",
    "can_email_from_profile",
    "can_view_profiles",
    "can_edit_html_buttons",
    "can_delete_self",
    "can_post_comments",
    "can_search",
    "can_send_private_messages",
    "can_attach_in_private_messages",
    "can_send_bulletins",
    "can_create_entries",
    "can_edit_self_entries",
    "can_upload_new_files",
    "can_edit_files",
    "can_delete_files",
    "can_upload_new_toolsets",
    "can_edit_toolsets",
    "can_delete_toolsets",
    "can_create_upload_directories",
    "can_edit_upload_directories",
    "can_delete_upload_directories",
    "can_create_channels",
    "can_edit_channels",
    "can_delete_channels",
    "can_create_channel_fields",
    "can_edit_channel_fields",
    "can_delete_channel_fields",
    "can_create_statuses",
    "can_delete_statuses",
    "can_edit_statuses",
    "can_create_categories",
    "can_create_member_groups",
    "can_delete_member_groups",
    "can_edit_member_groups",
    "can_create_members",
    "can_edit_members",
    "can_create_new_templates",
    "can_edit_templates",
    "can_delete_templates",
    "can_create_template_groups",
    "can_edit_template_groups",
    "can_delete_template_groups",
    "can_create_template_partials",
    "can_edit_template_partials",
    "can_delete_template_partials",
    "can_create_template_variables",
    "can_delete_template_variables",
    "can_edit_template_variables",
    "can_access_security_settings",
    "can_access_translate",
    "can_access_import",
    "can_access_sql_manager",
    "can_moderate_spam",
    "can_manage_consents",
];

/// Legacy flag names whose permission is stored under a new name
pub const PERMISSION_RENAMES: &[(&str, &str)] = &[
    ("can_admin_mbr_groups", "can_admin_roles"),
    ("can_email_member_groups", "can_email_roles"),
    ("can_create_member_groups", "can_create_roles"),
    ("can_delete_member_groups", "can_delete_roles"),
    ("can_edit_member_groups", "can_edit_roles"),
];

/// Name a legacy flag is stored under after the upgrade
pub fn permission_name(legacy: &str) -> &str {
    PERMISSION_RENAMES
        .iter()
        .find(|(from, _)| *from == legacy)
        .map(|(_, to)| *to)
        .unwrap_or(legacy)
}

/// One granted permission. There is no "denied" value: a missing grant is a denial.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Grant {
    pub role_id: i64,
    pub site_id: i64,
    pub permission: String,
}

impl Grant {
    pub fn new(role_id: i64, site_id: i64, permission: impl Into<String>) -> Self {
        Self {
            role_id,
            site_id,
            permission: permission.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    grants: BTreeSet<Grant>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the grants of one legacy group. `flag` returns the stored
    /// value of a flag column, `None` if the column is absent.
    pub fn add_group<'a>(
        &mut self,
        group_id: i64,
        site_id: i64,
        flag: impl Fn(&str) -> Option<&'a str>,
    ) {
        for legacy in LEGACY_PERMISSIONS {
            if flag(legacy) == Some(GRANTED) {
                self.grants
                    .insert(Grant::new(group_id, site_id, permission_name(legacy)));
            }
        }
    }

    pub fn is_granted(&self, role_id: i64, site_id: i64, permission: &str) -> bool {
        self.grants
            .contains(&Grant::new(role_id, site_id, permission))
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Grant> {
        self.grants.iter()
    }
}

impl IntoIterator for PermissionSet {
    type Item = Grant;
    type IntoIter = std::collections::btree_set::IntoIter<Grant>;

    fn into_iter(self) -> Self::IntoIter {
        self.grants.into_iter()
    }
}
