//! Shared HTTP constants (headers, problem URIs, user-facing notices).

/// Header carrying a one-shot notice as `kind:message`.
pub const HEADER_FLASH: &str = "x-tessera-flash";
pub(crate) const HEADER_FORWARDED_PROTO: &str = "x-forwarded-proto";

pub(crate) const SETTINGS_INDEX: &str = "/db-config";
pub(crate) const INDEX_MODULE: &str = "App";

pub(crate) const PROBLEM_INTERNAL: &str = "https://tessera.dev/problems/internal";
pub(crate) const PROBLEM_UNAUTHORIZED: &str = "https://tessera.dev/problems/unauthorized";
pub(crate) const PROBLEM_FORBIDDEN: &str = "https://tessera.dev/problems/forbidden";
pub(crate) const PROBLEM_CONFLICT: &str = "https://tessera.dev/problems/conflict";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://tessera.dev/problems/not-found";
pub(crate) const PROBLEM_SETTING_INVALID: &str = "https://tessera.dev/problems/setting-invalid";

pub(crate) const MSG_LOGIN_REQUIRED: &str = "Please log in to access this page.";
pub(crate) const MSG_AUTH_REQUIRED: &str = "Authentication required.";
pub(crate) const MSG_VIEW_FORBIDDEN: &str = "You do not have permission to access settings.";
pub(crate) const MSG_UPDATE_FORBIDDEN: &str = "You do not have permission to update settings.";
pub(crate) const MSG_EMPTY_VALUE: &str = "No changes made. Value was empty.";
pub(crate) const MSG_SAVED: &str = "The app setting has been saved.";
pub(crate) const MSG_SAVE_FAILED: &str = "The app setting could not be saved. Please, try again.";
