//! Route paths.

pub const GET_HEALTH: &str = "/health";

pub const POST_DEVICE_REGISTER: &str = "/v1/device/register";
pub const POST_DEVICE_AUTH: &str = "/v1/device/auth";
pub const GET_DEVICE_PROFILE: &str = "/v1/device/profile";
pub const POST_DEVICE_ADULT_SET: &str = "/v1/device/adult/set";
pub const POST_DEVICE_ADULT_VERIFY: &str = "/v1/device/adult/verify";
pub const DELETE_DEVICE_ADULT_RESET: &str = "/v1/device/adult/reset";
pub const GET_DEVICE_ADULT_STATUS: &str = "/v1/device/adult/status";

pub const POST_PLAYBACK_TOKEN: &str = "/v1/playback/token";
pub const GET_PLAYBACK_STREAM: &str = tollgate_core::playback::STREAM_PATH;

pub const POST_ADMIN_DEVICE_ACTIVATE: &str = "/v1/admin/devices/{code}/activate";
pub const POST_ADMIN_DEVICE_SUSPEND: &str = "/v1/admin/devices/{code}/suspend";
pub const PATCH_ADMIN_DEVICE_ACCESS: &str = "/v1/admin/devices/{code}/access";
pub const POST_ADMIN_DEVICE_UPSTREAM: &str = "/v1/admin/devices/{code}/upstream";
pub const DELETE_ADMIN_DEVICE: &str = "/v1/admin/devices/{code}";
