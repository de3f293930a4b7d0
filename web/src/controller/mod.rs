pub(crate) mod auth_controller;
pub(crate) mod health_check_controller;
pub(crate) mod session_controller;
