pub mod abusiveness;
pub mod lending;
pub mod provisioning;
