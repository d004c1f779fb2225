mod dashboard;
mod invoke;
mod seed;

pub(crate) use dashboard::cmd_dashboard;
pub(crate) use invoke::cmd_invoke;
pub(crate) use seed::cmd_seed;
