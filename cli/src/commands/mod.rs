mod check;
mod cycle_db;
mod helpers;
mod nutrition;
mod tactical;

pub(crate) use check::cmd_check;
pub(crate) use cycle_db::cmd_cycle_db;
pub(crate) use nutrition::cmd_nutrition;
pub(crate) use tactical::cmd_tactical;
