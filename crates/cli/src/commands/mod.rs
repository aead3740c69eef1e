//! Subcommand handlers: `run` drives an acquisition, `validate` and `info`
//! only read the config.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_acquisition;
pub use validate::run_validate;
