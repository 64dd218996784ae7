pub mod check_config;
pub mod prune;
pub mod recent;
pub mod run;

pub use check_config::handle_check_config;
pub use prune::handle_prune;
pub use recent::handle_recent;
pub use run::handle_run;
