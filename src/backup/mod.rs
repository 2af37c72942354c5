pub mod action;
pub mod backup_config;
pub mod calendar;
pub mod device;
pub mod ledger;
pub mod process;
pub mod prune;
pub mod result_error;
pub mod state;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
