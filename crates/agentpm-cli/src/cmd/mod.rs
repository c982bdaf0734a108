pub mod cancel_task;
pub mod completions;
pub mod current;
pub mod done;
pub mod epic;
pub mod events;
pub mod handoff;
pub mod init;
pub mod log;
pub mod pending;
pub mod show;
pub mod start;
pub mod status;
pub mod test_result;
pub mod transition;
pub mod validate;
