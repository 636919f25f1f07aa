pub mod config_store;
pub mod push_client;
pub mod task;

pub use config_store::{ConfigStore, DEFAULT_CONFIGS_KEY};
pub use push_client::PushClient;
pub use task::{Outcome, Task, TaskCompleter, TaskState};
