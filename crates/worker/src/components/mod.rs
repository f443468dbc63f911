pub mod dispatcher_client;
pub mod task_source;

pub use dispatcher_client::DispatcherClient;
pub use task_source::TaskSource;
