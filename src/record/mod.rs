pub mod session;
pub mod store;

pub use session::SessionRecord;
pub use store::{RecordError, record_path, safe_path_component, write_tcp_record};
