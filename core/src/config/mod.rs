pub mod load;
pub mod types;

pub use load::{get_data_dir, load, load_default, load_from_path};
pub use types::{
    AppConfig, BackendConfig, DedupConfig, LoggingConfig, NoticeConfig, PollingConfig,
};
