pub mod config;
pub mod logging;

pub mod downloader;
pub mod error;
pub mod fetch_head;
pub mod output_name;
pub mod request;
pub mod retry;
pub mod segmenter;
pub mod storage;
pub mod transport;

pub use downloader::{Download, DownloadReport, ProgressStats};
pub use error::DownloadError;
