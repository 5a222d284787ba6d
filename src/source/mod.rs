//! PDF ingress: staging and remote download

pub mod download;
pub mod resolver;

pub use download::{chunk_ranges, DownloadOutcome, DownloadStrategy, Downloader};
pub use resolver::{
    check_ssrf, has_pdf_header, parse_source_url, staged_filename_for_upload,
    staged_filename_for_url, validate_pdf_file, StagingArea,
};
