mod cleanup_uploads;

pub use cleanup_uploads::CleanupUploads;
