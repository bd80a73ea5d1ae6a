//! Image uploads: multipart intake, normalization and storage.

mod intake;
mod naming;
mod processor;

pub use intake::{apply_uploads, coerce_form_fields, UploadedFile};
pub use naming::image_filename;
pub use processor::{encode_jpeg, ImageJob, ImageProcessor, RustImageProcessor, JPEG_QUALITY};
