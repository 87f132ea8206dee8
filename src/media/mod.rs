/// Uploaded image handling
///
/// This module handles:
/// - Validating picked files as images
/// - Copying them into the uploads directory
/// - Generating downscaled display previews

pub mod upload;
