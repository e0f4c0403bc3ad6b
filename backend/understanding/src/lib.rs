//! Image understanding and device context for the input and tools steps.

pub mod capture;
pub mod geo;
pub mod ocr;

pub use capture::{
    CameraSession, CommandFrameSource, FrameSource, ImageFile, detect_image_mime, load_image_file,
    probe_image_file,
};
pub use geo::{
    CountryLanguage, DEFAULT_GEO_ENDPOINT, IpGeolocator, country_language_by_code,
    country_language_by_name, locale_language,
};
pub use ocr::{TesseractOcr, VisionOcr, parse_tesseract_tsv};
