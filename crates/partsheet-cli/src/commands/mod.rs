pub mod convert;
pub mod headers;
pub mod inspect;
pub mod price_sync;
pub mod receiving_order;

use partsheet_core::error::PartsheetError;
use partsheet_core::extraction::content::LopdfSource;
use partsheet_core::extraction::pdftotext::PdftotextSource;
use partsheet_core::extraction::PageSource;
use tracing::debug;

use crate::Backend;

pub fn page_source(backend: Backend) -> Result<Box<dyn PageSource>, PartsheetError> {
    debug!(?backend, "selecting extraction backend");
    match backend {
        Backend::Lopdf => Ok(Box::new(LopdfSource::new())),
        Backend::Pdftotext => {
            if !PdftotextSource::is_available() {
                return Err(PartsheetError::PdftotextNotFound);
            }
            Ok(Box::new(PdftotextSource::new()))
        }
    }
}
