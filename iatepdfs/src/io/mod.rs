//! Reading and writing PDF files.

pub mod reader;
pub mod writer;

pub use reader::{DocumentInfo, LoadedPdf, PdfReader, has_pdf_header};
pub use writer::{PdfWriter, StagedOutput, WriteOptions, WriteStatistics};
