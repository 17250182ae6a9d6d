use crate::pe::{DosHeader, NtHeaders, OptionalHeaderFormat, SectionHeader};

/// Receives a callback at each milestone of [`crate::Image::parse_with`].
///
/// Milestones arrive in decoding order: DOS header, optional header format, NT headers,
/// section table. A failing decode stops the sequence at the step that failed. Every method
/// defaults to doing nothing.
pub trait DecodeObserver: Send + Sync {
    /// The DOS header was decoded
    fn dos_header_parsed(&self, _header: &DosHeader) {}

    /// The optional header magic was read and mapped to a format
    fn format_selected(&self, _format: OptionalHeaderFormat) {}

    /// The NT headers were decoded, at file offset `offset`
    fn nt_headers_parsed(&self, _headers: &NtHeaders, _offset: usize) {}

    /// All section headers were decoded, starting at file offset `offset`
    fn section_headers_parsed(&self, _sections: &[SectionHeader], _offset: usize) {}
}
