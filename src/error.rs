use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Decoding errors ([`Error::OutOfBounds`], [`Error::UnknownOptionalHeaderFormat`], the signature
/// errors and [`Error::Malformed`]) abort a parse as a whole, no partially decoded image is ever
/// handed out. [`Error::UnresolvableAddress`] on the other hand is local to a single address
/// translation and leaves the decoded [`crate::Image`] untouched.
///
/// # Error Categories
///
/// ## Decoding Errors
/// - [`Error::OutOfBounds`] - A read would exceed the supplied buffer
/// - [`Error::UnknownOptionalHeaderFormat`] - The optional header magic is neither PE32 nor PE32+
/// - [`Error::InvalidDosSignature`] - The DOS header does not start with `MZ`
/// - [`Error::InvalidPeSignature`] - The NT headers do not start with `PE\0\0`
/// - [`Error::Malformed`] - Structurally inconsistent input
///
/// ## Address Resolution Errors
/// - [`Error::UnresolvableAddress`] - An address maps to neither the headers nor a section
///
/// ## I/O Errors
/// - [`Error::Empty`] - Empty input provided
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// # Examples
///
/// ```rust
/// use pescope::{Error, Image};
///
/// match Image::parse(&[0x4D, 0x5A]) {
///     Ok(_) => unreachable!(),
///     Err(Error::OutOfBounds) => println!("truncated image"),
///     Err(e) => println!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An out of bound access was attempted while decoding the image.
    ///
    /// Every primitive read is bounds checked against the supplied buffer. This error is
    /// returned instead of reading past the end of the data or fabricating zero-filled fields.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// The optional header magic is neither `0x10B` (PE32) nor `0x20B` (PE32+).
    ///
    /// Raised before any optional header field is decoded.
    #[error("Unknown optional header format - magic 0x{0:04X}")]
    UnknownOptionalHeaderFormat(u16),

    /// An address could not be translated into a file offset.
    ///
    /// The address neither falls inside the header region nor inside the aligned virtual
    /// extent of any section.
    #[error("Address 0x{0:X} can not be resolved to a file offset")]
    UnresolvableAddress(u64),

    /// The DOS header magic is not `MZ`.
    ///
    /// Only reported while signature validation is enabled, see
    /// [`crate::ValidationConfig::enable_signature_validation`].
    #[error("Invalid DOS signature - 0x{0:04X}")]
    InvalidDosSignature(u16),

    /// The NT headers signature is not `PE\0\0`.
    ///
    /// Only reported while signature validation is enabled, see
    /// [`crate::ValidationConfig::enable_signature_validation`].
    #[error("Invalid PE signature - 0x{0:08X}")]
    InvalidPeSignature(u32),

    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur while opening or mapping a file from disk.
    #[error("{0}")]
    FileError(#[from] std::io::Error),
}
