use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for line-oriented text formats that map onto one model.
///
/// Implementors handle the format-specific parsing and serialization; the
/// path-based helpers take care of opening and buffering files.
pub trait TextFile: Sized {
    /// The error type for I/O and parse failures.
    type Error: Error + From<io::Error>;

    /// Parses the model from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if a line is malformed or the reader fails.
    fn read_from(reader: &mut impl BufRead) -> Result<Self, Self::Error>;

    /// Serializes the model to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(&self, writer: &mut impl Write) -> Result<(), Self::Error>;

    /// Parses the model from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsing fails.
    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Self, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    /// Serializes the model to a file path, truncating any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or writing fails.
    fn write_to_path<P: AsRef<Path>>(&self, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Serializes the model into an in-memory buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_bytes(&self) -> Result<Vec<u8>, Self::Error> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }
}
