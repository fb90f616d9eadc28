use std::io;
use std::path::Path;

/// Filesystem seam used by the configuration layer.
pub trait FileSystem {
    /// Reads the entire contents of a file into a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be read, or contains invalid UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Writes a slice of bytes to a file, creating the file if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written to or created.
    fn write_all(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Creates a directory and all of its parent components if they are missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Returns `true` if the path points to an existing entity.
    fn exists(&self, path: &Path) -> bool;
}

pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_all(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        std::fs::write(path, contents)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
