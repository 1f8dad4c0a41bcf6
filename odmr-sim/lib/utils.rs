//! Helpers for writing simulation output to disk.

use std::{ fs, path::Path };
use ndarray_npy::{ NpzWriter, WriteNpzError };
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("npz write error: {0}")]
    Npz(#[from] WriteNpzError),
}

pub type OutputResult<T> = Result<T, OutputError>;

/// Create a directory and all its parents if they don't already exist.
pub fn mkdir<P: AsRef<Path>>(dir: P) -> OutputResult<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

/// Open a new (uncompressed) `.npz` archive at `path`, truncating any existing
/// file.
pub fn npz_writer<P: AsRef<Path>>(path: P) -> OutputResult<NpzWriter<fs::File>> {
    Ok(NpzWriter::new(fs::File::create(path)?))
}

/// Call [`mkdir`] on a path, evaluating to an [`OutputResult`].
#[macro_export]
macro_rules! mkdir {
    ( $dir:expr ) => {
        $crate::utils::mkdir(&$dir)
    }
}

/// Write a collection of named arrays to a `.npz` archive, evaluating to an
/// [`OutputResult`].
///
/// ```ignore
/// write_npz!(
///     outdir.join("readout.npz"),
///     arrays: {
///         "time" => &time,
///         "populations" => &populations,
///     }
/// )?;
/// ```
#[macro_export]
macro_rules! write_npz {
    (
        $path:expr,
        arrays: { $( $name:expr => $arr:expr ),* $(,)? } $(,)?
    ) => {
        (|| -> $crate::utils::OutputResult<()> {
            let mut npz = $crate::utils::npz_writer($path)?;
            $(
                npz.add_array($name, $arr)?;
            )*
            npz.finish()?;
            Ok(())
        })()
    }
}

#[cfg(test)]
mod tests {
    use ndarray as nd;
    use super::*;

    #[test]
    fn write_and_read_back() {
        use ndarray_npy::NpzReader;
        let dir = std::env::temp_dir().join("odmr-sim-utils-test");
        crate::mkdir!(dir).unwrap();
        let path = dir.join("arrays.npz");
        let x: nd::Array1<f64> = nd::Array1::linspace(0.0, 1.0, 5);
        let y: nd::Array2<f64> = nd::Array2::eye(3);
        crate::write_npz!(
            path.clone(),
            arrays: { "x" => &x, "y" => &y }
        )
        .unwrap();
        let mut npz = NpzReader::new(fs::File::open(&path).unwrap()).unwrap();
        let names = npz.names().unwrap();
        let find = |prefix: &str| -> String {
            names.iter().find(|n| n.starts_with(prefix)).unwrap().clone()
        };
        let x_read: nd::Array1<f64> = npz.by_name(&find("x")).unwrap();
        let y_read: nd::Array2<f64> = npz.by_name(&find("y")).unwrap();
        assert_eq!(x_read, x);
        assert_eq!(y_read, y);
        fs::remove_file(&path).unwrap();
    }
}
