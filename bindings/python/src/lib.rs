use std::path::PathBuf;

use mustachizer_core::{Config, DecalSelector, MustacheError, Mustachizer as Core, SizePreset};
use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyIOError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};

create_exception!(mustachizer, NoFaceFoundError, PyException);
create_exception!(mustachizer, ImageIncorrectError, PyException);

fn to_py_err(e: MustacheError) -> PyErr {
    match e {
        MustacheError::NoFaceDetected => NoFaceFoundError::new_err(e.to_string()),
        MustacheError::UnsupportedFormat(_) | MustacheError::ZeroDimensions => {
            ImageIncorrectError::new_err(e.to_string())
        }
        MustacheError::Io(_) => PyIOError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

/// Draws mustaches on faces.
///
/// Args:
///     config: Path to a YAML configuration file (optional, defaults otherwise)
#[pyclass(name = "Mustachizer")]
struct PyMustachizer {
    inner: Core,
}

#[pymethods]
impl PyMustachizer {
    #[new]
    #[pyo3(signature = (config=None))]
    fn new(config: Option<PathBuf>) -> PyResult<Self> {
        let config = match config {
            Some(path) => Config::from_file(path).map_err(to_py_err)?,
            None => Config::default(),
        };
        let inner = Core::from_config(&config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Mustachize an image.
    ///
    /// Args:
    ///     input: Raw image bytes (PNG, JPEG, or GIF)
    ///     mustache: Mustache name, or "random" (default: random)
    ///     size: "realist", "big", or "massive" (default: realist)
    ///
    /// Returns:
    ///     dict with keys: data (bytes), format (str), width (int), height (int),
    ///                     frame_count (int), decals (list of str)
    ///
    /// Raises:
    ///     NoFaceFoundError: no face in any frame
    ///     ImageIncorrectError: input is not a supported image
    #[pyo3(signature = (input, *, mustache=None, size=None))]
    fn mustachize(
        &mut self,
        py: Python<'_>,
        input: Vec<u8>,
        mustache: Option<&str>,
        size: Option<&str>,
    ) -> PyResult<Py<PyDict>> {
        let selector = mustache.map(DecalSelector::from_name).unwrap_or_default();
        let size = size.map(SizePreset::from_name).unwrap_or_default();

        let inner = &mut self.inner;
        let result = py
            .allow_threads(|| inner.apply(&input, &selector, size))
            .map_err(to_py_err)?;

        let dict = PyDict::new(py);
        dict.set_item("data", PyBytes::new(py, &result.data))?;
        dict.set_item("format", result.format.to_string())?;
        dict.set_item("width", result.width)?;
        dict.set_item("height", result.height)?;
        dict.set_item("frame_count", result.frame_count)?;
        dict.set_item("decals", result.decal_names())?;
        Ok(dict.into())
    }

    /// Names of the available mustaches.
    fn mustaches(&self) -> Vec<String> {
        self.inner.catalog().names().map(str::to_string).collect()
    }
}

#[pymodule]
fn mustachizer(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyMustachizer>()?;
    m.add("NoFaceFoundError", m.py().get_type::<NoFaceFoundError>())?;
    m.add("ImageIncorrectError", m.py().get_type::<ImageIncorrectError>())?;
    Ok(())
}
