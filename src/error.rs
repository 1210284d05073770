use image::ImageError;

use std::error::Error;
use std::fmt;
use std::io::Error as IOError;

#[derive(Debug)]
pub struct PlateError(PlateErrorKind);

#[derive(Debug)]
pub enum PlateErrorKind {
    IOError(IOError),
    ImageError(ImageError),
    /// a font, template or background resource could not be used
    AssetLoad(String),
    /// plate string length does not match the layout's slot count
    InvalidLayout { expected: usize, found: usize },
    /// angles or corners that cannot be projected onto the image plane
    DegenerateProjection(String),
}

impl PlateError {
    pub fn kind(&self) -> &PlateErrorKind {
        &self.0
    }

    pub fn asset_load(msg: impl Into<String>) -> Self {
        Self(PlateErrorKind::AssetLoad(msg.into()))
    }

    pub fn invalid_layout(expected: usize, found: usize) -> Self {
        Self(PlateErrorKind::InvalidLayout { expected, found })
    }

    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self(PlateErrorKind::DegenerateProjection(msg.into()))
    }
}

impl<T> From<T> for PlateError
where T: Into<PlateErrorKind>
{
    fn from(e: T) -> Self {
        Self(e.into())
    }
}

impl fmt::Display for PlateError {

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            PlateErrorKind::IOError(e) => e.fmt(f),
            PlateErrorKind::ImageError(e) => e.fmt(f),
            PlateErrorKind::AssetLoad(msg) => write!(f, "failed to load asset: {}", msg),
            PlateErrorKind::InvalidLayout { expected, found } => {
                write!(f, "plate layout expects {} glyphs, got {}", expected, found)
            },
            PlateErrorKind::DegenerateProjection(msg) => write!(f, "degenerate projection: {}", msg),
        }
    }
}

impl Error for PlateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self.kind() {
            PlateErrorKind::IOError(e) => Some(e),
            PlateErrorKind::ImageError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<IOError> for PlateErrorKind {
    fn from(e: IOError) -> Self {
        Self::IOError(e)
    }
}

impl From<ImageError> for PlateErrorKind {
    fn from(e: ImageError) -> Self {
        Self::ImageError(e)
    }
}
