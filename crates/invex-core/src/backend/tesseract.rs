//! Tesseract OCR backend.
//!
//! Rasterizes the document with ImageMagick and pipes the grayscale image
//! into Tesseract. Both executables must be installed.

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::{Backend, BackendKind, Result, ToolRunner};
use crate::error::ToolError;

const TESSERACT: &str = "tesseract";
const TESSERACT_HINT: &str = "install tesseract-ocr";
const CONVERT: &str = "convert";
const CONVERT_HINT: &str = "install imagemagick";

/// ImageMagick + Tesseract OCR backend.
pub struct TesseractBackend {
    runner: Arc<ToolRunner>,
    density: u32,
    lstm: bool,
}

impl TesseractBackend {
    pub fn new(runner: Arc<ToolRunner>) -> Self {
        Self {
            runner,
            density: 350,
            lstm: false,
        }
    }

    /// Tesseract 4 variant using the LSTM engine with automatic page segmentation.
    pub fn lstm(runner: Arc<ToolRunner>) -> Self {
        Self {
            lstm: true,
            ..Self::new(runner)
        }
    }

    /// Set rasterization density in DPI.
    pub fn with_density(mut self, density: u32) -> Self {
        self.density = density;
        self
    }

    fn convert_args(&self, path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-density".into(), self.density.to_string().into()];
        args.push(path.as_os_str().to_owned());
        args.extend(
            [
                "-colorspace",
                "Gray",
                "-contrast-stretch",
                "0",
                "-sharpen",
                "0x1",
                "-depth",
                "8",
                "-background",
                "white",
                "-flatten",
                "-type",
                "grayscale",
                "-alpha",
                "off",
                "png:-",
            ]
            .map(OsString::from),
        );
        args
    }

    fn tesseract_args(&self, language: &str) -> Vec<String> {
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            language.to_string(),
            "--dpi".to_string(),
            self.density.to_string(),
        ];
        if self.lstm {
            args.extend(["--oem", "1", "--psm", "3"].map(String::from));
        }
        args
    }
}

impl Backend for TesseractBackend {
    fn kind(&self) -> BackendKind {
        if self.lstm {
            BackendKind::Tesseract4
        } else {
            BackendKind::Tesseract
        }
    }

    fn check_available(&self) -> std::result::Result<(), ToolError> {
        self.runner.require(TESSERACT, TESSERACT_HINT)?;
        self.runner.require(CONVERT, CONVERT_HINT)?;
        Ok(())
    }

    fn to_text(&self, path: &Path, language: &str) -> Result<String> {
        // Fail on either missing tool before rasterizing anything.
        self.check_available()?;

        let start = Instant::now();
        let image = self
            .runner
            .stdout(CONVERT, CONVERT_HINT, self.convert_args(path), None, &[0])?;
        debug!("Rasterized {} to {} bytes", path.display(), image.len());

        let text = self.runner.stdout(
            TESSERACT,
            TESSERACT_HINT,
            self.tesseract_args(language),
            Some(image.as_slice()),
            &[0],
        )?;

        debug!(
            "OCR of {} took {}ms",
            path.display(),
            start.elapsed().as_millis()
        );
        Ok(String::from_utf8_lossy(&text).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_command_lines() {
        let runner = Arc::new(ToolRunner::new(Duration::from_secs(1)).unwrap());
        let backend = TesseractBackend::new(runner).with_density(300);

        let convert = backend.convert_args(Path::new("scan.pdf"));
        assert_eq!(convert[0], "-density");
        assert_eq!(convert[1], "300");
        assert_eq!(convert[2], "scan.pdf");
        assert_eq!(convert.last().unwrap(), "png:-");

        let tess = backend.tesseract_args("eng");
        assert_eq!(tess, vec!["stdin", "stdout", "-l", "eng", "--dpi", "300"]);
        assert_eq!(backend.kind(), BackendKind::Tesseract);
    }

    #[test]
    fn test_lstm_command_line() {
        let runner = Arc::new(ToolRunner::new(Duration::from_secs(1)).unwrap());
        let backend = TesseractBackend::lstm(runner);

        assert_eq!(backend.kind(), BackendKind::Tesseract4);
        assert_eq!(
            backend.tesseract_args("deu"),
            vec!["stdin", "stdout", "-l", "deu", "--dpi", "350", "--oem", "1", "--psm", "3"]
        );
    }
}
