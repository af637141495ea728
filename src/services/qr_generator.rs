use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageBuffer, Luma};
use qrcode::{EcLevel, QrCode};

/// Modules of blank border around the symbol, as the QR standard requires.
pub const QUIET_ZONE_MODULES: u32 = 4;

/// Largest accepted pixels-per-module scale.
pub const MAX_MODULE_SIZE: u32 = 64;

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(thiserror::Error, Debug)]
pub enum QrGenerationError {
    #[error("QR code generation failed: {0}")]
    QrCodeError(#[from] qrcode::types::QrError),

    #[error("PNG encoding failed: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Module size out of range: {0}")]
    InvalidModuleSize(u32),
}

/// A rendered QR code: the PNG bytes and the same image as a `data:` URL.
#[derive(Debug, Clone)]
pub struct RenderedQr {
    pub png: Vec<u8>,
    pub data_url: String,
}

/// Renders a QR code whose payload is exactly `payload`.
///
/// Uses error correction level H so printed codes survive wear. The output
/// depends only on the payload and module size.
pub fn generate_qr_png(payload: &str, module_size: u32) -> Result<Vec<u8>, QrGenerationError> {
    if module_size == 0 || module_size > MAX_MODULE_SIZE {
        return Err(QrGenerationError::InvalidModuleSize(module_size));
    }

    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)?;

    let modules = code.width() as u32;
    let img_size = modules
        .checked_add(2 * QUIET_ZONE_MODULES)
        .and_then(|size| size.checked_mul(module_size))
        .ok_or(QrGenerationError::InvalidModuleSize(module_size))?;

    let img = ImageBuffer::<Luma<u8>, Vec<u8>>::from_fn(img_size, img_size, |x, y| {
        let module_x = (x / module_size).checked_sub(QUIET_ZONE_MODULES);
        let module_y = (y / module_size).checked_sub(QUIET_ZONE_MODULES);
        match (module_x, module_y) {
            (Some(mx), Some(my)) if mx < modules && my < modules => {
                match code[(mx as usize, my as usize)] {
                    qrcode::types::Color::Dark => Luma([0u8]),
                    qrcode::types::Color::Light => Luma([255u8]),
                }
            }
            _ => Luma([255u8]),
        }
    });

    let mut png_data = Vec::new();
    image::DynamicImage::ImageLuma8(img).write_to(
        &mut std::io::Cursor::new(&mut png_data),
        image::ImageFormat::Png,
    )?;

    Ok(png_data)
}

pub fn to_data_url(png: &[u8]) -> String {
    format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(png))
}

pub fn render_qr(payload: &str, module_size: u32) -> Result<RenderedQr, QrGenerationError> {
    let png = generate_qr_png(payload, module_size)?;
    let data_url = to_data_url(&png);
    Ok(RenderedQr { png, data_url })
}
