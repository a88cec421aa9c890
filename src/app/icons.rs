use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use linkchart::icons::{IconError, IconImage, IconSource};
use resvg::{tiny_skia, usvg};

/// Edge length of rasterised icons in pixels.
const ICON_PIXELS: u32 = 64;

/// Reads `/icons/<type>.svg` from a directory on disk and rasterises it with resvg.
pub(in crate::app) struct SvgIconSource {
    root: PathBuf,
    pixels: u32,
}

impl SvgIconSource {
    pub(in crate::app) fn new(root: PathBuf) -> Self {
        Self {
            root,
            pixels: ICON_PIXELS,
        }
    }
}

impl IconSource for SvgIconSource {
    fn load(&self, path: &str) -> Result<IconImage, IconError> {
        let relative = path.strip_prefix("/icons/").unwrap_or(path);
        let file = self.root.join(relative);
        let data = match fs::read(&file) {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(IconError::NotFound(path.to_owned()));
            }
            Err(source) => {
                return Err(IconError::Io {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        rasterize(&data, self.pixels).map_err(|reason| IconError::Decode {
            path: path.to_owned(),
            reason,
        })
    }
}

/// Renders the SVG centred in a square pixmap and returns straight-alpha RGBA.
fn rasterize(data: &[u8], pixels: u32) -> Result<IconImage, String> {
    let tree = usvg::Tree::from_data(data, &usvg::Options::default()).map_err(|error| error.to_string())?;
    let size = tree.size();
    let longest = size.width().max(size.height()).max(1.0);
    let scale = pixels as f32 / longest;
    let offset_x = (pixels as f32 - size.width() * scale) * 0.5;
    let offset_y = (pixels as f32 - size.height() * scale) * 0.5;

    let mut pixmap = tiny_skia::Pixmap::new(pixels, pixels)
        .ok_or_else(|| "failed to allocate icon pixmap".to_owned())?;
    resvg::render(
        &tree,
        tiny_skia::Transform::from_row(scale, 0.0, 0.0, scale, offset_x, offset_y),
        &mut pixmap.as_mut(),
    );

    let rgba = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let color = pixel.demultiply();
            [color.red(), color.green(), color.blue(), color.alpha()]
        })
        .collect();
    Ok(IconImage {
        size: [pixels as usize, pixels as usize],
        rgba,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="20">
        <rect width="10" height="20" fill="#ff0000"/>
    </svg>"##;

    #[test]
    fn rasterizes_centred_square() {
        let image = rasterize(SQUARE.as_bytes(), 32).expect("valid svg");
        assert_eq!(image.size, [32, 32]);
        assert_eq!(image.rgba.len(), 32 * 32 * 4);

        let pixel = |x: usize, y: usize| &image.rgba[(y * 32 + x) * 4..(y * 32 + x) * 4 + 4];
        assert_eq!(pixel(16, 16), &[255, 0, 0, 255]);
        // Narrow icon leaves transparent bars left and right.
        assert_eq!(pixel(1, 16)[3], 0);
    }

    #[test]
    fn invalid_svg_is_a_decode_error() {
        assert!(rasterize(b"not svg", 16).is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let source = SvgIconSource::new(std::env::temp_dir().join("linkchart-no-such-icons"));
        assert!(matches!(
            source.load("/icons/person.svg"),
            Err(IconError::NotFound(path)) if path == "/icons/person.svg"
        ));
    }
}
