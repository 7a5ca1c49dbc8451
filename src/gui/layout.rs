//! Window layout: a status line on top, camera and zoomed view side by side below.

use crate::{
    image::{draw, Color, Image, Rect, Resolution},
    present::Displayed,
};

const STATUS_HEIGHT: u32 = 40;
const PADDING: u32 = 8;
const BACKGROUND: Color = Color::from_rgb8(0x20, 0x20, 0x20);
const TEXT: Color = Color::WHITE;

#[derive(Debug, Clone, Copy)]
pub struct Layout {
    window: Resolution,
}

impl Layout {
    /// Default window size, fitting two 640x480 frames below the status line.
    pub const DEFAULT_WINDOW: Resolution = Resolution::new(1280, 480 + STATUS_HEIGHT);

    pub fn new(window: Resolution) -> Self {
        Self { window }
    }

    fn status_rect(&self) -> Rect {
        Rect::new(0, 0, self.window.width(), STATUS_HEIGHT.min(self.window.height()))
    }

    /// Returns the two display regions of equal size: camera on the left, zoomed view on the
    /// right.
    pub fn cells(&self) -> [Rect; 2] {
        let top = STATUS_HEIGHT.min(self.window.height());
        let height = self.window.height() - top;
        let left_width = self.window.width() / 2;
        [
            Rect::new(0, top, left_width, height),
            Rect::new(left_width, top, left_width, height),
        ]
    }

    /// Renders the visible state into a canvas of the window's size.
    pub fn render(&self, shown: &Displayed) -> Image {
        let mut canvas = Image::filled(self.window.width(), self.window.height(), BACKGROUND);

        let status = self.status_rect();
        let baseline = (status.height() / 2) as i32;
        draw::text(&mut canvas, PADDING as i32, baseline, &shown.status)
            .align_left()
            .color(TEXT);
        let Some(frame) = &shown.frame else {
            return canvas;
        };

        let [camera_cell, zoom_cell] = self.cells();
        let zoom = format!("zoom {:.2}x", frame.scale);
        let x = zoom_cell.x() + zoom_cell.width() / 2;
        draw::text(&mut canvas, x as i32, baseline, &zoom).color(TEXT);

        place(&mut canvas, camera_cell, &frame.camera);
        place(&mut canvas, zoom_cell, &frame.zoomed);
        canvas
    }
}

/// Scales `image` to the largest size that fits into `cell` and centers it there.
fn place(canvas: &mut Image, cell: Rect, image: &Image) {
    let Some(ratio) = image.resolution().aspect_ratio() else {
        return;
    };
    let fit = cell.resolution().fit_aspect_ratio(ratio);
    if fit.is_empty() {
        return;
    }
    let scaled = if fit.resolution() == image.resolution() {
        image.clone()
    } else {
        image.resize(fit.resolution())
    };
    canvas.blit(&scaled, cell.x() + fit.x(), cell.y() + fit.y());
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::present::RenderCommand;

    fn displayed(images: Option<(Image, Image)>) -> Displayed {
        Displayed {
            frame: images.map(|(camera, zoomed)| RenderCommand {
                camera: Arc::new(camera),
                zoomed: Arc::new(zoomed),
                scale: 1.0,
                hands: 0,
                frame: 0,
            }),
            status: String::new(),
        }
    }

    #[test]
    fn equal_cells() {
        let layout = Layout::new(Layout::DEFAULT_WINDOW);
        let [left, right] = layout.cells();
        assert_eq!(left, Rect::new(0, 40, 640, 480));
        assert_eq!(right, Rect::new(640, 40, 640, 480));
    }

    #[test]
    fn places_frames_side_by_side() {
        let layout = Layout::new(Resolution::new(80, 80));
        let canvas = layout.render(&displayed(Some((
            Image::filled(4, 4, Color::RED),
            Image::filled(8, 4, Color::BLUE),
        ))));
        assert_eq!(canvas.resolution(), Resolution::new(80, 80));

        // Cells are 40x40 at y=40. The square camera frame fills its cell.
        assert_eq!(canvas.get(0, 40), Color::RED);
        assert_eq!(canvas.get(39, 79), Color::RED);
        // The 2:1 zoomed view is letterboxed to 40x20 at y=50.
        assert_eq!(canvas.get(60, 45), BACKGROUND);
        assert_eq!(canvas.get(60, 60), Color::BLUE);
        assert_eq!(canvas.get(60, 75), BACKGROUND);
    }

    #[test]
    fn status_is_drawn() {
        let layout = Layout::new(Layout::DEFAULT_WINDOW);
        let mut shown = displayed(None);
        shown.status = "Select an image to start.".into();
        let canvas = layout.render(&shown);

        let status_pixels = (0..STATUS_HEIGHT)
            .flat_map(|y| (0..200).map(move |x| (x, y)))
            .filter(|&(x, y)| canvas.get(x, y) == TEXT)
            .count();
        assert!(status_pixels > 0);
        assert_eq!(canvas.get(700, 300), BACKGROUND);
    }
}
