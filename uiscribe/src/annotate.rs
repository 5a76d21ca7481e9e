//! Annotated evidence screenshots.
//!
//! For every recorded action the annotator renders a cropped screenshot of
//! the resolved element with its ancestor context outlined, the exact action
//! point marked, and the absolute coordinates stamped in a callout. When no
//! element is available it still produces a fixed-size region screenshot —
//! a valid point always yields *some* image.

use crate::capture::ScreenCapture;
use crate::element::Element;
use crate::errors::AutomationError;
use crate::geometry::{Point, Rect};
use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut,
    draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect as ImageRect;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Which action the screenshot documents; picks glyph and colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Click,
    TextEntry,
    Marker,
}

impl AnnotationKind {
    /// File-name fragment for `screenshots/NNN_<kind>.png`.
    pub fn file_stem(&self) -> &'static str {
        match self {
            AnnotationKind::Click => "click",
            AnnotationKind::TextEntry => "type",
            AnnotationKind::Marker => "state",
        }
    }

    fn target_color(&self) -> Rgba<u8> {
        match self {
            AnnotationKind::Click => Rgba([0, 255, 0, 255]),
            AnnotationKind::TextEntry => Rgba([0, 100, 255, 255]),
            AnnotationKind::Marker => Rgba([255, 255, 0, 255]),
        }
    }

    fn target_width(&self) -> i32 {
        match self {
            AnnotationKind::Marker => 3,
            _ => 4,
        }
    }

    fn callout_background(&self) -> Rgba<u8> {
        match self {
            AnnotationKind::Click => Rgba([255, 0, 0, 255]),
            AnnotationKind::TextEntry => Rgba([0, 100, 255, 255]),
            AnnotationKind::Marker => Rgba([128, 128, 128, 255]),
        }
    }
}

const CROP_PADDING: i32 = 20;
const ANCESTOR_MAX_WIDTH: i32 = 800;
const ANCESTOR_MAX_HEIGHT: i32 = 600;
const FALLBACK_REGION: i32 = 400;
const LABEL_MAX_CHARS: usize = 30;
const CAPTION_MAX_CHARS: usize = 40;

const CONTAINER_OUTLINE: Rgba<u8> = Rgba([128, 128, 128, 255]);
const CONTEXT_OUTLINE: Rgba<u8> = Rgba([255, 165, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const CLICK_DOT: Rgba<u8> = Rgba([255, 0, 0, 255]);

static FONT: OnceLock<Option<FontVec>> = OnceLock::new();

/// Best-effort system font; annotation degrades to shapes when none loads.
fn font() -> Option<&'static FontVec> {
    FONT.get_or_init(|| {
        const CANDIDATES: &[&str] = &[
            "C:\\Windows\\Fonts\\arial.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
        ];
        for path in CANDIDATES {
            if let Ok(bytes) = std::fs::read(path) {
                if let Ok(font) = FontVec::try_from_vec(bytes) {
                    return Some(font);
                }
            }
        }
        debug!("No system font found; screenshots will carry shapes only");
        None
    })
    .as_ref()
}

pub struct Annotator {
    capture: Arc<dyn ScreenCapture>,
}

impl Annotator {
    pub fn new(capture: Arc<dyn ScreenCapture>) -> Self {
        Self { capture }
    }

    /// Render the evidence image for an action at `point`.
    pub fn annotate(
        &self,
        element: Option<&Element>,
        point: Point,
        kind: AnnotationKind,
    ) -> Result<RgbaImage, AutomationError> {
        if let Some(element) = element {
            if element.is_exact_hit() {
                match self.focused(element, point, kind) {
                    Ok(image) => return Ok(image),
                    Err(e) => warn!("Focused screenshot failed, using region fallback: {e}"),
                }
            }
        }
        self.region_fallback(point, kind)
    }

    /// Crop to the element (or a reasonably-sized ancestor) and highlight
    /// the containing hierarchy.
    fn focused(
        &self,
        element: &Element,
        point: Point,
        kind: AnnotationKind,
    ) -> Result<RgbaImage, AutomationError> {
        let (width, height) = self.capture.screen_size()?;
        let screen = Rect::new(0, 0, width as i32, height as i32);

        // Prefer an ancestor for context as long as it stays readable.
        let mut crop = element.bounds;
        let ancestors = &element.context_hierarchy;
        if ancestors.len() > 1 {
            for ancestor in &ancestors[..ancestors.len() - 1] {
                if ancestor.bounds.width() <= ANCESTOR_MAX_WIDTH
                    && ancestor.bounds.height() <= ANCESTOR_MAX_HEIGHT
                {
                    crop = ancestor.bounds;
                    break;
                }
            }
        }
        let crop = crop.inflate(CROP_PADDING).clamp_to(screen);
        if crop.width() <= 0 || crop.height() <= 0 {
            return Err(AutomationError::InvalidArgument(format!(
                "Degenerate crop for element at {:?}",
                element.bounds
            )));
        }

        let mut image = self.capture.capture(Some(crop))?;
        let offset = Point::new(crop.left, crop.top);

        // Context first, target last so its outline stays on top. The
        // hierarchy's copy of the target differs from `element` only by its
        // (empty) own hierarchy, so identity is bounds + type.
        for context in ancestors {
            if context.bounds == element.bounds && context.control_type == element.control_type {
                continue;
            }
            let color = if context.control_type.is_container() {
                CONTAINER_OUTLINE
            } else {
                CONTEXT_OUTLINE
            };
            if let Some(rect) = shifted_rect(context.bounds, offset, &image) {
                draw_outline(&mut image, rect, color, 2);
                if !context.text.trim().is_empty() {
                    let label = truncate(&context.label(), LABEL_MAX_CHARS);
                    draw_label(
                        &mut image,
                        rect.left() + 2,
                        rect.top() + 2,
                        &label,
                        WHITE,
                        Rgba([0, 0, 0, 255]),
                    );
                }
            }
        }

        if let Some(rect) = shifted_rect(element.bounds, offset, &image) {
            draw_outline(&mut image, rect, kind.target_color(), kind.target_width());
        }

        let rel = Point::new(point.x - offset.x, point.y - offset.y);
        draw_action_glyph(&mut image, rel, kind);
        draw_coordinate_callout(&mut image, rel, point, kind);
        draw_caption(&mut image, &truncate(&element.label(), CAPTION_MAX_CHARS));

        Ok(image)
    }

    /// Fixed-size region screenshot for points with no resolved element.
    fn region_fallback(
        &self,
        point: Point,
        kind: AnnotationKind,
    ) -> Result<RgbaImage, AutomationError> {
        let (width, height) = self.capture.screen_size()?;
        let screen = Rect::new(0, 0, width as i32, height as i32);
        let region =
            Rect::centered_on(point, FALLBACK_REGION, FALLBACK_REGION).clamp_to(screen);

        let mut image = self.capture.capture(Some(region))?;
        let rel = Point::new(point.x - region.left, point.y - region.top);

        draw_action_glyph(&mut image, rel, kind);
        draw_coordinate_callout(&mut image, rel, point, kind);
        draw_caption(
            &mut image,
            &format!("No UI element detected - showing {} location", kind.file_stem()),
        );

        Ok(image)
    }
}

/// Convert screen-space bounds into an in-image rectangle, clipped to the
/// image; `None` when the intersection is empty.
fn shifted_rect(bounds: Rect, offset: Point, image: &RgbaImage) -> Option<ImageRect> {
    let left = (bounds.left - offset.x).clamp(0, image.width() as i32 - 1);
    let top = (bounds.top - offset.y).clamp(0, image.height() as i32 - 1);
    let right = (bounds.right - offset.x).clamp(0, image.width() as i32 - 1);
    let bottom = (bounds.bottom - offset.y).clamp(0, image.height() as i32 - 1);
    let width = right - left;
    let height = bottom - top;
    if width <= 0 || height <= 0 {
        return None;
    }
    Some(ImageRect::at(left, top).of_size(width as u32, height as u32))
}

fn draw_outline(image: &mut RgbaImage, rect: ImageRect, color: Rgba<u8>, width: i32) {
    for inset in 0..width {
        let w = rect.width() as i32 - 2 * inset;
        let h = rect.height() as i32 - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let inner = ImageRect::at(rect.left() + inset, rect.top() + inset)
            .of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, inner, color);
    }
}

fn draw_action_glyph(image: &mut RgbaImage, at: Point, kind: AnnotationKind) {
    match kind {
        AnnotationKind::Click => {
            draw_filled_circle_mut(image, (at.x, at.y), 8, CLICK_DOT);
            draw_hollow_circle_mut(image, (at.x, at.y), 9, WHITE);
            draw_filled_circle_mut(image, (at.x, at.y), 3, WHITE);
        }
        AnnotationKind::TextEntry => {
            let color = AnnotationKind::TextEntry.target_color();
            draw_line_segment_mut(
                image,
                ((at.x - 12) as f32, at.y as f32),
                ((at.x + 12) as f32, at.y as f32),
                color,
            );
            draw_line_segment_mut(
                image,
                (at.x as f32, (at.y - 12) as f32),
                (at.x as f32, (at.y + 12) as f32),
                color,
            );
            draw_filled_circle_mut(image, (at.x, at.y), 2, color);
        }
        AnnotationKind::Marker => {
            draw_filled_circle_mut(image, (at.x, at.y), 10, AnnotationKind::Marker.target_color());
            draw_hollow_circle_mut(image, (at.x, at.y), 11, WHITE);
        }
    }
}

/// Stamp the absolute coordinates near the action point, leader-lined back
/// to it when the label lands far away.
fn draw_coordinate_callout(image: &mut RgbaImage, rel: Point, abs: Point, kind: AnnotationKind) {
    let text = format!("({}, {})", abs.x, abs.y);
    let (text_width, text_height) = approximate_text_size(&text);
    let padding = 4;
    let label_width = text_width + padding * 2;
    let label_height = text_height + padding * 2;
    let image_width = image.width() as i32;
    let image_height = image.height() as i32;

    let mut label_x = rel.x + 10;
    let mut label_y = rel.y - label_height - 10;
    if label_x + label_width > image_width {
        label_x = rel.x - label_width - 10;
    }
    if label_y < 0 {
        label_y = rel.y + 10;
    }
    if label_x < 0 {
        label_x = 5;
    }
    if label_y + label_height > image_height {
        label_y = image_height - label_height - 5;
    }

    if let Some(rect) = rect_in_image(label_x, label_y, label_width, label_height, image) {
        draw_filled_rect_mut(image, rect, kind.callout_background());
        draw_hollow_rect_mut(image, rect, WHITE);
        draw_text(image, label_x + padding, label_y + padding, &text, WHITE);
    }

    let center_x = label_x + label_width / 2;
    let center_y = label_y + label_height / 2;
    let dx = (center_x - rel.x) as f64;
    let dy = (center_y - rel.y) as f64;
    if (dx * dx + dy * dy).sqrt() > 20.0 {
        // Anchor the leader on the label edge facing the point.
        let start_y = if label_y + label_height < rel.y {
            label_y + label_height
        } else if label_y > rel.y {
            label_y
        } else {
            center_y
        };
        draw_line_segment_mut(
            image,
            (center_x as f32, start_y as f32),
            (rel.x as f32, rel.y as f32),
            WHITE,
        );
    }
}

/// Caption along the bottom edge.
fn draw_caption(image: &mut RgbaImage, text: &str) {
    let (text_width, text_height) = approximate_text_size(text);
    let x = 5;
    let y = image.height() as i32 - text_height - 8;
    if let Some(rect) = rect_in_image(x - 2, y - 2, text_width + 4, text_height + 4, image) {
        draw_filled_rect_mut(image, rect, BLACK);
        draw_hollow_rect_mut(image, rect, WHITE);
    }
    draw_text(image, x, y, text, WHITE);
}

fn draw_label(
    image: &mut RgbaImage,
    x: i32,
    y: i32,
    text: &str,
    text_color: Rgba<u8>,
    background: Rgba<u8>,
) {
    let (text_width, text_height) = approximate_text_size(text);
    if x + text_width >= image.width() as i32 || y + text_height >= image.height() as i32 {
        return;
    }
    if let Some(rect) = rect_in_image(x - 1, y - 1, text_width + 2, text_height + 2, image) {
        draw_filled_rect_mut(image, rect, background);
    }
    draw_text(image, x, y, text, text_color);
}

fn draw_text(image: &mut RgbaImage, x: i32, y: i32, text: &str, color: Rgba<u8>) {
    if let Some(font) = font() {
        draw_text_mut(image, color, x, y, PxScale::from(12.0), font, text);
    }
}

fn rect_in_image(x: i32, y: i32, width: i32, height: i32, image: &RgbaImage) -> Option<ImageRect> {
    let left = x.clamp(0, image.width() as i32 - 1);
    let top = y.clamp(0, image.height() as i32 - 1);
    let right = (x + width).clamp(0, image.width() as i32 - 1);
    let bottom = (y + height).clamp(0, image.height() as i32 - 1);
    if right <= left || bottom <= top {
        return None;
    }
    Some(ImageRect::at(left, top).of_size((right - left) as u32, (bottom - top) as u32))
}

fn approximate_text_size(text: &str) -> (i32, i32) {
    (text.chars().count() as i32 * 7, 12)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}
