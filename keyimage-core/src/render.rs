//! Per-frame glyph emission.

use serde::{Deserialize, Serialize};

use crate::host::{AnnotationStore, StyleResolver, StyleSpecifier, Viewport};
use crate::{AnnotationUid, Point2, ToolConfig, ToolResult};

/// Sub-identifier of the indicator arrow within an annotation.
pub const ARROW_UID: &str = "1";

/// Sub-identifier of the handle group within an annotation.
pub const HANDLE_GROUP_UID: &str = "handle";

/// A drawable primitive emitted for one annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "glyph", rename_all = "camelCase")]
pub enum Glyph {
    /// Dots at handle positions.
    #[serde(rename_all = "camelCase")]
    Handles {
        /// Owning annotation.
        annotation_uid: AnnotationUid,
        /// Group identifier within the annotation.
        group_uid: String,
        /// Canvas positions.
        points: Vec<Point2>,
        /// Stroke color.
        color: String,
        /// Dot radius in pixels.
        radius: f64,
    },
    /// A straight arrow.
    #[serde(rename_all = "camelCase")]
    Arrow {
        /// Owning annotation.
        annotation_uid: AnnotationUid,
        /// Arrow identifier within the annotation.
        arrow_uid: String,
        /// Tail.
        start: Point2,
        /// Head.
        end: Point2,
        /// Stroke color.
        color: String,
        /// Stroke width.
        width: f64,
    },
}

/// Receiver of emitted glyphs (the host's drawing layer).
pub trait GlyphSink {
    /// Draw one glyph.
    fn draw(&mut self, glyph: Glyph);
}

impl GlyphSink for Vec<Glyph> {
    fn draw(&mut self, glyph: Glyph) {
        self.push(glyph);
    }
}

/// Names identifying the tool to the style lookup.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Tool group the tool belongs to.
    pub tool_group_id: &'a str,
    /// Tool name; also the store key.
    pub tool_name: &'a str,
    /// Tool configuration.
    pub config: &'a ToolConfig,
}

/// Draw every interactable annotation of the tool on `viewport`.
///
/// Returns whether anything was drawn. If the rendering engine disappears
/// part way through, iteration stops and the status so far is returned.
///
/// # Errors
///
/// Returns an error if the configured handle radius is not numeric.
pub fn render_annotations<H>(
    cx: RenderContext<'_>,
    host: &H,
    viewport: &dyn Viewport,
    sink: &mut dyn GlyphSink,
) -> ToolResult<bool>
where
    H: AnnotationStore + StyleResolver + ?Sized,
{
    let mut render_status = false;

    let annotations = host.annotations(cx.tool_name, viewport.element());
    if annotations.is_empty() {
        return Ok(render_status);
    }
    let annotations = viewport.filter_interactable(annotations);
    if annotations.is_empty() {
        return Ok(render_status);
    }

    let radius = cx.config.handle_radius_px()?;

    for annotation in annotations {
        let specifier = StyleSpecifier {
            tool_group_id: cx.tool_group_id.to_string(),
            tool_name: cx.tool_name.to_string(),
            viewport_id: viewport.id().clone(),
            annotation_uid: annotation.annotation_uid,
        };
        let style = host.annotation_style(&specifier, annotation);

        if !viewport.rendering_engine_available() {
            tracing::warn!(
                "Rendering engine for viewport {} has been destroyed",
                viewport.id()
            );
            return Ok(render_status);
        }

        let glyph = if annotation.data.is_point {
            let Some(world) = annotation.handle() else {
                tracing::warn!("Annotation {} has no handle", annotation.annotation_uid);
                continue;
            };
            Glyph::Handles {
                annotation_uid: annotation.annotation_uid,
                group_uid: HANDLE_GROUP_UID.to_string(),
                points: vec![viewport.world_to_canvas(world)],
                color: style.color,
                radius,
            }
        } else {
            let anchor = cx.config.anchor();
            let size = cx.config.canvas_size;
            Glyph::Arrow {
                annotation_uid: annotation.annotation_uid,
                arrow_uid: ARROW_UID.to_string(),
                start: Point2::new(anchor.x + size, anchor.y + size),
                end: anchor,
                color: style.color,
                width: style.line_width,
            }
        };

        tracing::trace!("Render {:?}", glyph);
        sink.draw(glyph);
        render_status = true;
    }

    Ok(render_status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessHost, HeadlessViewport};
    use crate::host::AnnotationStore;
    use crate::{Annotation, AnnotationMetadata, Point3};

    const TOOL: &str = "KeyImage";

    fn annotation(is_point: bool, world: Point3) -> Annotation {
        Annotation::new(
            AnnotationMetadata {
                tool_name: TOOL.to_string(),
                frame_of_reference_uid: "default".to_string(),
                referenced_image_id: None,
                viewport_id: None,
            },
            world,
        )
        .with_is_point(is_point)
    }

    fn context(config: &ToolConfig) -> RenderContext<'_> {
        RenderContext {
            tool_group_id: "group",
            tool_name: TOOL,
            config,
        }
    }

    #[test]
    fn test_point_annotation_draws_handle_at_projection() {
        let config = ToolConfig::default();
        let viewport = HeadlessViewport::new("vp", "el").with_camera(Point2::new(40.0, 40.0), 2.0);
        let mut host = HeadlessHost::new();
        let point = annotation(true, Point3::new(5.0, 10.0, 0.0));
        let uid = point.annotation_uid;
        host.add_annotation(point, &viewport.element);

        let mut glyphs = Vec::new();
        let drawn = render_annotations(context(&config), &host, &viewport, &mut glyphs)
            .expect("should render");

        assert!(drawn);
        assert_eq!(glyphs.len(), 1);
        match &glyphs[0] {
            Glyph::Handles {
                annotation_uid,
                points,
                radius,
                ..
            } => {
                assert_eq!(*annotation_uid, uid);
                assert_eq!(points, &vec![Point2::new(50.0, 60.0)]);
                assert!((radius - 6.0).abs() < f64::EPSILON);
            }
            other => panic!("Expected handle glyph, got {other:?}"),
        }
    }

    #[test]
    fn test_arrow_annotation_ignores_world_geometry() {
        let config = ToolConfig {
            canvas_position: [10.0, 10.0],
            canvas_size: 10.0,
            ..ToolConfig::default()
        };
        let viewport = HeadlessViewport::new("vp", "el");
        let mut host = HeadlessHost::new();
        host.add_annotation(
            annotation(false, Point3::new(300.0, 300.0, 0.0)),
            &viewport.element,
        );

        let mut glyphs = Vec::new();
        assert!(render_annotations(context(&config), &host, &viewport, &mut glyphs)
            .expect("should render"));

        assert_eq!(glyphs.len(), 1);
        match &glyphs[0] {
            Glyph::Arrow {
                start, end, width, ..
            } => {
                assert_eq!(*start, Point2::new(20.0, 20.0));
                assert_eq!(*end, Point2::new(10.0, 10.0));
                assert!((width - 1.0).abs() < f64::EPSILON);
            }
            other => panic!("Expected arrow glyph, got {other:?}"),
        }
    }

    #[test]
    fn test_nothing_to_draw() {
        let config = ToolConfig::default();
        let viewport = HeadlessViewport::new("vp", "el");
        let mut host = HeadlessHost::new();
        let mut glyphs = Vec::new();

        assert!(!render_annotations(context(&config), &host, &viewport, &mut glyphs)
            .expect("should render"));

        let mut locked = annotation(true, Point3::default());
        locked.is_locked = true;
        host.add_annotation(locked, &viewport.element);
        let mut elsewhere = annotation(true, Point3::default());
        elsewhere.metadata.frame_of_reference_uid = "other".to_string();
        host.add_annotation(elsewhere, &viewport.element);

        assert!(!render_annotations(context(&config), &host, &viewport, &mut glyphs)
            .expect("should render"));
        assert!(glyphs.is_empty());
    }

    #[test]
    fn test_engine_destroyed_mid_render_stops_iteration() {
        let config = ToolConfig::default();
        let viewport = HeadlessViewport::new("vp", "el");
        let mut host = HeadlessHost::new();
        for _ in 0..3 {
            host.add_annotation(annotation(true, Point3::default()), &viewport.element);
        }

        viewport.destroy_engine_after(1);
        let mut glyphs = Vec::new();
        let drawn = render_annotations(context(&config), &host, &viewport, &mut glyphs)
            .expect("should render");

        assert!(drawn);
        assert_eq!(glyphs.len(), 1);
    }

    #[test]
    fn test_engine_gone_before_first_glyph() {
        let config = ToolConfig::default();
        let viewport = HeadlessViewport::new("vp", "el");
        let mut host = HeadlessHost::new();
        host.add_annotation(annotation(false, Point3::default()), &viewport.element);

        viewport.destroy_engine_after(0);
        let mut glyphs = Vec::new();
        assert!(!render_annotations(context(&config), &host, &viewport, &mut glyphs)
            .expect("should render"));
        assert!(glyphs.is_empty());
    }

    #[test]
    fn test_style_is_resolved_per_annotation() {
        let config = ToolConfig::default();
        let viewport = HeadlessViewport::new("vp", "el");
        let mut host = HeadlessHost::new();
        let arrow = annotation(false, Point3::default());
        let uid = arrow.annotation_uid;
        host.add_annotation(arrow, &viewport.element);
        host.set_style(
            uid,
            crate::host::AnnotationStyle {
                color: "red".to_string(),
                line_width: 3.0,
            },
        );

        let mut glyphs = Vec::new();
        render_annotations(context(&config), &host, &viewport, &mut glyphs)
            .expect("should render");
        match &glyphs[0] {
            Glyph::Arrow { color, width, .. } => {
                assert_eq!(color, "red");
                assert!((width - 3.0).abs() < f64::EPSILON);
            }
            other => panic!("Expected arrow glyph, got {other:?}"),
        }
    }
}
