//! Create, finalize, and remove transitions for key image annotations.

use crate::host::{ToolHost, Viewport};
use crate::{
    Annotation, AnnotationMetadata, AnnotationUid, Point3, ToolConfig, ToolError, ToolResult,
};

/// Build an annotation at `world`, store it, and schedule a render.
pub fn create_at_world_point(
    host: &mut dyn ToolHost,
    viewport: &dyn Viewport,
    tool_name: &str,
    config: &ToolConfig,
    world: Point3,
) -> AnnotationUid {
    let metadata = AnnotationMetadata {
        tool_name: tool_name.to_string(),
        frame_of_reference_uid: viewport.frame_of_reference_uid().to_string(),
        referenced_image_id: viewport.current_image_id().map(str::to_string),
        viewport_id: Some(viewport.id().clone()),
    };
    let annotation = Annotation::new(metadata, world)
        .with_is_point(config.is_point)
        .with_series_level(config.series_level);
    let uid = annotation.annotation_uid;
    let element = viewport.element();

    host.add_annotation(annotation, element);
    tracing::debug!("Created {tool_name} annotation {uid} on {element}");

    let viewport_ids = host.viewport_ids_with_tool_to_render(element, tool_name);
    host.request_render(&viewport_ids);
    uid
}

/// Drop a new annotation whose label was never confirmed.
pub fn cancel_pending_text(host: &mut dyn ToolHost, uid: AnnotationUid) -> Option<Annotation> {
    let removed = host.remove_annotation(uid);
    if removed.is_some() {
        tracing::debug!("Discarded annotation {uid}: no text entered");
    }
    removed
}

/// Attach the confirmed label and announce the annotation as completed.
///
/// # Errors
///
/// Returns [`ToolError::AnnotationNotFound`] if the annotation is gone.
pub fn finalize(host: &mut dyn ToolHost, uid: AnnotationUid, text: String) -> ToolResult<()> {
    let annotation = host
        .annotation_mut(uid)
        .ok_or(ToolError::AnnotationNotFound(uid))?;
    annotation.data.text = Some(text);
    let completed = annotation.clone();
    host.annotation_completed(&completed);
    tracing::debug!("Completed annotation {uid}");
    Ok(())
}

/// Remove an annotation from the store.
pub fn remove(host: &mut dyn ToolHost, uid: AnnotationUid) -> Option<Annotation> {
    let removed = host.remove_annotation(uid);
    if removed.is_none() {
        tracing::warn!("Annotation {uid} already removed");
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessHost, HeadlessViewport, Notification};
    use crate::host::AnnotationStore;

    #[test]
    fn test_create_takes_metadata_from_viewport() {
        let viewport = HeadlessViewport::new("vp", "el").with_image("img-7");
        let mut host = HeadlessHost::new();
        host.register_viewport(&viewport.element, viewport.id.clone());
        let config = ToolConfig {
            series_level: true,
            ..ToolConfig::default()
        };

        let uid = create_at_world_point(
            &mut host,
            &viewport,
            "KeyImage",
            &config,
            Point3::new(1.0, 2.0, 3.0),
        );

        let created = host.annotation(uid).expect("stored");
        assert_eq!(created.metadata.referenced_image_id.as_deref(), Some("img-7"));
        assert_eq!(created.metadata.viewport_id, Some(viewport.id.clone()));
        assert!(created.data.series_level);
        assert!(!created.data.is_point);
        assert_eq!(created.data.text, None);
        assert_eq!(host.render_requests().len(), 1);
        assert!(host.notifications().is_empty());
    }

    #[test]
    fn test_finalize_sets_text_and_completes() {
        let viewport = HeadlessViewport::new("vp", "el");
        let mut host = HeadlessHost::new();
        let uid = create_at_world_point(
            &mut host,
            &viewport,
            "KeyImage",
            &ToolConfig::default(),
            Point3::default(),
        );

        finalize(&mut host, uid, "Spleen".to_string()).expect("should finalize");
        assert_eq!(
            host.annotation(uid).and_then(|a| a.data.text.as_deref()),
            Some("Spleen")
        );
        assert_eq!(
            host.notifications(),
            &[Notification::Completed {
                annotation_uid: uid
            }]
        );

        assert!(remove(&mut host, uid).is_some());
        assert!(matches!(
            finalize(&mut host, uid, "late".to_string()),
            Err(ToolError::AnnotationNotFound(_))
        ));
        assert!(cancel_pending_text(&mut host, uid).is_none());
    }
}
