use bevy::picking::mesh_picking::ray_cast::{MeshRayCast, MeshRayCastSettings, RayCastVisibility};
use bevy::prelude::*;
use quadrille_geometry::{FacePlane, plane_line_intersection};

use super::{
    ActiveTool, EditMode, MeshSelection, PickHit, SelectionMode, ViewportClick, enter_edit_mode, exit_edit_mode,
    report,
};
use crate::EditorCamera;
use crate::commands::{CommandHistory, SetTopology, cancel_pending_edit};
use crate::error::{EditNotice, MeshEditError, Result, ValidationFailure};
use crate::knife::KnifeCut;
use crate::mesh_registry::{EditableMesh, MeshRegistry};
use crate::qmesh::{FaceId, QMesh};
use crate::selection::ObjectSelection;
use crate::settings::MeshEditSettings;
use crate::transaction::{ActiveEdit, PendingEdit};
use crate::vertex_drag::{DragConstraint, VertexDrag, compute_drag_offset};
use crate::viewport_util::{additive_modifier, ctrl_pressed, cursor_ray};

type EditorCameras<'w, 's> = Query<'w, 's, (&'static Camera, &'static GlobalTransform), With<EditorCamera>>;

// ---------------------------------------------------------------------------
// Mode and tool keys
// ---------------------------------------------------------------------------

pub(super) fn handle_edit_mode_keys(world: &mut World) {
    let keyboard = world.resource::<ButtonInput<KeyCode>>();
    let tab = keyboard.just_pressed(KeyCode::Tab);
    let ctrl = ctrl_pressed(keyboard);
    let mode_key = [
        (KeyCode::Digit1, SelectionMode::Vertex),
        (KeyCode::Digit2, SelectionMode::Edge),
        (KeyCode::Digit3, SelectionMode::Face),
    ]
    .into_iter()
    .find(|(key, _)| keyboard.just_pressed(*key))
    .map(|(_, mode)| mode);
    let knife = keyboard.just_pressed(KeyCode::KeyK) && !ctrl;

    let edit_mode = *world.resource::<EditMode>();
    if tab {
        match edit_mode {
            EditMode::Object => {
                let Some(entity) = world.resource::<ObjectSelection>().primary() else {
                    return;
                };
                match enter_edit_mode(world, entity) {
                    Ok(object) => info!("Entered edit mode on {object}"),
                    Err(err) => report(world, "Enter edit mode", &err),
                }
            }
            EditMode::Mesh(_) => {
                exit_edit_mode(world);
                info!("Back to object mode");
            }
        }
        return;
    }

    let EditMode::Mesh(current) = edit_mode else {
        return;
    };
    if let Some(mode) = mode_key.filter(|mode| *mode != current) {
        *world.resource_mut::<EditMode>() = EditMode::Mesh(mode);
        world.resource_mut::<MeshSelection>().last_mode = mode;
        debug!("Selection mode: {mode:?}");
    }

    if !knife {
        return;
    }
    let tool = match *world.resource::<ActiveTool>() {
        ActiveTool::Select => ActiveTool::Knife,
        ActiveTool::Knife => ActiveTool::Select,
    };
    cancel_pending_edit(world);
    *world.resource_mut::<ActiveTool>() = tool;
    info!("Tool: {tool:?}");
}

// ---------------------------------------------------------------------------
// Viewport clicks
// ---------------------------------------------------------------------------

/// Turn a left click over the viewport into a [`ViewportClick`] against the
/// object in edit mode.
pub(super) fn emit_viewport_clicks(
    mouse: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    edit_mode: Res<EditMode>,
    selection: Res<MeshSelection>,
    registry: Res<MeshRegistry>,
    windows: Query<&Window>,
    cameras: EditorCameras,
    mut ray_cast: MeshRayCast,
    mut clicks: MessageWriter<ViewportClick>,
) {
    if !mouse.just_pressed(MouseButton::Left) || *edit_mode == EditMode::Object {
        return;
    }
    let Some(entity) = selection.object.and_then(|object| registry.entity(object)) else {
        return;
    };
    let Some((_, ray)) = cursor_ray(&windows, &cameras) else {
        return;
    };
    clicks.write(ViewportClick {
        ray,
        hit: cast_at(&mut ray_cast, ray, entity),
        additive: additive_modifier(&keyboard),
    });
}

/// First hit on `entity` along `ray`, with its render-triangle index.
fn cast_at(ray_cast: &mut MeshRayCast, ray: Ray3d, entity: Entity) -> Option<PickHit> {
    let filter = |e: Entity| e == entity;
    let settings = MeshRayCastSettings::default()
        .with_visibility(RayCastVisibility::Any)
        .with_filter(&filter);
    let (_, hit) = ray_cast.cast_ray(ray, &settings).first()?;
    Some(PickHit {
        triangle: hit.triangle_index?,
        point: hit.point,
    })
}

// ---------------------------------------------------------------------------
// Element picking
// ---------------------------------------------------------------------------

pub(super) fn handle_mesh_pick(
    mut clicks: MessageReader<ViewportClick>,
    edit_mode: Res<EditMode>,
    tool: Res<ActiveTool>,
    active: Res<ActiveEdit>,
    mut selection: ResMut<MeshSelection>,
    registry: Res<MeshRegistry>,
    settings: Res<MeshEditSettings>,
    meshes: Query<(&EditableMesh, &GlobalTransform)>,
) {
    let clicks: Vec<ViewportClick> = clicks.read().copied().collect();
    if *tool != ActiveTool::Select || active.drag().is_some() {
        return;
    }
    let Some(mode) = edit_mode.selection_mode() else {
        return;
    };
    let Some(entity) = selection.object.and_then(|object| registry.entity(object)) else {
        return;
    };
    let Ok((editable, to_world)) = meshes.get(entity) else {
        return;
    };

    for click in clicks {
        match click.hit {
            None => selection.apply_pick(mode, None, click.additive),
            Some(hit) => match super::resolve_pick(&editable.mesh, to_world, mode, hit, &settings) {
                Ok(target) => selection.apply_pick(mode, target, click.additive),
                Err(err) => err.log("Pick"),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Knife tool (K)
// ---------------------------------------------------------------------------

pub(super) fn handle_knife_tool(
    mut clicks: MessageReader<ViewportClick>,
    keyboard: Res<ButtonInput<KeyCode>>,
    edit_mode: Res<EditMode>,
    tool: Res<ActiveTool>,
    mut active: ResMut<ActiveEdit>,
    mut selection: ResMut<MeshSelection>,
    registry: Res<MeshRegistry>,
    mut settings: ResMut<MeshEditSettings>,
    mut meshes: Query<(&mut EditableMesh, &GlobalTransform)>,
    mut history: ResMut<CommandHistory>,
    mut notices: MessageWriter<EditNotice>,
) {
    let clicks: Vec<ViewportClick> = clicks.read().copied().collect();
    if *edit_mode == EditMode::Object || *tool != ActiveTool::Knife {
        return;
    }
    let Some(object) = selection.object else {
        return;
    };
    let Some(entity) = registry.entity(object) else {
        return;
    };
    let Ok((mut editable, to_world)) = meshes.get_mut(entity) else {
        return;
    };

    if keyboard.just_pressed(KeyCode::Escape) {
        if active.knife().is_some() {
            active.cancel(&mut editable.mesh);
            info!("Knife cut cancelled");
        }
        return;
    }

    if keyboard.just_pressed(KeyCode::KeyQ) {
        settings.cut_mode = settings.cut_mode.toggled();
        info!("Cut mode: {:?}", settings.cut_mode);
        if let Some(knife) = active.knife_mut()
            && let Err(err) = knife.set_mode(&editable.mesh, settings.cut_mode, &settings)
        {
            err.log("Knife");
            notices.write(EditNotice::from_error("Knife", &err));
        }
        return;
    }

    if keyboard.just_pressed(KeyCode::Enter) {
        let Some(PendingEdit::Knife(knife)) = active.take() else {
            return;
        };
        let before = editable.mesh.snapshot();
        match knife.commit(&mut editable.mesh) {
            Ok(outcome) => {
                history.record(Box::new(SetTopology {
                    object,
                    before,
                    after: editable.mesh.snapshot(),
                    label: "Knife cut".to_string(),
                }));
                selection.prune(&editable.mesh);
                selection.faces.extend(outcome.added_faces);
            }
            Err(err) => {
                err.log("Knife");
                notices.write(EditNotice::from_error("Knife", &err));
            }
        }
        return;
    }

    for click in clicks {
        let target = match active.knife() {
            Some(knife) => Some(knife.target().clone()),
            None if selection.faces.len() == 1 => selection.faces.iter().next().cloned(),
            None => click
                .hit
                .and_then(|hit| editable.mesh.face_for_triangle(hit.triangle).ok().cloned()),
        };
        let Some(target) = target else {
            let err = MeshEditError::from(ValidationFailure::NoTarget);
            err.log("Knife");
            notices.write(EditNotice::from_error("Knife", &err));
            continue;
        };

        let point = match knife_point(&editable.mesh, &target, click.ray, to_world, &settings) {
            Ok(Some(point)) => point,
            Ok(None) => continue,
            Err(err) => {
                err.log("Knife");
                continue;
            }
        };

        if active.knife().is_none() {
            active.begin(
                PendingEdit::Knife(KnifeCut::new(target, settings.cut_mode)),
                &mut editable.mesh,
            );
        }
        let Some(knife) = active.knife_mut() else {
            continue;
        };
        match knife.add_point(&editable.mesh, point, &settings) {
            Ok(phase) => debug!("Knife: {phase:?}"),
            Err(err) => {
                err.log("Knife");
                notices.write(EditNotice::from_error("Knife", &err));
            }
        }
    }
}

/// Where `ray` meets the plane of `face`, snapped to its corners and edges,
/// in object space.
fn knife_point(
    mesh: &QMesh,
    face: &FaceId,
    ray: Ray3d,
    to_world: &GlobalTransform,
    settings: &MeshEditSettings,
) -> Result<Option<Vec3>> {
    let world: Vec<Vec3> = mesh
        .face_positions(face)?
        .into_iter()
        .map(|p| to_world.transform_point(p))
        .collect();
    let plane = FacePlane::from_polygon(&world)
        .ok_or_else(|| MeshEditError::InvariantViolation(format!("face {face} has zero area")))?;
    let Some(hit) = plane_line_intersection(ray, &plane) else {
        return Ok(None);
    };
    let snapped = super::snap_knife_point(mesh, face, hit, to_world, settings)?;
    Ok(Some(to_world.affine().inverse().transform_point3(snapped)))
}

// ---------------------------------------------------------------------------
// Vertex drag (G)
// ---------------------------------------------------------------------------

pub(super) fn handle_vertex_drag(
    keyboard: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
    edit_mode: Res<EditMode>,
    tool: Res<ActiveTool>,
    windows: Query<&Window>,
    cameras: EditorCameras,
    mut active: ResMut<ActiveEdit>,
    selection: Res<MeshSelection>,
    registry: Res<MeshRegistry>,
    settings: Res<MeshEditSettings>,
    mut meshes: Query<(&mut EditableMesh, &GlobalTransform)>,
    mut history: ResMut<CommandHistory>,
) {
    let Some(mode) = edit_mode.selection_mode() else {
        return;
    };
    if *tool != ActiveTool::Select {
        return;
    }
    let Some(object) = selection.object else {
        return;
    };
    let Some(entity) = registry.entity(object) else {
        return;
    };
    let Ok((mut editable, object_tf)) = meshes.get_mut(entity) else {
        return;
    };

    if active.drag().is_some() {
        if keyboard.just_pressed(KeyCode::Escape) || mouse.just_pressed(MouseButton::Right) {
            active.cancel(&mut editable.mesh);
            info!("Vertex drag cancelled");
            return;
        }
        if mouse.just_pressed(MouseButton::Left) || keyboard.just_pressed(KeyCode::Enter) {
            if let Some(PendingEdit::VertexDrag(drag)) = active.take()
                && let Some(command) = drag.finish(&editable.mesh, object)
            {
                info!("Moved {} vertices", command.new.len());
                history.record(Box::new(command));
            }
            return;
        }
    }

    let Some((cursor, _)) = cursor_ray(&windows, &cameras) else {
        return;
    };
    let Ok((camera, cam_tf)) = cameras.single() else {
        return;
    };

    if keyboard.just_pressed(KeyCode::KeyG) && active.drag().is_none() {
        let affected = selection.affected_vertices(mode, &editable.mesh);
        match VertexDrag::start(&editable.mesh, affected) {
            Ok(drag) => active.begin(PendingEdit::VertexDrag(drag.with_cursor(cursor)), &mut editable.mesh),
            Err(err) => err.log("Start vertex drag"),
        }
        return;
    }

    let Some(drag) = active.drag_mut() else {
        return;
    };
    // Same axis key again returns to free movement.
    if !ctrl_pressed(&keyboard) {
        for (key, axis) in [
            (KeyCode::KeyX, DragConstraint::AxisX),
            (KeyCode::KeyY, DragConstraint::AxisY),
            (KeyCode::KeyZ, DragConstraint::AxisZ),
        ] {
            if keyboard.just_pressed(key) {
                drag.constraint = drag.constraint.toggled(axis);
            }
        }
    }

    let mouse_delta = cursor - drag.start_cursor;
    let Some(offset) = compute_drag_offset(
        drag.constraint,
        mouse_delta,
        cam_tf,
        camera,
        object_tf,
        settings.drag_sensitivity,
    ) else {
        return;
    };
    if let Err(err) = drag.change(&mut editable.mesh, offset) {
        err.log("Vertex drag");
    }
}
