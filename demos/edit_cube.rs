//! Click the cube to select it, Tab to edit. 1/2/3 switch between vertex,
//! edge and face selection, G drags, K toggles the knife (Q switches quad or
//! triangle cuts, Enter commits), Ctrl+Z undoes.

use bevy::prelude::*;
use quadrille::commands::CommandHistory;
use quadrille::object_ops::spawn_object;
use quadrille::{EditNotice, EditorCamera, MeshEditPlugin};

fn main() {
    App::new()
        .add_plugins((DefaultPlugins, MeshEditPlugin))
        .add_systems(Startup, setup)
        .add_systems(Update, show_notices)
        .run();
}

fn setup(world: &mut World) {
    world.spawn((
        Camera3d::default(),
        EditorCamera,
        Transform::from_xyz(3.0, 2.5, 4.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    world.spawn((
        DirectionalLight::default(),
        Transform::from_xyz(4.0, 8.0, 2.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let mesh = world.resource_mut::<Assets<Mesh>>().add(Cuboid::default());
    let material = world
        .resource_mut::<Assets<StandardMaterial>>()
        .add(Color::srgb(0.7, 0.7, 0.75));
    spawn_object(world, "Cube", Transform::default(), mesh, Some(material));
    world.resource_mut::<CommandHistory>().clear();
}

fn show_notices(mut notices: MessageReader<EditNotice>) {
    for notice in notices.read() {
        info!("{}", notice.message);
    }
}
