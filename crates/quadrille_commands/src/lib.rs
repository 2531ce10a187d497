use bevy::prelude::*;

// ---------------------------------------------------------------------------
// EditorCommand trait
// ---------------------------------------------------------------------------

/// An invertible edit. `apply` moves the world to the post-edit state and
/// `revert` restores the pre-edit state; both must be repeatable so the
/// command can cycle between the undo and redo stacks.
pub trait EditorCommand: Send + Sync + 'static {
    fn apply(&mut self, world: &mut World);
    fn revert(&mut self, world: &mut World);
    fn description(&self) -> &str;
}

// ---------------------------------------------------------------------------
// CommandHistory resource
// ---------------------------------------------------------------------------

/// Linear undo/redo history. Recording a new command discards everything
/// that was undone before it.
#[derive(Resource, Default)]
pub struct CommandHistory {
    pub undo_stack: Vec<Box<dyn EditorCommand>>,
    pub redo_stack: Vec<Box<dyn EditorCommand>>,
}

impl CommandHistory {
    /// Apply `command` and record it.
    pub fn execute(&mut self, mut command: Box<dyn EditorCommand>, world: &mut World) {
        command.apply(world);
        self.record(command);
    }

    /// Record a command whose effect is already present in the world, e.g.
    /// the end of an interactive drag.
    pub fn record(&mut self, command: Box<dyn EditorCommand>) {
        self.undo_stack.push(command);
        self.redo_stack.clear();
    }

    /// Returns the description of the undone command.
    pub fn undo(&mut self, world: &mut World) -> Option<String> {
        let mut command = self.undo_stack.pop()?;
        command.revert(world);
        let description = command.description().to_string();
        self.redo_stack.push(command);
        Some(description)
    }

    /// Returns the description of the redone command.
    pub fn redo(&mut self, world: &mut World) -> Option<String> {
        let mut command = self.redo_stack.pop()?;
        command.apply(world);
        let description = command.description().to_string();
        self.undo_stack.push(command);
        Some(description)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

// ---------------------------------------------------------------------------
// CommandGroup: atomic multi-step command
// ---------------------------------------------------------------------------

pub struct CommandGroup {
    pub commands: Vec<Box<dyn EditorCommand>>,
    pub label: String,
}

impl EditorCommand for CommandGroup {
    fn apply(&mut self, world: &mut World) {
        for cmd in &mut self.commands {
            cmd.apply(world);
        }
    }

    fn revert(&mut self, world: &mut World) {
        for cmd in self.commands.iter_mut().rev() {
            cmd.revert(world);
        }
    }

    fn description(&self) -> &str {
        &self.label
    }
}
