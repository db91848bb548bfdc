//! Hand-built `notify` events for router tests.

use std::path::Path;

use notify::event::{
    AccessKind, CreateKind, DataChange, EventKind, MetadataKind, ModifyKind, RemoveKind,
    RenameMode,
};
use notify::Event;

fn event(kind: EventKind, path: &Path) -> Event {
    Event::new(kind).add_path(path.to_path_buf())
}

pub fn modified(path: &Path) -> Event {
    event(EventKind::Modify(ModifyKind::Data(DataChange::Content)), path)
}

pub fn created(path: &Path) -> Event {
    event(EventKind::Create(CreateKind::File), path)
}

pub fn removed(path: &Path) -> Event {
    event(EventKind::Remove(RemoveKind::File), path)
}

pub fn accessed(path: &Path) -> Event {
    event(EventKind::Access(AccessKind::Read), path)
}

pub fn metadata_changed(path: &Path) -> Event {
    event(EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)), path)
}

/// `mv from to`, reported as a single event with both paths.
pub fn renamed(from: &Path, to: &Path) -> Event {
    Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
        .add_path(from.to_path_buf())
        .add_path(to.to_path_buf())
}

pub fn renamed_away(from: &Path) -> Event {
    event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), from)
}
