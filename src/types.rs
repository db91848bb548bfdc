use std::fmt;

use clap::ValueEnum;

/// Which half of a repository's tracker/seeder pair a process plays.
///
/// The lowercase name doubles as the prefix of the pid file
/// (`tracker_6969.pid`, `seeder_6969.pid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Tracker,
    Seeder,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Tracker => "tracker",
            Role::Seeder => "seeder",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a watch loop does with change notifications that pile up while a
/// reconciliation is in flight.
///
/// - `Queue`: every delivered notification is reconciled, in order.
/// - `Coalesce`: notifications already buffered when the loop wakes up are
///   collapsed into a single reconciliation (default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ChangePolicy {
    Queue,
    #[default]
    Coalesce,
}
