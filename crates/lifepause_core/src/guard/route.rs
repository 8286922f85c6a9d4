//! Request path to module tag resolution.
//!
//! # Invariants
//! - Resolution is pure and allocation-free.
//! - The segment table is a closed constant; unknown segments resolve to `None`
//!   and therefore never trigger a freeze check.

use crate::model::module_tag::ModuleTag;

/// Bumped whenever [`MODULE_ROUTE_TABLE`] changes meaningfully.
pub const MODULE_ROUTE_TABLE_VERSION: u32 = 1;

/// Leading segment dropped before routing.
pub const API_PREFIX_SEGMENT: &str = "api";

/// Owner-scoping segment; it and the following owner id are skipped.
pub const OWNER_SCOPE_SEGMENT: &str = "users";

/// First resource segment -> feature module.
pub const MODULE_ROUTE_TABLE: &[(&str, ModuleTag)] = &[
    ("habits", ModuleTag::Habits),
    ("habit-logs", ModuleTag::Habits),
    ("habit-checkins", ModuleTag::Habits),
    ("routines", ModuleTag::Habits),
    ("tasks", ModuleTag::Tasks),
    ("todos", ModuleTag::Tasks),
    ("projects", ModuleTag::Tasks),
    ("goals", ModuleTag::Tasks),
    ("reminders", ModuleTag::Tasks),
    ("accounts", ModuleTag::Finance),
    ("transactions", ModuleTag::Finance),
    ("budgets", ModuleTag::Finance),
    ("categories", ModuleTag::Finance),
    ("investments", ModuleTag::Finance),
    ("debts", ModuleTag::Finance),
    ("credit-cards", ModuleTag::Finance),
    ("bills", ModuleTag::Finance),
    ("finance", ModuleTag::Finance),
    ("health", ModuleTag::Health),
    ("workouts", ModuleTag::Health),
    ("meals", ModuleTag::Health),
    ("sleep", ModuleTag::Health),
    ("water", ModuleTag::Health),
    ("medications", ModuleTag::Health),
    ("weight", ModuleTag::Health),
    ("study", ModuleTag::Studies),
    ("studies", ModuleTag::Studies),
    ("courses", ModuleTag::Studies),
    ("subjects", ModuleTag::Studies),
    ("flashcards", ModuleTag::Studies),
    ("exams", ModuleTag::Studies),
    ("work", ModuleTag::Work),
    ("meetings", ModuleTag::Work),
    ("clients", ModuleTag::Work),
    ("timesheets", ModuleTag::Work),
    ("social", ModuleTag::Social),
    ("contacts", ModuleTag::Social),
    ("social-events", ModuleTag::Social),
    ("home", ModuleTag::Home),
    ("chores", ModuleTag::Home),
    ("shopping-lists", ModuleTag::Home),
    ("pantry", ModuleTag::Home),
];

/// Resolves the feature module a request path belongs to.
///
/// `/api/users/<id>/habits/42?x=1` resolves to `Habits`; paths whose first
/// resource segment is not in the table resolve to `None`.
pub fn resolve_module(path: &str) -> Option<ModuleTag> {
    let path = path
        .split_once(['?', '#'])
        .map_or(path, |(before, _)| before);
    let mut segments = path.split('/').filter(|segment| !segment.is_empty()).peekable();

    if segments.peek() == Some(&API_PREFIX_SEGMENT) {
        segments.next();
    }
    if segments.peek() == Some(&OWNER_SCOPE_SEGMENT) {
        segments.next();
        segments.next()?;
    }

    lookup_segment(segments.next()?)
}

/// Looks one resource segment up in the route table (ASCII case-insensitive).
pub fn lookup_segment(segment: &str) -> Option<ModuleTag> {
    MODULE_ROUTE_TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(segment))
        .map(|(_, tag)| *tag)
}

#[cfg(test)]
mod tests {
    use super::{lookup_segment, resolve_module, MODULE_ROUTE_TABLE};
    use crate::model::module_tag::ModuleTag;
    use std::collections::HashSet;

    #[test]
    fn table_segments_are_unique_and_lowercase() {
        let mut seen = HashSet::new();
        for (segment, _) in MODULE_ROUTE_TABLE {
            assert_eq!(*segment, segment.to_ascii_lowercase());
            assert!(seen.insert(*segment), "duplicate segment {segment}");
        }
    }

    #[test]
    fn every_module_is_reachable() {
        for tag in ModuleTag::ALL {
            assert!(
                MODULE_ROUTE_TABLE.iter().any(|(_, mapped)| *mapped == tag),
                "{tag} has no route segment"
            );
        }
    }

    #[test]
    fn lookup_ignores_ascii_case() {
        assert_eq!(lookup_segment("Transactions"), Some(ModuleTag::Finance));
        assert_eq!(lookup_segment("nothing"), None);
    }

    #[test]
    fn strips_query_and_fragment() {
        assert_eq!(resolve_module("/api/study?page=2"), Some(ModuleTag::Studies));
        assert_eq!(resolve_module("/api/chores#top"), Some(ModuleTag::Home));
    }

    #[test]
    fn owner_scope_without_resource_is_unmapped() {
        assert_eq!(resolve_module("/api/users"), None);
        assert_eq!(resolve_module("/api/users/abc"), None);
    }
}
