use crate::recurrence::RecurrenceKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DESCRIPTION: &str = "Maintenance created via AI Widget";

/// Inline ticket annotation embedded in a description, with an optional
/// leading dash: "... - Ticket: 200-8341".
static INLINE_TICKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*[-\u{2013}\u{2014}]?\s*Ticket:\s*\d{3}-\d{3,6}\s*").unwrap());

/// Ticket formats recognised in free text: "100-178306",
/// "ticket: 100-178306", "#100-178306".
static TICKET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"\b(\d{3}-\d{3,6})\b").unwrap(),
        Regex::new(r"(?i)\bticket\s*:?\s*(\d{3}-\d{3,6})\b").unwrap(),
        Regex::new(r"#(\d{3}-\d{3,6})\b").unwrap(),
    ]
});

/// Identity of the person the maintenance is created on behalf of.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Requester {
    pub userid: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
}

impl Requester {
    /// "first last" when either part is present, else the account handle,
    /// else "Unknown user".
    pub fn display_name(&self) -> String {
        let full: Vec<&str> = [self.name.as_deref(), self.surname.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();
        if !full.is_empty() {
            return full.join(" ");
        }
        match self.username.as_deref() {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => "Unknown user".to_string(),
        }
    }
}

/// Scan free text for a ticket number.
pub fn extract_ticket(text: &str) -> Option<String> {
    TICKET_PATTERNS
        .iter()
        .find_map(|p| p.captures(text))
        .map(|c| c[1].to_string())
}

/// Remove an embedded "Ticket: NNN-NNNNNN" annotation from a description.
pub fn strip_inline_ticket(text: &str) -> String {
    INLINE_TICKET.replace_all(text, "").trim().to_string()
}

/// Build the structured multi-line maintenance description: the cleaned
/// free text, a `Ticket:` line when a ticket is known (supplied or
/// recovered from the text), and a `User:` line when the requester is.
pub fn build_description(
    ticket: Option<&str>,
    free_text: &str,
    requester: Option<&Requester>,
) -> String {
    let cleaned = strip_inline_ticket(free_text);

    let ticket = match ticket.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => Some(t.to_string()),
        None => extract_ticket(free_text),
    };

    let mut lines = vec![if cleaned.is_empty() {
        DEFAULT_DESCRIPTION.to_string()
    } else {
        cleaned
    }];

    if let Some(ticket) = ticket {
        lines.push(format!("Ticket: {}", ticket));
    }

    if let Some(requester) = requester {
        lines.push(format!("User: {}", requester.display_name()));
    }

    lines.join("\n")
}

/// Derive the maintenance name. A ticket always wins over resource-derived
/// naming; otherwise the name lists the first few hosts and groups.
pub fn build_name(
    ticket: Option<&str>,
    kind: RecurrenceKind,
    host_names: &[String],
    group_names: &[String],
) -> String {
    let prefix = if kind.is_routine() {
        "AI Routine Maintenance"
    } else {
        "AI Maintenance"
    };

    if let Some(ticket) = ticket.map(str::trim).filter(|t| !t.is_empty()) {
        return format!("{}: {}", prefix, ticket);
    }

    let mut parts: Vec<String> = Vec::new();

    parts.extend(host_names.iter().take(3).cloned());
    if host_names.len() > 3 {
        parts.push(format!("and {} hosts more", host_names.len() - 3));
    }

    parts.extend(group_names.iter().take(2).map(|g| format!("Group {}", g)));
    if group_names.len() > 2 {
        parts.push(format!("and {} more Groups", group_names.len() - 2));
    }

    if parts.is_empty() {
        format!("{}: Various resources", prefix)
    } else {
        format!("{}: {}", prefix, parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_ticket_formats() {
        assert_eq!(
            extract_ticket("maintenance for ticket 100-178306 tomorrow"),
            Some("100-178306".to_string())
        );
        assert_eq!(
            extract_ticket("Ticket: 200-8341"),
            Some("200-8341".to_string())
        );
        assert_eq!(
            extract_ticket("see #500-43116 for details"),
            Some("500-43116".to_string())
        );
        assert_eq!(extract_ticket("no ticket here"), None);
        // Too few digits on either side of the dash.
        assert_eq!(extract_ticket("12-345"), None);
    }

    #[test]
    fn test_strip_inline_ticket() {
        assert_eq!(
            strip_inline_ticket("Patch servers - Ticket: 200-8341"),
            "Patch servers"
        );
        assert_eq!(
            strip_inline_ticket("Patch servers \u{2013} ticket: 200-8341"),
            "Patch servers"
        );
        assert_eq!(strip_inline_ticket("Patch servers"), "Patch servers");
    }

    #[test]
    fn test_description_recovers_ticket_from_text() {
        let out = build_description(None, "Patch servers - Ticket: 200-8341", None);
        assert_eq!(out, "Patch servers\nTicket: 200-8341");
    }

    #[test]
    fn test_description_explicit_ticket_wins() {
        let out = build_description(Some("100-178306"), "Patch servers", None);
        assert_eq!(out, "Patch servers\nTicket: 100-178306");
    }

    #[test]
    fn test_description_defaults_when_empty() {
        let requester = Requester {
            username: Some("jdoe".to_string()),
            ..Default::default()
        };
        let out = build_description(None, "", Some(&requester));
        assert_eq!(out, format!("{}\nUser: jdoe", DEFAULT_DESCRIPTION));
    }

    #[test]
    fn test_description_defaults_when_only_ticket_annotation() {
        // Stripping the annotation leaves nothing; the default text takes
        // over but the ticket is still recovered.
        let out = build_description(None, "Ticket: 100-178306", None);
        assert_eq!(out, format!("{}\nTicket: 100-178306", DEFAULT_DESCRIPTION));
    }

    #[test]
    fn test_requester_display_name() {
        let full = Requester {
            name: Some("Grover".to_string()),
            surname: Some("Tuxito".to_string()),
            username: Some("gtuxito".to_string()),
            ..Default::default()
        };
        assert_eq!(full.display_name(), "Grover Tuxito");

        let first_only = Requester {
            name: Some("Grover".to_string()),
            ..Default::default()
        };
        assert_eq!(first_only.display_name(), "Grover");

        let handle_only = Requester {
            username: Some("gtuxito".to_string()),
            ..Default::default()
        };
        assert_eq!(handle_only.display_name(), "gtuxito");

        assert_eq!(Requester::default().display_name(), "Unknown user");
    }

    #[test]
    fn test_name_ticket_takes_priority() {
        let name = build_name(
            Some("100-178306"),
            RecurrenceKind::Once,
            &names(&["a", "b", "c", "d"]),
            &names(&["g1"]),
        );
        assert_eq!(name, "AI Maintenance: 100-178306");
    }

    #[test]
    fn test_name_routine_prefix_and_host_truncation() {
        let name = build_name(
            None,
            RecurrenceKind::Weekly,
            &names(&["a", "b", "c", "d"]),
            &[],
        );
        assert_eq!(name, "AI Routine Maintenance: a, b, c, and 1 hosts more");
    }

    #[test]
    fn test_name_groups_after_hosts() {
        let name = build_name(
            None,
            RecurrenceKind::Once,
            &names(&["srv-1"]),
            &names(&["db", "web", "app"]),
        );
        assert_eq!(
            name,
            "AI Maintenance: srv-1, Group db, Group web, and 1 more Groups"
        );
    }

    #[test]
    fn test_name_fallback_without_resources() {
        let name = build_name(None, RecurrenceKind::Monthly, &[], &[]);
        assert_eq!(name, "AI Routine Maintenance: Various resources");
    }

    #[test]
    fn test_name_blank_ticket_is_ignored() {
        let name = build_name(Some("   "), RecurrenceKind::Once, &names(&["srv-1"]), &[]);
        assert_eq!(name, "AI Maintenance: srv-1");
    }
}
