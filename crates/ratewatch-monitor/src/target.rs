//! Notification target resolution.

use ratewatch_protocols::{GroupInfo, MessagingClient, NotifyTarget};
use tracing::{info, warn};

/// Anything beyond ASCII digits, `-` and `_` marks the input as a group name or id.
pub fn is_group_identifier(input: &str) -> bool {
    input
        .chars()
        .any(|c| !(c.is_ascii_digit() || c == '-' || c == '_'))
}

/// First group whose name, short id or full id contains `input`, ignoring case.
pub fn match_group<'a>(input: &str, groups: &'a [GroupInfo]) -> Option<&'a GroupInfo> {
    let needle = input.to_lowercase();
    groups.iter().find(|group| {
        [&group.name, &group.short_id, &group.id]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    })
}

/// Group with exactly this short id or full id, else the first substring match.
pub fn find_group<'a>(id: &str, groups: &'a [GroupInfo]) -> Option<&'a GroupInfo> {
    groups
        .iter()
        .find(|group| group.short_id == id || group.id == id)
        .or_else(|| match_group(id, groups))
}

/// Resolve user input into a target.
///
/// Group identifiers are looked up among the joined groups; anything that
/// does not resolve becomes a personal target with the original input.
pub async fn resolve_target(client: &dyn MessagingClient, input: &str) -> NotifyTarget {
    let input = input.trim();
    if !is_group_identifier(input) {
        return NotifyTarget::Personal(input.to_string());
    }

    match client.list_groups().await {
        Ok(groups) => match match_group(input, &groups) {
            Some(group) => {
                info!(group = %group.name, id = %group.short_id, "Resolved notify target to group");
                NotifyTarget::Group(group.short_id.clone())
            }
            None => {
                warn!(input, "No joined group matches; sending to it as a personal chat");
                NotifyTarget::Personal(input.to_string())
            }
        },
        Err(e) => {
            warn!(input, error = %e, "Failed to list groups; sending to it as a personal chat");
            NotifyTarget::Personal(input.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeClient;

    fn groups() -> Vec<GroupInfo> {
        vec![GroupInfo::new("123", "Family"), GroupInfo::new("456", "Work")]
    }

    #[test]
    fn test_is_group_identifier() {
        assert!(!is_group_identifier("999"));
        assert!(!is_group_identifier("-100_200"));
        assert!(!is_group_identifier(""));
        assert!(is_group_identifier("fam"));
        assert!(is_group_identifier("12a"));
        assert!(is_group_identifier("1 2"));
    }

    #[test]
    fn test_match_group_case_insensitive() {
        let groups = groups();
        assert_eq!(match_group("fam", &groups).map(|g| g.id.as_str()), Some("123"));
        assert_eq!(match_group("WORK", &groups).map(|g| g.id.as_str()), Some("456"));
    }

    #[test]
    fn test_match_group_by_short_id_and_id() {
        let groups = vec![
            GroupInfo::new("-100987654", "Alerts").with_short_id("987654"),
            GroupInfo::new("456", "Work"),
        ];
        assert_eq!(
            match_group("987", &groups).map(|g| g.name.as_str()),
            Some("Alerts")
        );
        assert_eq!(
            match_group("-100", &groups).map(|g| g.name.as_str()),
            Some("Alerts")
        );
    }

    #[test]
    fn test_match_group_first_wins() {
        let groups = vec![GroupInfo::new("1", "Team A"), GroupInfo::new("2", "Team B")];
        assert_eq!(match_group("team", &groups).map(|g| g.id.as_str()), Some("1"));
    }

    #[test]
    fn test_find_group_prefers_exact_id() {
        let groups = vec![
            GroupInfo::new("-1001234", "Other"),
            GroupInfo::new("-100123", "Family"),
        ];
        assert_eq!(
            find_group("-100123", &groups).map(|g| g.name.as_str()),
            Some("Family")
        );
        assert_eq!(
            find_group("oth", &groups).map(|g| g.name.as_str()),
            Some("Other")
        );
        assert!(find_group("school", &groups).is_none());
    }

    #[test]
    fn test_match_group_none() {
        assert!(match_group("999", &groups()).is_none());
        assert!(match_group("school", &groups()).is_none());
    }

    #[tokio::test]
    async fn test_resolve_group_by_name() {
        let client = FakeClient::new().with_groups(groups());
        let target = resolve_target(&client, "fam").await;
        assert_eq!(target, NotifyTarget::Group("123".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_resolves_to_short_id() {
        let client = FakeClient::new()
            .with_groups(vec![GroupInfo::new("full-777", "Family").with_short_id("777")]);
        let target = resolve_target(&client, "Family").await;
        assert_eq!(target, NotifyTarget::Group("777".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_digits_is_personal() {
        let client = FakeClient::new().with_groups(groups());
        let target = resolve_target(&client, "999").await;
        assert_eq!(target, NotifyTarget::Personal("999".to_string()));
        assert_eq!(client.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_resolve_unmatched_falls_back_to_personal() {
        let client = FakeClient::new().with_groups(groups());
        let target = resolve_target(&client, "school").await;
        assert_eq!(target, NotifyTarget::Personal("school".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_list_failure_falls_back_to_personal() {
        let client = FakeClient::new().failing_list();
        let target = resolve_target(&client, "fam").await;
        assert_eq!(target, NotifyTarget::Personal("fam".to_string()));
    }
}
