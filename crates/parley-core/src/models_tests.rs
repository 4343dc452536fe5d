//! Unit tests for domain models.

use super::*;
use chrono::TimeZone;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

fn participant(id: i64, user_id: UserId, unread_count: i64) -> Participant {
    Participant {
        id,
        thread_id: 7,
        user_id,
        joined_at: at(1_700_000_000),
        last_read_at: None,
        unread_count,
    }
}

fn thread() -> Thread {
    Thread {
        id: 7,
        created_by_user_id: 1,
        direct_key: "1:2".to_string(),
        created_at: at(1_700_000_000),
        updated_at: at(1_700_000_000),
        latest_message_at: at(1_700_000_000),
    }
}

#[cfg(test)]
mod read_state_tests {
    use super::*;

    #[test]
    fn zero_unread_is_read() {
        assert_eq!(participant(1, 1, 0).read_state(), ReadState::Read);
    }

    #[test]
    fn positive_unread_is_unread() {
        assert_eq!(participant(1, 1, 3).read_state(), ReadState::Unread(3));
    }

    #[test]
    fn display() {
        assert_eq!(ReadState::Read.to_string(), "read");
        assert_eq!(ReadState::Unread(2).to_string(), "unread (2)");
    }

    #[test]
    fn serializes_with_state_tag() {
        let json = serde_json::to_value(ReadState::Unread(4)).expect("serialize");
        assert_eq!(json, serde_json::json!({"state": "unread", "count": 4}));
    }
}

#[cfg(test)]
mod thread_detail_tests {
    use super::*;

    #[test]
    fn counterpart_is_the_other_participant() {
        let detail = ThreadDetail {
            thread: thread(),
            participants: vec![participant(1, 1, 0), participant(2, 2, 5)],
            messages: Vec::new(),
            viewer: participant(1, 1, 0),
        };
        assert_eq!(detail.counterpart().map(|p| p.user_id), Some(2));
    }

    #[test]
    fn counterpart_missing_when_alone() {
        let detail = ThreadDetail {
            thread: thread(),
            participants: vec![participant(1, 1, 0)],
            messages: Vec::new(),
            viewer: participant(1, 1, 0),
        };
        assert!(detail.counterpart().is_none());
    }

    #[test]
    fn flattens_thread_fields_when_serialized() {
        let detail = ThreadDetail {
            thread: thread(),
            participants: vec![participant(1, 1, 0), participant(2, 2, 0)],
            messages: Vec::new(),
            viewer: participant(1, 1, 0),
        };
        let json = serde_json::to_value(&detail).expect("serialize");
        assert_eq!(json["id"], 7);
        assert_eq!(json["direct_key"], "1:2");
        assert_eq!(json["viewer"]["user_id"], 1);
    }
}

#[cfg(test)]
mod thread_summary_tests {
    use super::*;

    #[test]
    fn participant_finds_row_for_user() {
        let summary = ThreadSummary {
            thread: thread(),
            participants: vec![participant(1, 1, 0), participant(2, 2, 9)],
            last_message: None,
        };
        assert_eq!(summary.participant(2).map(|p| p.unread_count), Some(9));
        assert!(summary.participant(3).is_none());
    }
}
