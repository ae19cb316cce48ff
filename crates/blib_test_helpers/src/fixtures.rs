//! Bookmark builders for tests

use blib_common::{Bookmark, BookmarkId, OwnerId};
use chrono::{DateTime, TimeZone, Utc};

/// Owner used by most tests
pub const OWNER: &str = "user-1";

/// A second identity for owner-scoping tests
pub const OTHER_OWNER: &str = "user-2";

pub fn owner() -> OwnerId {
    OwnerId::new(OWNER)
}

pub fn other_owner() -> OwnerId {
    OwnerId::new(OTHER_OWNER)
}

/// 2024-01-01 at `hour:minute` UTC
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0)
        .single()
        .expect("valid fixture time")
}

/// Bookmark owned by [`OWNER`]
pub fn bookmark(id: &str, created_at: DateTime<Utc>) -> Bookmark {
    bookmark_for(id, &owner(), created_at)
}

pub fn bookmark_for(id: &str, owner: &OwnerId, created_at: DateTime<Utc>) -> Bookmark {
    Bookmark {
        id: BookmarkId::new(id),
        url: format!("https://example.com/{}", id),
        title: format!("Bookmark {}", id),
        owner_id: owner.clone(),
        created_at,
    }
}

/// Bookmark with an explicit URL and title
pub fn titled(id: &str, url: &str, title: &str, created_at: DateTime<Utc>) -> Bookmark {
    Bookmark {
        url: url.to_string(),
        title: title.to_string(),
        ..bookmark(id, created_at)
    }
}
