//! Users tab: inline edits, batch saves, and reconciliation after reloads.

mod common;

use std::sync::Arc;

use chillers_lib::models::{
    MembershipChanges, MembershipStatus, Session, UserChanges, UserRole,
};
use chillers_lib::services::store::UserStore;
use chillers_lib::services::{NoticeLevel, NoticeSink};
use chillers_lib::views::{UserFilterPatch, UsersTab};
use common::{membership, user, FakeBackend};

fn backend() -> Arc<FakeBackend> {
    let backend = FakeBackend::new("admin");
    *backend.users.lock().unwrap() = vec![
        user("u1", "alice", 3, vec![membership("m1", "u1", MembershipStatus::Active)]),
        user("u2", "bob", 2, vec![membership("m2", "u2", MembershipStatus::Pending)]),
        user("u3", "carol", 1, vec![]),
    ];
    Arc::new(backend)
}

fn admin_tab(backend: &Arc<FakeBackend>) -> UsersTab {
    let store: Arc<dyn UserStore> = backend.clone();
    UsersTab::new(store, Session::new("admin", UserRole::Admin), 20)
}

fn rename(name: &str) -> UserChanges {
    UserChanges {
        display_name: Some(name.to_string()),
        ..Default::default()
    }
}

fn rank(value: &str) -> MembershipChanges {
    MembershipChanges {
        rank: Some(value.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_save_all_without_edits_makes_no_call() {
    let backend = backend();
    let mut tab = admin_tab(&backend);
    tab.load_items().await;

    let report = tab.save_all().await;

    assert!(report.is_empty());
    assert_eq!(backend.calls_to("update_user"), 0);
    assert_eq!(backend.calls_to("update_membership"), 0);
    assert_eq!(backend.calls_to("list_users"), 1);
    let notice = tab.last_notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Info);
    assert_eq!(notice.message, "No changes to save");
}

#[tokio::test]
async fn test_save_all_keeps_invalid_and_saves_valid() {
    let backend = backend();
    let mut tab = admin_tab(&backend);
    tab.load_items().await;

    assert!(tab.begin_user_edit("u1"));
    assert!(tab.update_user_edit("u1", rename("x")));
    assert!(tab.begin_membership_edit("m1"));
    assert!(tab.update_membership_edit("m1", rank("Veteran")));

    let report = tab.save_all().await;

    assert_eq!(report.saved, vec!["m1".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "u1");
    assert!(report.failed[0].1.is_validation());

    // the invalid overlay never reached the server
    assert_eq!(backend.calls_to("update_user"), 0);
    assert_eq!(backend.calls_to("update_membership"), 1);
    // exactly one reload after the batch
    assert_eq!(backend.calls_to("list_users"), 2);

    assert!(tab.user_edits().is_editing("u1"));
    assert!(tab.user_edits().error("u1").is_some());
    assert!(!tab.membership_edits().is_editing("m1"));
    let m1 = tab.displayed_membership("m1").unwrap();
    assert_eq!(m1.rank.as_deref(), Some("Veteran"));
    assert_eq!(tab.displayed_user("u1").unwrap().display_name.as_deref(), Some("x"));

    let notice = tab.last_notice().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "Some updates need fixes");
}

#[tokio::test]
async fn test_save_all_continues_after_server_failure() {
    let backend = backend();
    let mut tab = admin_tab(&backend);
    tab.load_items().await;
    backend.fail("update_user:u1");

    tab.begin_user_edit("u1");
    tab.update_user_edit(
        "u1",
        UserChanges {
            role: Some(UserRole::Moderator),
            ..Default::default()
        },
    );
    tab.begin_membership_edit("m1");
    tab.update_membership_edit(
        "m1",
        MembershipChanges {
            status: Some(MembershipStatus::Suspended),
            ..Default::default()
        },
    );

    let report = tab.save_all().await;

    assert!(report.has_failures());
    assert_eq!(report.saved, vec!["m1".to_string()]);
    assert_eq!(backend.calls_to("update_user"), 1);
    assert_eq!(backend.calls_to("list_users"), 2);

    // failed overlay survives the reload because the server value did not move
    assert_eq!(
        tab.displayed_user("u1").unwrap().role,
        UserRole::Moderator
    );
    assert_eq!(tab.user_edits().error("u1").unwrap().status_code(), Some(500));
    assert_eq!(
        tab.displayed_membership("m1").unwrap().status,
        MembershipStatus::Suspended
    );
}

#[tokio::test]
async fn test_save_all_success_notice() {
    let backend = backend();
    let (sink, mut rx) = NoticeSink::channel();
    let store: Arc<dyn UserStore> = backend.clone();
    let mut tab =
        UsersTab::new(store, Session::new("admin", UserRole::Admin), 20).with_notices(sink);
    tab.load_items().await;

    tab.begin_user_edit("u2");
    tab.update_user_edit("u2", rename("Bobby"));

    let report = tab.save_all().await;
    assert!(!report.has_failures());
    assert!(!tab.has_pending_changes());
    assert_eq!(tab.active_user(), None);
    assert_eq!(
        tab.displayed_user("u2").unwrap().display_name.as_deref(),
        Some("Bobby")
    );

    let notice = rx.recv().await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.message, "Changes saved");
}

#[tokio::test]
async fn test_cancel_restores_server_value() {
    let backend = backend();
    let mut tab = admin_tab(&backend);
    tab.load_items().await;

    tab.begin_user_edit("u1");
    tab.update_user_edit("u1", rename("Changed"));
    assert_eq!(
        tab.displayed_user("u1").unwrap().display_name.as_deref(),
        Some("Changed")
    );

    assert!(tab.cancel_user_edit("u1"));
    assert_eq!(
        tab.displayed_user("u1").unwrap().display_name.as_deref(),
        Some("alice")
    );
    assert_eq!(tab.active_user(), None);
    assert_eq!(backend.calls_to("update_user"), 0);
}

#[tokio::test]
async fn test_only_one_user_is_edited_at_a_time() {
    let backend = backend();
    let mut tab = admin_tab(&backend);
    tab.load_items().await;

    tab.begin_user_edit("u1");
    tab.update_user_edit("u1", rename("Alice A."));
    tab.begin_membership_edit("m1");
    tab.update_membership_edit("m1", rank("Veteran"));
    assert_eq!(tab.active_user(), Some("u1"));

    tab.begin_membership_edit("m2");

    assert_eq!(tab.active_user(), Some("u2"));
    assert!(!tab.user_edits().is_editing("u1"));
    assert!(!tab.membership_edits().is_editing("m1"));
    assert!(tab.membership_edits().is_editing("m2"));
    assert_eq!(
        tab.displayed_user("u1").unwrap().display_name.as_deref(),
        Some("alice")
    );
}

#[tokio::test]
async fn test_update_without_begin_is_rejected() {
    let backend = backend();
    let mut tab = admin_tab(&backend);
    tab.load_items().await;

    assert!(!tab.update_user_edit("u1", rename("nope")));
    assert!(!tab.has_pending_changes());
    assert!(!tab.begin_user_edit("missing"));
}

#[tokio::test]
async fn test_reload_drops_edits_the_server_overtook() {
    let backend = backend();
    let mut tab = admin_tab(&backend);
    tab.load_items().await;

    tab.begin_user_edit("u1");
    tab.update_user_edit("u1", rename("Mine"));

    backend.users.lock().unwrap()[0].display_name = Some("Theirs".to_string());
    assert!(tab.load_items().await);

    assert!(!tab.user_edits().is_editing("u1"));
    assert_eq!(
        tab.displayed_user("u1").unwrap().display_name.as_deref(),
        Some("Theirs")
    );
}

#[tokio::test]
async fn test_single_save_reloads_on_request() {
    let backend = backend();
    let mut tab = admin_tab(&backend);
    tab.load_items().await;

    tab.begin_membership_edit("m2");
    tab.update_membership_edit("m2", rank("Rookie"));
    assert!(tab.save_membership("m2", false).await);
    assert_eq!(backend.calls_to("list_users"), 1);

    tab.begin_user_edit("u2");
    tab.update_user_edit(
        "u2",
        UserChanges {
            is_banned: Some(true),
            ..Default::default()
        },
    );
    assert!(tab.save_user("u2", true).await);
    assert_eq!(backend.calls_to("list_users"), 2);
    assert!(tab.displayed_user("u2").unwrap().is_banned);
    assert_eq!(
        tab.displayed_membership("m2").unwrap().rank.as_deref(),
        Some("Rookie")
    );
}

#[tokio::test]
async fn test_members_cannot_open_the_tab() {
    let backend = backend();
    let store: Arc<dyn UserStore> = backend.clone();
    let mut tab = UsersTab::new(store, Session::new("u3", UserRole::Member), 20);

    assert!(!tab.load_items().await);
    assert_eq!(backend.call_count(), 0);
    assert!(tab.last_notice().unwrap().is_error());
}

#[tokio::test]
async fn test_role_filter_and_rows() {
    let backend = backend();
    backend.users.lock().unwrap()[1].role = UserRole::Moderator;
    let mut tab = admin_tab(&backend);
    tab.load_items().await;

    assert!(tab.toggle_row("u1"));
    assert!(tab.is_expanded("u1"));

    let change = tab
        .apply_filter(UserFilterPatch::default().role(Some(UserRole::Moderator)))
        .await;
    assert!(change.needs_fetch);

    let ids: Vec<&str> = tab.users().iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["u2"]);
    // u1 is no longer listed
    assert!(!tab.is_expanded("u1"));
}

#[tokio::test]
async fn test_short_server_name_does_not_block_a_ban() {
    let backend = backend();
    backend.users.lock().unwrap()[0].display_name = Some("A".to_string());
    let mut tab = admin_tab(&backend);
    tab.load_items().await;

    tab.begin_user_edit("u1");
    tab.update_user_edit(
        "u1",
        UserChanges {
            is_banned: Some(true),
            ..Default::default()
        },
    );

    assert!(tab.save_user("u1", true).await);
    assert_eq!(backend.calls_to("update_user"), 1);
    let shown = tab.displayed_user("u1").unwrap();
    assert!(shown.is_banned);
    assert_eq!(shown.display_name.as_deref(), Some("A"));
}

#[tokio::test]
async fn test_failed_refresh_after_save_is_reported() {
    let backend = backend();
    let mut tab = admin_tab(&backend);
    tab.load_items().await;

    tab.begin_user_edit("u1");
    tab.update_user_edit("u1", rename("Alicia"));
    backend.fail("list_users");

    assert!(tab.save_user("u1", true).await);
    assert_eq!(backend.calls_to("update_user"), 1);
    // the cached row carries the saved value even though the reload failed
    assert_eq!(
        tab.displayed_user("u1").unwrap().display_name.as_deref(),
        Some("Alicia")
    );
    assert_eq!(tab.last_notice().unwrap().level, NoticeLevel::Error);
}

#[tokio::test]
async fn test_failed_refresh_after_batch_is_reported() {
    let backend = backend();
    let mut tab = admin_tab(&backend);
    tab.load_items().await;

    tab.begin_membership_edit("m1");
    tab.update_membership_edit("m1", rank("Veteran"));
    backend.fail("list_users");

    let report = tab.save_all().await;

    assert!(!report.has_failures());
    assert_eq!(report.saved, vec!["m1".to_string()]);
    assert_eq!(
        tab.displayed_membership("m1").unwrap().rank.as_deref(),
        Some("Veteran")
    );
    assert_eq!(tab.last_notice().unwrap().level, NoticeLevel::Error);
}
