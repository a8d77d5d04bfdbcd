//! Storage facade tests against a real database file.

use pawfeed_core::{Schedule, User};
use pawfeed_storage::Storage;

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let user_id = {
        let storage = Storage::open(dir.path()).unwrap();
        let user = User::new("operator", "hash");
        storage.users().create(&user).unwrap();
        storage
            .schedules()
            .create(&Schedule::new(&user.id, None, "07:30", vec![1, 2, 3], 100))
            .unwrap();
        user.id
    };

    let storage = Storage::open(dir.path()).unwrap();
    let user = storage.users().find_by_username("operator").unwrap().unwrap();
    assert_eq!(user.id, user_id);

    let schedules = storage.schedules().list_for_user(&user_id).unwrap();
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0].time, "07:30");
    assert_eq!(schedules[0].amount, 100);
}

#[test]
fn fresh_database_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::open(dir.path()).unwrap();

    assert!(!storage.users().any().unwrap());
    assert!(storage.schedules().list_active().unwrap().is_empty());
    assert!(storage
        .feed_logs()
        .recent_for_user("nobody", 10)
        .unwrap()
        .is_empty());
}
