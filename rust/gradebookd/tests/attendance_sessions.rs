use gradebookd::config::{Config, SavePolicy};
use gradebookd::day;
use gradebookd::model::{AttendanceStatus, Student};
use gradebookd::report::ClassReport;
use gradebookd::repo::hash_credential;
use gradebookd::session::AttendanceSession;
use gradebookd::{Error, Store};

fn store_with_roster(config: Config) -> (Store, i64, Vec<i64>) {
    let store = Store::open_in_memory().expect("store").with_config(config);
    let teacher = store
        .teachers()
        .register("Ms. Rivera", "Lincoln", &hash_credential("1234"))
        .expect("register");
    let cid = store
        .classes()
        .add_classroom(teacher.id, "7A", "7", None)
        .expect("add classroom");
    let ids = ["Ada", "Ben", "Cy"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            store
                .classes()
                .add_student(cid, name, Some((i + 1).to_string().as_str()), None)
                .expect("add student")
        })
        .collect();
    (store, cid, ids)
}

#[test]
fn opening_marks_everyone_present() {
    let (store, cid, ids) = store_with_roster(Config::default());
    let session = AttendanceSession::open(&store, cid).expect("open");
    assert_eq!(session.roster().len(), 3);
    for id in ids {
        assert_eq!(session.status(id), Some(AttendanceStatus::Present));
    }
}

#[test]
fn marking_unknown_student_is_not_found() {
    let (store, cid, _) = store_with_roster(Config::default());
    let mut session = AttendanceSession::open(&store, cid).expect("open");
    assert!(matches!(
        session.mark(9_999, AttendanceStatus::Absent),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn open_for_missing_classroom_fails() {
    let store = Store::open_in_memory().expect("store");
    assert!(matches!(
        AttendanceSession::open(&store, 42),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn save_stamps_local_midnight_of_today() {
    let (store, cid, ids) = store_with_roster(Config::default());
    let mut session = AttendanceSession::open(&store, cid).expect("open");
    session.mark(ids[1], AttendanceStatus::Absent).expect("mark");

    let before = day::today_millis();
    let saved = session.save(&store).expect("save");
    let after = day::today_millis();

    assert_eq!(saved.len(), 3);
    assert!(saved.iter().all(|r| r.date == before || r.date == after));
    assert!(saved.iter().all(|r| r.id > 0));
    let stored = store.attendance().for_date(cid, saved[0].date).expect("for date");
    let absent: Vec<i64> = stored
        .iter()
        .filter(|r| r.status == AttendanceStatus::Absent)
        .map(|r| r.student_id)
        .collect();
    assert_eq!(absent, vec![ids[1]]);
}

#[test]
fn second_same_day_save_keeps_the_first_batch_by_default() {
    let (store, cid, ids) = store_with_roster(Config::default());
    let date = day::parse_day("2026-03-02").expect("day");

    let mut first = AttendanceSession::open(&store, cid).expect("open");
    first.mark(ids[0], AttendanceStatus::Absent).expect("mark");
    first.save_for_day(&store, date).expect("first save");

    let mut second = AttendanceSession::open(&store, cid).expect("open");
    second.mark(ids[0], AttendanceStatus::Late).expect("mark");
    second.save_for_day(&store, date).expect("second save");

    let stored = store.attendance().for_date(cid, date).expect("for date");
    assert_eq!(stored.len(), 6);
    let for_ada: Vec<AttendanceStatus> = stored
        .iter()
        .filter(|r| r.student_id == ids[0])
        .map(|r| r.status)
        .collect();
    assert_eq!(for_ada, vec![AttendanceStatus::Absent, AttendanceStatus::Late]);
}

#[test]
fn replace_policy_keeps_one_row_per_student_per_day() {
    let config = Config {
        attendance_policy: SavePolicy::Replace,
        ..Config::default()
    };
    let (store, cid, ids) = store_with_roster(config);
    let date = day::parse_day("2026-03-02").expect("day");
    let other_day = day::parse_day("2026-03-03").expect("day");

    let mut session = AttendanceSession::open(&store, cid).expect("open");
    session.mark(ids[2], AttendanceStatus::Excused).expect("mark");
    session.save_for_day(&store, date).expect("first save");
    session.save_for_day(&store, other_day).expect("other day");
    session.mark(ids[2], AttendanceStatus::Absent).expect("mark");
    session.save_for_day(&store, date).expect("second save");

    let stored = store.attendance().for_date(cid, date).expect("for date");
    assert_eq!(stored.len(), 3);
    let cy = stored.iter().find(|r| r.student_id == ids[2]).expect("row for Cy");
    assert_eq!(cy.status, AttendanceStatus::Absent);
    assert_eq!(store.attendance().for_date(cid, other_day).expect("other").len(), 3);
}

#[test]
fn duplicated_absences_count_twice_in_reports() {
    let (store, cid, ids) = store_with_roster(Config::default());
    let date = day::parse_day("2026-03-02").expect("day");
    let mut session = AttendanceSession::open(&store, cid).expect("open");
    session.mark(ids[0], AttendanceStatus::Absent).expect("mark");
    session.save_for_day(&store, date).expect("save");
    session.save_for_day(&store, date).expect("save again");

    let report = ClassReport::snapshot(&store, cid).expect("report");
    let ada = report.rows.iter().find(|r| r.student_id == ids[0]).expect("Ada");
    assert_eq!(ada.absences, 2);
}

#[test]
fn roster_refresh_keeps_entered_marks() {
    let (store, cid, ids) = store_with_roster(Config::default());
    let mut session = AttendanceSession::open(&store, cid).expect("open");
    session.mark(ids[0], AttendanceStatus::Late).expect("mark");

    let new_id = store
        .classes()
        .add_student(cid, "Dot", Some("4"), None)
        .expect("add student");
    let roster: Vec<Student> = store.classes().students(cid).expect("students");
    session.refresh_roster(roster);

    assert_eq!(session.roster().len(), 4);
    assert_eq!(session.status(ids[0]), Some(AttendanceStatus::Late));
    assert_eq!(session.status(new_id), Some(AttendanceStatus::Present));
}

#[test]
fn student_who_left_is_not_saved() {
    let (store, cid, ids) = store_with_roster(Config::default());
    let mut session = AttendanceSession::open(&store, cid).expect("open");
    session.mark(ids[1], AttendanceStatus::Absent).expect("mark");

    let teacher_id = store.classes().classroom(cid).expect("read").expect("class").teacher_id;
    let other = store
        .classes()
        .add_classroom(teacher_id, "7B", "7", None)
        .expect("add classroom");
    let mut ben = store.classes().student(ids[1]).expect("read").expect("student");
    ben.classroom_id = other;
    store.classes().upsert_student(&ben).expect("move");
    session.refresh_roster(store.classes().students(cid).expect("students"));

    assert_eq!(session.status(ids[1]), None);
    assert!(session.mark(ids[1], AttendanceStatus::Late).is_err());
    let saved = session.save_for_day(&store, 0).expect("save");
    assert_eq!(saved.len(), 2);
    assert!(saved.iter().all(|r| r.student_id != ids[1]));
}

#[test]
fn empty_roster_saves_nothing() {
    let store = Store::open_in_memory().expect("store");
    let teacher = store
        .teachers()
        .register("T", "S", &hash_credential("0"))
        .expect("register");
    let cid = store
        .classes()
        .add_classroom(teacher.id, "Empty", "1", None)
        .expect("add classroom");
    let session = AttendanceSession::open(&store, cid).expect("open");
    assert!(session.save(&store).expect("save").is_empty());
    assert!(store.attendance().all(cid).expect("all").is_empty());
}
